mod client;
mod orders;
mod refunds;
pub mod signature;

pub use client::RazorpayClient;
pub use orders::*;
pub use refunds::*;
