pub mod payment;
pub mod webhook;

pub use payment::*;
pub use webhook::*;
