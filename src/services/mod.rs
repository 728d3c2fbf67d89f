pub mod notify;
pub mod processor;
pub mod razorpay;

pub use notify::NotificationDispatcher;
pub use processor::PaymentProcessor;
