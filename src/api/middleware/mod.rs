pub mod auth;
pub mod logging;

pub use auth::{bearer_auth, AuthUser};
pub use logging::request_logging;
