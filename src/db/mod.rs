pub mod pool;
pub mod repositories;
pub mod store;

pub use pool::{create_pool, run_migrations, DbPool};
pub use store::{PaymentStore, PgPaymentStore};
