//! Database layer for the keytrust provider.

mod models;
mod pool;
mod queries;

pub use models::{ApiAppRow, TrustIdentityRow};
pub use pool::create_pool;
pub use queries::*;
