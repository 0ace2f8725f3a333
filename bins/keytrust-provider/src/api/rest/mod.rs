//! REST API for the keytrust provider.

pub mod extract;
pub mod handlers;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use routes::create_router;
