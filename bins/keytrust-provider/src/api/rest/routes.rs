//! REST API routes for the keytrust provider.

use axum::routing::get;
use axum::Router;

use super::handlers::{
    delete_trust_identity, email_status, get_api_app, get_trust_identity, health_check,
    insert_trust_identity, unsupported_operation, AppState,
};

/// Create the REST API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check).fallback(unsupported_operation))
        // Status lookups
        .route(
            "/v1/email_status",
            get(email_status).fallback(unsupported_operation),
        )
        // Trust identities
        .route(
            "/v1/trust_identities/{identifier}",
            get(get_trust_identity)
                .post(insert_trust_identity)
                .delete(delete_trust_identity)
                .fallback(unsupported_operation),
        )
        // Registration records
        .route(
            "/v1/api_apps/{package_name}",
            get(get_api_app).fallback(unsupported_operation),
        )
        .fallback(unsupported_operation)
        .with_state(state)
}
