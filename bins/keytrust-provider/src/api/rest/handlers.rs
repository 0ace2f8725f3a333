//! REST API handlers for the keytrust provider.
//!
//! Every data handler runs the registration check before looking at its arguments, so an
//! unregistered caller always gets permission-denied regardless of what it sent.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{Method, StatusCode, Uri};
use axum::Json;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::debug;

use crate::access::{self, PackageResolver};
use crate::api::rest::extract::CallerContext;
use crate::api::rest::types::*;
use crate::apps;
use crate::error::{ProviderError, Result};
use crate::notify::ChangeNotifier;
use crate::status::{self, EmailStatusQuery};
use crate::trust;
use crate::types::{MasterKeyId, Projection, SortOrder};

/// Shared state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub notifier: ChangeNotifier,
    pub packages: Arc<dyn PackageResolver>,
}

/// Health check endpoint.
///
/// # Endpoint
/// `GET /health`
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Resolve the verification status of a batch of addresses.
///
/// # Endpoint
/// `GET /v1/email_status?addresses=a@x.org,b@y.org&fields=email_address,email_status&sort=...`
///
/// `addresses` is comma separated. Leaving it out and sending it empty (`addresses=`) both
/// mean an empty batch; an empty entry inside a non-empty list is malformed. The list cannot
/// carry an address whose quoted local part contains a comma.
///
/// # Returns
/// - `200 OK` with [`EmailStatusResponse`]; addresses without a match have no row
/// - `401` if the caller is not registered
/// - `400` for an empty projection, unknown field, bad sort or malformed address
pub async fn email_status(
    State(state): State<AppState>,
    ctx: CallerContext,
    Query(params): Query<EmailStatusParams>,
) -> Result<Json<EmailStatusResponse>> {
    let caller = access::authorize(&state.pool, &ctx.package()?).await?;

    let projection = Projection::parse(params.fields.as_deref())?;
    let sort = params
        .sort
        .as_deref()
        .map(str::parse::<SortOrder>)
        .transpose()?;
    let query = EmailStatusQuery::new(params.address_list(), projection, sort)?;

    let result = status::resolve(&state.pool, &caller, &query).await?;
    Ok(Json(EmailStatusResponse::new(
        &result.rows,
        query.projection(),
        result.notify,
    )))
}

/// Get the caller's trust identity for an identifier.
///
/// # Endpoint
/// `GET /v1/trust_identities/{identifier}?fields=_id,identifier,master_key_id,last_updated`
///
/// # Returns
/// - `200 OK` with the projected record, or `null` if the caller has none
pub async fn get_trust_identity(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(identifier): Path<String>,
    Query(params): Query<FieldsParams>,
) -> Result<Json<Option<Map<String, Value>>>> {
    let caller = access::authorize(&state.pool, &ctx.package()?).await?;

    let projection = Projection::parse(params.fields.as_deref())?;
    let identity = trust::query(&state.pool, &caller, &identifier).await?;

    Ok(Json(
        identity.map(|identity| project_trust_identity(&identity, &projection)),
    ))
}

/// Pin an identifier to a key for the calling application.
///
/// # Endpoint
/// `POST /v1/trust_identities/{identifier}`
///
/// # Request Body
/// `{"master_key_id": 1234}`; a decimal string is accepted as well. Key ids with the top bit
/// set may be sent unsigned (up to `18446744073709551615`) and are echoed back unsigned.
///
/// # Returns
/// - `201 Created` with [`TrustIdentityResponse`]
/// - `400` if `master_key_id` is missing, or not an integer in the 64-bit range
pub async fn insert_trust_identity(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(identifier): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<TrustIdentityResponse>)> {
    let caller = access::authorize(&state.pool, &ctx.package()?).await?;

    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ProviderError::InvalidArgument(format!("request body is not valid JSON: {}", e))
        })?
    };
    let master_key_id = match body.get("master_key_id") {
        None | Some(Value::Null) => None,
        Some(value) => Some(MasterKeyId::from_json(value).ok_or_else(|| {
            ProviderError::InvalidArgument(format!(
                "master_key_id must be a 64-bit integer, got {}",
                value
            ))
        })?),
    };

    let identity = trust::insert(
        &state.pool,
        &state.notifier,
        &caller,
        &identifier,
        master_key_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(identity.into())))
}

/// Remove the caller's trust identity for an identifier.
///
/// # Endpoint
/// `DELETE /v1/trust_identities/{identifier}`
///
/// Filters are not supported: any query string or body is rejected.
///
/// # Returns
/// - `200 OK` with `{"deleted": 0|1}`
pub async fn delete_trust_identity(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(identifier): Path<String>,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Json<DeleteResponse>> {
    if raw_query.is_some() || !body.is_empty() {
        return Err(ProviderError::Unsupported(
            "delete by selection is not supported".to_string(),
        ));
    }

    let caller = access::authorize(&state.pool, &ctx.package()?).await?;
    let deleted = trust::delete(&state.pool, &state.notifier, &caller, &identifier).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Get the registration record of the calling package.
///
/// # Endpoint
/// `GET /v1/api_apps/{package_name}`
///
/// Does not require registration, only that `package_name` belongs to the calling uid.
///
/// # Returns
/// - `200 OK` with [`ApiAppResponse`], or `null` when not registered
/// - `403` when asking about another package
/// - `500` when the calling uid cannot be resolved
pub async fn get_api_app(
    State(state): State<AppState>,
    ctx: CallerContext,
    Path(package_name): Path<String>,
) -> Result<Json<Option<ApiAppResponse>>> {
    let uid = ctx.uid()?;
    let app = apps::own_registration(&state.pool, state.packages.as_ref(), uid, &package_name)
        .await?;
    Ok(Json(app.map(Into::into)))
}

/// Catch-all for updates, unknown methods and unknown paths.
pub async fn unsupported_operation(method: Method, uri: Uri) -> ProviderError {
    debug!(%method, path = uri.path(), "unsupported operation");
    if method == Method::PUT || method == Method::PATCH {
        if let Err(e) = trust::update() {
            return e;
        }
    }
    ProviderError::Unsupported(format!("{} {}", method, uri.path()))
}
