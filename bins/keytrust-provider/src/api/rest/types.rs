//! REST API request/response types.
//!
//! Lookups return only the requested fields, in the requested order. A requested field with
//! no value is rendered as `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::apps::ApiApp;
use crate::notify::Dataset;
use crate::status::EmailStatusRow;
use crate::trust::TrustIdentity;
use crate::types::{EmailStatusField, Field, Projection, TrustIdentityField};

/// Query parameters for an email status lookup.
#[derive(Debug, Default, Deserialize)]
pub struct EmailStatusParams {
    /// Comma separated addresses
    #[serde(default)]
    pub addresses: Option<String>,
    /// Comma separated output fields
    #[serde(default)]
    pub fields: Option<String>,
    /// `<field> [ASC|DESC]`
    #[serde(default)]
    pub sort: Option<String>,
}

impl EmailStatusParams {
    /// Split the address list. An absent or empty list is an empty batch.
    pub fn address_list(&self) -> Vec<String> {
        match self.addresses.as_deref() {
            None | Some("") => Vec::new(),
            Some(list) => list.split(',').map(str::to_string).collect(),
        }
    }
}

/// Query parameters carrying only a projection.
#[derive(Debug, Default, Deserialize)]
pub struct FieldsParams {
    #[serde(default)]
    pub fields: Option<String>,
}

/// Email status lookup response.
#[derive(Debug, Serialize)]
pub struct EmailStatusResponse {
    pub rows: Vec<Map<String, Value>>,
    /// Dataset whose changes invalidate these rows
    pub notify: Dataset,
}

impl EmailStatusResponse {
    pub fn new(
        rows: &[EmailStatusRow],
        projection: &Projection<EmailStatusField>,
        notify: Dataset,
    ) -> Self {
        Self {
            rows: rows.iter().map(|row| project_status_row(row, projection)).collect(),
            notify,
        }
    }
}

fn project_status_row(
    row: &EmailStatusRow,
    projection: &Projection<EmailStatusField>,
) -> Map<String, Value> {
    projection
        .fields()
        .iter()
        .map(|&field| {
            let value = match field {
                EmailStatusField::EmailAddress => Value::from(row.address.as_str()),
                EmailStatusField::UserId => row.user_id.as_deref().map_or(Value::Null, Value::from),
                EmailStatusField::EmailStatus => {
                    row.status.map_or(Value::Null, |s| Value::from(s.code()))
                }
                EmailStatusField::TrustIdLastUpdate => {
                    row.trust_id_last_update.map_or(Value::Null, Value::from)
                }
                EmailStatusField::MasterKeyId => Value::from(row.master_key_id.as_unsigned()),
            };
            (field.as_str().to_string(), value)
        })
        .collect()
}

/// Render a trust identity with the requested fields.
pub fn project_trust_identity(
    identity: &TrustIdentity,
    projection: &Projection<TrustIdentityField>,
) -> Map<String, Value> {
    projection
        .fields()
        .iter()
        .map(|&field| {
            let value = match field {
                TrustIdentityField::Id => Value::from(identity.id),
                TrustIdentityField::Identifier => Value::from(identity.identifier.as_str()),
                TrustIdentityField::MasterKeyId => Value::from(identity.master_key_id.as_unsigned()),
                TrustIdentityField::LastUpdated => Value::from(identity.last_updated),
            };
            (field.as_str().to_string(), value)
        })
        .collect()
}

/// Response to a trust identity insert.
#[derive(Debug, Serialize)]
pub struct TrustIdentityResponse {
    #[serde(rename = "_id")]
    pub id: i64,
    pub identifier: String,
    pub master_key_id: u64,
    pub last_updated: i64,
}

impl From<TrustIdentity> for TrustIdentityResponse {
    fn from(identity: TrustIdentity) -> Self {
        Self {
            id: identity.id,
            identifier: identity.identifier,
            master_key_id: identity.master_key_id.as_unsigned(),
            last_updated: identity.last_updated,
        }
    }
}

/// Response to a trust identity delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}

/// Registration record of the calling package.
#[derive(Debug, Serialize)]
pub struct ApiAppResponse {
    pub package_name: String,
    /// Lowercase hex
    pub package_signature: String,
    pub created_at: i64,
}

impl From<ApiApp> for ApiAppResponse {
    fn from(app: ApiApp) -> Self {
        Self {
            package_name: app.package_name,
            package_signature: hex::encode(&app.package_signature),
            created_at: app.created_at,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
