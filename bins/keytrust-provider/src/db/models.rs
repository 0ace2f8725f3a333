//! Database models for the keytrust provider.

/// Database row for a registered application.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiAppRow {
    /// Package name of the application
    pub package_name: String,

    /// Signing certificate of the package recorded at registration
    pub package_signature: Vec<u8>,

    /// Registration timestamp (Unix seconds)
    pub created_at: i64,
}

/// Database row for a trust identity override.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrustIdentityRow {
    pub id: i64,

    /// Owning application, always the authenticated caller
    pub package_name: String,

    /// Caller-chosen identifier, usually an email address
    pub identifier: String,

    pub master_key_id: i64,

    /// Last update timestamp (Unix seconds)
    pub last_updated: i64,
}
