//! Domain types shared across the provider.
//!
//! Field names, sort keys and status codes here form the external contract. Callers only ever
//! pick from these whitelists, so no caller text reaches a SQL statement except as a bound
//! parameter.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{ProviderError, Result};

/// Name of the external application issuing a request.
///
/// Supplied by the transport and trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// OpenPGP master key id, stored as a signed 64-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MasterKeyId(i64);

impl MasterKeyId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Reinterpret an unsigned OpenPGP key id in the signed storage form.
    pub const fn from_unsigned(id: u64) -> Self {
        Self(id as i64)
    }

    /// The key id as OpenPGP writes it.
    pub const fn as_unsigned(self) -> u64 {
        self.0 as u64
    }

    /// Parse a key id from a request value.
    ///
    /// Accepts a JSON integer or a decimal string, signed or unsigned 64-bit; anything else
    /// yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self)
                .or_else(|| n.as_u64().map(Self::from_unsigned)),
            serde_json::Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Self)
                    .or_else(|_| s.parse::<u64>().map(Self::from_unsigned))
                    .ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for MasterKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.as_unsigned())
    }
}

/// Internal strength of a certification as recorded in `certs.verified`.
///
/// Lower non-zero values are stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerificationLevel {
    /// No valid self-certification. Never surfaced.
    Invalid = 0,
    /// Certified by a secret key held in the local key store.
    Secret = 1,
    /// Only self-certified.
    SelfCertified = 2,
}

impl VerificationLevel {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Invalid),
            1 => Some(Self::Secret),
            2 => Some(Self::SelfCertified),
            _ => None,
        }
    }

    pub fn raw(self) -> i64 {
        self as i64
    }
}

/// Externally stable verification status.
///
/// Decoupled from [`VerificationLevel`] so the internal numbering can change without breaking
/// callers. Unknown status is represented by `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EmailStatus {
    /// Code 1.
    VerifiedSecret,
    /// Code 2.
    SelfCertified,
}

impl EmailStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::VerifiedSecret => 1,
            Self::SelfCertified => 2,
        }
    }

    pub fn from_level(level: VerificationLevel) -> Option<Self> {
        match level {
            VerificationLevel::Secret => Some(Self::VerifiedSecret),
            VerificationLevel::SelfCertified => Some(Self::SelfCertified),
            VerificationLevel::Invalid => None,
        }
    }
}

impl Serialize for EmailStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A column a caller may request in a projection.
pub trait Field: Copy + Eq + FromStr<Err = ProviderError> {
    fn as_str(self) -> &'static str;
}

/// Output columns of an email status lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailStatusField {
    EmailAddress,
    UserId,
    EmailStatus,
    TrustIdLastUpdate,
    MasterKeyId,
}

impl Field for EmailStatusField {
    fn as_str(self) -> &'static str {
        match self {
            Self::EmailAddress => "email_address",
            Self::UserId => "user_id",
            Self::EmailStatus => "email_status",
            Self::TrustIdLastUpdate => "trust_id_last_update",
            Self::MasterKeyId => "master_key_id",
        }
    }
}

impl FromStr for EmailStatusField {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "email_address" => Ok(Self::EmailAddress),
            "user_id" => Ok(Self::UserId),
            "email_status" => Ok(Self::EmailStatus),
            "trust_id_last_update" => Ok(Self::TrustIdLastUpdate),
            "master_key_id" => Ok(Self::MasterKeyId),
            other => Err(ProviderError::InvalidArgument(format!(
                "unknown email status field: {}",
                other
            ))),
        }
    }
}

/// Output columns of a trust identity lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustIdentityField {
    Id,
    Identifier,
    MasterKeyId,
    LastUpdated,
}

impl Field for TrustIdentityField {
    fn as_str(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Identifier => "identifier",
            Self::MasterKeyId => "master_key_id",
            Self::LastUpdated => "last_updated",
        }
    }
}

impl FromStr for TrustIdentityField {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "_id" => Ok(Self::Id),
            "identifier" => Ok(Self::Identifier),
            "master_key_id" => Ok(Self::MasterKeyId),
            "last_updated" => Ok(Self::LastUpdated),
            other => Err(ProviderError::InvalidArgument(format!(
                "unknown trust identity field: {}",
                other
            ))),
        }
    }
}

/// Non-empty, duplicate-free list of requested output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection<F> {
    fields: Vec<F>,
}

impl<F: Field> Projection<F> {
    /// Build a projection. An empty list is rejected.
    pub fn new(fields: impl IntoIterator<Item = F>) -> Result<Self> {
        let mut unique: Vec<F> = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            return Err(ProviderError::InvalidArgument(
                "please provide a projection".to_string(),
            ));
        }
        Ok(Self { fields: unique })
    }

    /// Parse a comma separated field list, e.g. `email_address,email_status`.
    pub fn parse(list: Option<&str>) -> Result<Self> {
        let fields = list
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(F::from_str)
            .collect::<Result<Vec<F>>>()?;
        Self::new(fields)
    }

    pub fn contains(&self, field: F) -> bool {
        self.fields.contains(&field)
    }

    pub fn fields(&self) -> &[F] {
        &self.fields
    }
}

/// Sort hint for email status results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: EmailStatusField,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: EmailStatusField::EmailAddress,
            descending: false,
        }
    }
}

impl FromStr for SortOrder {
    type Err = ProviderError;

    /// Parses `<field>` or `<field> ASC|DESC`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| ProviderError::InvalidArgument("empty sort order".to_string()))?
            .parse::<EmailStatusField>()?;
        let descending = match parts.next() {
            None => false,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
            Some(dir) => {
                return Err(ProviderError::InvalidArgument(format!(
                    "invalid sort direction: {}",
                    dir
                )));
            }
        };
        if parts.next().is_some() {
            return Err(ProviderError::InvalidArgument(format!(
                "invalid sort order: {}",
                s
            )));
        }
        Ok(Self { field, descending })
    }
}
