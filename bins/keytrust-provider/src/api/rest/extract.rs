//! Caller identity carried by the transport.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::error::{ProviderError, Result};
use crate::types::CallerId;

/// Package name of the calling application.
pub const CALLER_PACKAGE_HEADER: &str = "x-caller-package";

/// OS uid of the calling process.
pub const CALLER_UID_HEADER: &str = "x-caller-uid";

/// Identity headers set by the transport in front of the provider.
///
/// Extraction never fails; each accessor reports its own error so handlers decide which
/// identity they need.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    package: Option<String>,
    uid: Option<String>,
}

impl CallerContext {
    fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            package: header(CALLER_PACKAGE_HEADER),
            uid: header(CALLER_UID_HEADER),
        }
    }

    /// The calling package. Missing means the caller cannot be registered.
    pub fn package(&self) -> Result<CallerId> {
        self.package
            .as_deref()
            .map(CallerId::new)
            .ok_or_else(ProviderError::not_registered)
    }

    /// The calling uid. Missing means the transport failed to identify the process.
    pub fn uid(&self) -> Result<u32> {
        let raw = self.uid.as_deref().ok_or_else(|| {
            ProviderError::Internal("calling uid was not provided by the transport".to_string())
        })?;
        raw.parse()
            .map_err(|_| ProviderError::Internal(format!("malformed calling uid: {}", raw)))
    }
}

impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
