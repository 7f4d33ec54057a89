//! Optimistic-concurrency support: `If-Match` derivation and etag plumbing.

use http::HeaderValue;

use crate::HubResult;
use crate::error::HubError;
use crate::util::parse_header_value;

const WILDCARD_ETAG: &str = "\"*\"";

/// How a mutating call relates to the entity already stored by the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ETagOperation {
    /// The entity is new; no precondition is sent.
    #[default]
    Create,
    /// Only apply when the stored entity still carries the supplied etag.
    UpdateExisting,
    /// Apply regardless of the stored version (`If-Match: "*"`).
    ForceUpdate,
}

/// Entities whose version marker can be refreshed from a response `ETag` header.
pub trait ETagHolder {
    fn etag(&self) -> Option<&str>;

    fn set_etag(&mut self, etag: String);
}

/// Wraps `etag` in double quotes where they are missing.
pub fn normalize_etag(etag: &str) -> String {
    let mut normalized = String::with_capacity(etag.len() + 2);
    if !etag.starts_with('"') {
        normalized.push('"');
    }
    normalized.push_str(etag);
    if !etag.ends_with('"') {
        normalized.push('"');
    }
    normalized
}

/// Computes the `If-Match` value for `operation`, or `None` when no precondition applies.
///
/// `UpdateExisting` with a missing or blank etag fails here, before anything is sent.
pub fn if_match_value(
    operation: ETagOperation,
    etag: Option<&str>,
) -> HubResult<Option<HeaderValue>> {
    match operation {
        ETagOperation::Create => Ok(None),
        ETagOperation::ForceUpdate => Ok(Some(HeaderValue::from_static(WILDCARD_ETAG))),
        ETagOperation::UpdateExisting => {
            let Some(etag) = etag.filter(|etag| !etag.trim().is_empty()) else {
                return Err(HubError::argument(
                    "etag",
                    "an etag is required when updating an existing entity",
                ));
            };
            let normalized = normalize_etag(etag);
            parse_header_value(http::header::IF_MATCH.as_str(), &normalized).map(Some)
        }
    }
}
