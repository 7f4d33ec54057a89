use bytes::Bytes;
use http::HeaderValue;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::Serialize;

use crate::HubResult;
use crate::error::HubError;
use crate::translate::DispatchFailure;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.iothub.json";
pub const RAW_CONTENT_TYPE: &str = "application/octet-stream";

/// Request payload, chosen by the caller rather than inferred from a runtime type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Already-encoded JSON.
    Json(Bytes),
    /// Bytes sent as-is.
    Raw(Bytes),
    /// Pre-serialized batch payload that bypasses JSON encoding.
    Batch(String),
}

impl RequestBody {
    pub fn json<T>(payload: &T) -> HubResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let encoded =
            serde_json::to_vec(payload).map_err(|source| HubError::Serialize { source })?;
        Ok(Self::Json(Bytes::from(encoded)))
    }

    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Self::Raw(bytes.into())
    }

    pub fn batch(text: impl Into<String>) -> Self {
        Self::Batch(text.into())
    }

    pub fn content_type(&self) -> Option<HeaderValue> {
        match self {
            Self::Empty => None,
            Self::Json(_) => Some(HeaderValue::from_static(JSON_CONTENT_TYPE)),
            Self::Raw(_) => Some(HeaderValue::from_static(RAW_CONTENT_TYPE)),
            Self::Batch(_) => Some(HeaderValue::from_static(BATCH_CONTENT_TYPE)),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Empty => Bytes::new(),
            Self::Json(bytes) | Self::Raw(bytes) => bytes,
            Self::Batch(text) => Bytes::from(text),
        }
    }
}

pub(crate) async fn read_all_body_limited(
    mut body: Incoming,
    max_bytes: usize,
) -> Result<Bytes, DispatchFailure> {
    let mut collected = Vec::new();
    let mut total_len = 0_usize;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|source| DispatchFailure::Body(Box::new(source)))?;
        if let Some(data) = frame.data_ref() {
            total_len = total_len.saturating_add(data.len());
            if total_len > max_bytes {
                return Err(DispatchFailure::BodyTooLarge {
                    limit_bytes: max_bytes,
                    actual_bytes: total_len,
                });
            }
            collected.extend_from_slice(data);
        }
    }

    Ok(Bytes::from(collected))
}
