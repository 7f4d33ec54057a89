use bytes::Bytes;
use http::header::ETAG;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::HubResult;
use crate::error::HubError;
use crate::etag::ETagHolder;
use crate::util::truncate_body;

/// A fully buffered response handed to success processors and error factories.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The entity tag reported by the service, if the response carries one.
    pub fn etag(&self) -> Option<&str> {
        self.header_str(ETAG.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn json<T>(&self) -> HubResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body).map_err(|source| HubError::Deserialize {
            source,
            body: truncate_body(&self.body),
        })
    }

    /// Decodes the body and stamps it with the response `ETag` header.
    ///
    /// The header is authoritative: it replaces whatever tag the body carried.
    pub fn json_with_etag<T>(&self) -> HubResult<T>
    where
        T: DeserializeOwned + ETagHolder,
    {
        let mut entity: T = self.json()?;
        if let Some(etag) = self.etag() {
            entity.set_etag(etag.to_owned());
        }
        Ok(entity)
    }
}
