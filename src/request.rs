use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue, IF_MATCH};
use http::{HeaderMap, Method, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::HubResult;
use crate::body::RequestBody;
use crate::classify::Classify;
use crate::client::HubClient;
use crate::error::HubError;
use crate::etag::{ETagHolder, ETagOperation, if_match_value};
use crate::mapping::ErrorMapping;
use crate::response::HttpResponse;
use crate::util::{parse_header_name, parse_header_value};

/// The request under construction, as seen by a call's mutation callback.
#[derive(Debug)]
pub struct OutgoingRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: RequestBody,
}

impl OutgoingRequest {
    pub(crate) fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            body: RequestBody::Empty,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Adds a header; an existing value with the same name is kept.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn try_append_header(&mut self, name: &str, value: &str) -> HubResult<()> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        self.append_header(name, value);
        Ok(())
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = body;
    }

    pub fn set_json<T>(&mut self, payload: &T) -> HubResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.body = RequestBody::json(payload)?;
        Ok(())
    }

    /// Applies the optimistic-concurrency precondition for `operation`.
    pub fn set_if_match(&mut self, operation: ETagOperation, etag: Option<&str>) -> HubResult<()> {
        match if_match_value(operation, etag)? {
            Some(value) => {
                self.headers.insert(IF_MATCH, value);
            }
            None => {
                self.headers.remove(IF_MATCH);
            }
        }
        Ok(())
    }

    pub(crate) fn into_http(self) -> HubResult<http::Request<Bytes>> {
        let mut builder = http::Request::builder().method(self.method).uri(self.uri);
        let content_type = self.body.content_type();
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(content_type) = content_type
            && !self.headers.contains_key(CONTENT_TYPE)
        {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder
            .body(self.body.into_bytes())
            .map_err(|source| HubError::RequestBuild { source })
    }
}

/// Per-call knobs for [`HubClient::execute`].
#[derive(Clone, Debug, Default)]
pub struct CallOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) error_overrides: Option<ErrorMapping>,
    pub(crate) classify: Classify,
    pub(crate) headers: HeaderMap,
    pub(crate) cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn error_overrides(mut self, overrides: ErrorMapping) -> Self {
        self.error_overrides = Some(overrides);
        self
    }

    pub fn classify(mut self, classify: Classify) -> Self {
        self.classify = classify;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[doc(hidden)]
pub struct RequestBuilder<'a> {
    client: &'a HubClient,
    method: Method,
    path: String,
    options: CallOptions,
    body: RequestBody,
    if_match: Option<(ETagOperation, Option<String>)>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a HubClient, method: Method, path: String) -> Self {
        Self {
            client,
            method,
            path,
            options: CallOptions::default(),
            body: RequestBody::Empty,
            if_match: None,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.options.headers.append(name, value);
        self
    }

    pub fn try_header(self, name: &str, value: &str) -> HubResult<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.header(name, value))
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn json<T>(self, payload: &T) -> HubResult<Self>
    where
        T: Serialize + ?Sized,
    {
        Ok(self.body(RequestBody::json(payload)?))
    }

    pub fn if_match(mut self, operation: ETagOperation, etag: Option<&str>) -> Self {
        self.if_match = Some((operation, etag.map(ToOwned::to_owned)));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn error_overrides(mut self, overrides: ErrorMapping) -> Self {
        self.options.error_overrides = Some(overrides);
        self
    }

    pub fn classify(mut self, classify: Classify) -> Self {
        self.options.classify = classify;
        self
    }

    pub fn tolerate_not_found(self) -> Self {
        self.classify(Classify::TolerateNotFound)
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.options.cancel = Some(token);
        self
    }

    pub async fn send_with<T, P>(self, process: P) -> HubResult<T>
    where
        P: FnOnce(HttpResponse) -> HubResult<T>,
    {
        let body = self.body;
        let if_match = self.if_match;
        self.client
            .execute(
                self.method,
                &self.path,
                self.options,
                move |request| {
                    if let Some((operation, etag)) = &if_match {
                        request.set_if_match(*operation, etag.as_deref())?;
                    }
                    request.set_body(body);
                    Ok(())
                },
                process,
            )
            .await
    }

    pub async fn send(self) -> HubResult<HttpResponse> {
        self.send_with(Ok).await
    }

    pub async fn send_json<T>(self) -> HubResult<T>
    where
        T: DeserializeOwned,
    {
        self.send_with(|response| response.json()).await
    }

    pub async fn send_json_with_etag<T>(self) -> HubResult<T>
    where
        T: DeserializeOwned + ETagHolder,
    {
        self.send_with(|response| response.json_with_etag()).await
    }
}
