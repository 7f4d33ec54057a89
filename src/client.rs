use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::header::{AUTHORIZATION, HeaderName, HeaderValue, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, warn};

use crate::HubResult;
use crate::auth::{AuthorizationProvider, StaticAuthorization};
use crate::classify::{Classify, ResponseClassifier, ResponseOutcome, SuccessExemption};
use crate::error::HubError;
use crate::etag::{ETagHolder, ETagOperation};
use crate::mapping::ErrorMapping;
use crate::request::{CallOptions, OutgoingRequest, RequestBuilder};
use crate::response::HttpResponse;
use crate::timeout::{CallCancellation, TimeoutStrategy};
use crate::translate::translate_failure;
use crate::transport::{HyperTransport, Transport, TransportOptions};
use crate::util::{
    lock_unpoisoned, parse_header_name, parse_header_value, redact_uri_for_logs, resolve_uri,
};

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(100);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 8;
const DEFAULT_CLIENT_NAME: &str = "hubreq";
const DEFAULT_USER_AGENT: &str = concat!("hubreq/", env!("CARGO_PKG_VERSION"));
const DEFAULT_MAX_RESPONSE_BODY_BYTES: usize = 8 * 1024 * 1024;

/// The two long-lived transports a client dispatches through.
struct TransportPair {
    default: Arc<dyn Transport>,
    unbounded: Arc<dyn Transport>,
}

pub struct HubClientBuilder {
    base_url: String,
    authorization: Option<Arc<dyn AuthorizationProvider>>,
    default_headers: HeaderMap,
    operation_timeout: Duration,
    max_response_body_bytes: usize,
    pool_idle_timeout: Duration,
    pool_max_idle_per_host: usize,
    client_name: String,
    user_agent: String,
    error_mapping: ErrorMapping,
    classifier: ResponseClassifier,
    transports: Option<TransportPair>,
}

impl HubClientBuilder {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            authorization: None,
            default_headers: HeaderMap::new(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BODY_BYTES,
            pool_idle_timeout: DEFAULT_POOL_IDLE_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            client_name: DEFAULT_CLIENT_NAME.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            error_mapping: ErrorMapping::standard(),
            classifier: ResponseClassifier::standard(),
            transports: None,
        }
    }

    pub fn authorization(mut self, provider: Arc<dyn AuthorizationProvider>) -> Self {
        self.authorization = Some(provider);
        self
    }

    pub fn static_authorization(self, value: impl Into<String>) -> Self {
        self.authorization(Arc::new(StaticAuthorization::new(value)))
    }

    pub fn operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn max_response_body_bytes(mut self, max_response_body_bytes: usize) -> Self {
        self.max_response_body_bytes = max_response_body_bytes.max(1);
        self
    }

    pub fn pool_idle_timeout(mut self, pool_idle_timeout: Duration) -> Self {
        self.pool_idle_timeout = pool_idle_timeout.max(Duration::from_millis(1));
        self
    }

    pub fn pool_max_idle_per_host(mut self, pool_max_idle_per_host: usize) -> Self {
        self.pool_max_idle_per_host = pool_max_idle_per_host.max(1);
        self
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn try_default_header(self, name: &str, value: &str) -> HubResult<Self> {
        let name = parse_header_name(name)?;
        let value = parse_header_value(name.as_str(), value)?;
        Ok(self.default_header(name, value))
    }

    /// Replaces the default status-to-error table.
    pub fn error_mapping(mut self, error_mapping: ErrorMapping) -> Self {
        self.error_mapping = error_mapping;
        self
    }

    pub fn response_classifier(mut self, classifier: ResponseClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn success_exemption(mut self, exemption: Arc<dyn SuccessExemption>) -> Self {
        self.classifier = self.classifier.exemption(exemption);
        self
    }

    pub fn clear_success_exemptions(mut self) -> Self {
        self.classifier = ResponseClassifier::strict();
        self
    }

    /// Uses caller-supplied transports instead of the built-in hyper clients.
    ///
    /// `default` must enforce the operation timeout itself; `unbounded` must not
    /// enforce any timeout.
    pub fn transports(mut self, default: Arc<dyn Transport>, unbounded: Arc<dyn Transport>) -> Self {
        self.transports = Some(TransportPair { default, unbounded });
        self
    }

    pub fn try_build(self) -> HubResult<HubClient> {
        let Some(authorization) = self.authorization else {
            return Err(HubError::argument(
                "authorization",
                "an authorization provider is required",
            ));
        };
        let user_agent = parse_header_value(USER_AGENT.as_str(), &self.user_agent)?;
        let transports = match self.transports {
            Some(transports) => transports,
            None => {
                let options = TransportOptions {
                    timeout: Some(self.operation_timeout),
                    pool_idle_timeout: self.pool_idle_timeout,
                    pool_max_idle_per_host: self.pool_max_idle_per_host,
                    max_response_body_bytes: self.max_response_body_bytes,
                };
                let default = HyperTransport::build(options)?;
                let unbounded = HyperTransport::build(TransportOptions {
                    timeout: None,
                    ..options
                })?;
                TransportPair {
                    default: Arc::new(default),
                    unbounded: Arc::new(unbounded),
                }
            }
        };

        Ok(HubClient {
            inner: Arc::new(ClientInner {
                base_url: self.base_url,
                authorization,
                default_headers: self.default_headers,
                operation_timeout: self.operation_timeout,
                client_name: self.client_name,
                user_agent,
                error_mapping: self.error_mapping,
                classifier: self.classifier,
                transports: Mutex::new(Some(transports)),
            }),
        })
    }

    pub fn build(self) -> HubClient {
        self.try_build()
            .unwrap_or_else(|error| panic!("failed to build hubreq client: {error}"))
    }
}

struct ClientInner {
    base_url: String,
    authorization: Arc<dyn AuthorizationProvider>,
    default_headers: HeaderMap,
    operation_timeout: Duration,
    client_name: String,
    user_agent: HeaderValue,
    error_mapping: ErrorMapping,
    classifier: ResponseClassifier,
    transports: Mutex<Option<TransportPair>>,
}

/// Executes service calls. Cheap to clone; clones share transports and disposal.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<ClientInner>,
}

impl HubClient {
    pub fn builder(base_url: impl Into<String>) -> HubClientBuilder {
        HubClientBuilder::new(base_url)
    }

    pub fn operation_timeout(&self) -> Duration {
        self.inner.operation_timeout
    }

    pub fn error_mapping(&self) -> &ErrorMapping {
        &self.inner.error_mapping
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, path.into())
    }

    pub fn get(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    /// Fetches an entity; a 404 yields `None` unless `throw_if_not_found` is set.
    pub async fn get_entity<T>(&self, path: &str, throw_if_not_found: bool) -> HubResult<Option<T>>
    where
        T: DeserializeOwned + ETagHolder,
    {
        let classify = if throw_if_not_found {
            Classify::Standard
        } else {
            Classify::TolerateNotFound
        };
        self.get(path)
            .classify(classify)
            .send_with(|response| {
                if response.status() == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                response.json_with_etag().map(Some)
            })
            .await
    }

    /// Stores `entity`, sending the precondition `operation` implies for its etag.
    pub async fn put_entity<T>(&self, path: &str, entity: &T, operation: ETagOperation) -> HubResult<T>
    where
        T: Serialize + DeserializeOwned + ETagHolder,
    {
        self.put(path)
            .if_match(operation, entity.etag())
            .json(entity)?
            .send_json_with_etag()
            .await
    }

    pub async fn delete_entity(
        &self,
        path: &str,
        operation: ETagOperation,
        etag: Option<&str>,
    ) -> HubResult<()> {
        self.delete(path)
            .if_match(operation, etag)
            .send_with(|_| Ok(()))
            .await
    }

    /// Runs one call through the full pipeline.
    ///
    /// `mutate` attaches body and headers before anything is sent; its errors
    /// are returned as-is. `process` receives the response only when the call
    /// is classified as successful.
    pub async fn execute<T, M, P>(
        &self,
        method: Method,
        path: &str,
        options: CallOptions,
        mutate: M,
        process: P,
    ) -> HubResult<T>
    where
        M: FnOnce(&mut OutgoingRequest) -> HubResult<()>,
        P: FnOnce(HttpResponse) -> HubResult<T>,
    {
        let CallOptions {
            timeout,
            error_overrides,
            classify,
            headers,
            cancel,
        } = options;
        let error_mapping = self.inner.error_mapping.merged(error_overrides.as_ref());
        let (uri_text, uri) = resolve_uri(&self.inner.base_url, path)?;
        let redacted_uri_text = redact_uri_for_logs(&uri_text);
        let strategy = TimeoutStrategy::select(timeout, self.inner.operation_timeout);
        let span = info_span!(
            "hubreq.request",
            client = %self.inner.client_name,
            method = %method,
            uri = %redacted_uri_text,
            timeout = ?strategy
        );

        async move {
            let mut request =
                OutgoingRequest::new(method, uri, self.request_headers(headers)?);
            mutate(&mut request)?;
            let request = request.into_http()?;
            let transport = self.transport_for(strategy)?;
            let cancellation =
                CallCancellation::new(strategy, cancel.unwrap_or_else(CancellationToken::new));

            debug!("dispatching request");
            let response = match cancellation.run(transport.send(request)).await {
                Ok(response) => response,
                Err(failure) => {
                    let error = translate_failure(failure, cancellation.caller_cancelled());
                    warn!(kind = %error.kind(), error = %error, "request failed before a response");
                    return Err(error);
                }
            };
            drop(cancellation);

            let outcome = classify.outcome(&self.inner.classifier, &response);
            debug!(status = response.status().as_u16(), outcome = ?outcome, "response classified");
            match outcome {
                ResponseOutcome::Success => process(response),
                ResponseOutcome::MappedFailure => Err(error_mapping.resolve(&response)),
            }
        }
        .instrument(span)
        .await
    }

    fn request_headers(&self, call_headers: HeaderMap) -> HubResult<HeaderMap> {
        let mut headers = self.inner.default_headers.clone();
        let authorization = self.inner.authorization.authorization_header()?;
        let mut authorization = parse_header_value(AUTHORIZATION.as_str(), &authorization)?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(USER_AGENT, self.inner.user_agent.clone());

        let mut current_name = None;
        for (name, value) in call_headers {
            if let Some(name) = name {
                current_name = Some(name);
            }
            if let Some(name) = &current_name {
                headers.append(name.clone(), value);
            }
        }
        Ok(headers)
    }

    fn transport_for(&self, strategy: TimeoutStrategy) -> HubResult<Arc<dyn Transport>> {
        let transports = lock_unpoisoned(&self.inner.transports);
        let Some(transports) = transports.as_ref() else {
            return Err(HubError::argument("client", "client has been disposed"));
        };
        Ok(match strategy {
            TimeoutStrategy::UseClientDefault => Arc::clone(&transports.default),
            TimeoutStrategy::PerCallOverride(_) => Arc::clone(&transports.unbounded),
        })
    }

    /// Releases both transports. Later calls are no-ops.
    pub fn dispose(&self) {
        let taken = lock_unpoisoned(&self.inner.transports).take();
        if let Some(transports) = taken {
            transports.default.close();
            transports.unbounded.close();
            debug!(client = %self.inner.client_name, "client disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        lock_unpoisoned(&self.inner.transports).is_none()
    }
}
