use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::Request;
use http_body_util::Full;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::timeout;
use tracing::debug;

use crate::HubResult;
use crate::body::read_all_body_limited;
use crate::error::HubError;
use crate::response::HttpResponse;
use crate::translate::DispatchFailure;

/// Sends one request and buffers the response.
///
/// Implementations are long-lived and shared by concurrent calls.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<HttpResponse, DispatchFailure>>;

    /// Signals that the owning client is done with this transport. Called at most
    /// once, by [`crate::HubClient::dispose`]; pooled connections are released
    /// when the last `Arc` holding the transport is dropped.
    fn close(&self) {}
}

type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

#[derive(Clone, Copy, Debug)]
pub(crate) struct TransportOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) pool_idle_timeout: Duration,
    pub(crate) pool_max_idle_per_host: usize,
    pub(crate) max_response_body_bytes: usize,
}

/// hyper-backed transport with an optional intrinsic timeout covering send and body read.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    timeout: Option<Duration>,
    max_response_body_bytes: usize,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HyperTransport")
            .field("timeout", &self.timeout)
            .field("max_response_body_bytes", &self.max_response_body_bytes)
            .finish()
    }
}

impl HyperTransport {
    pub(crate) fn build(options: TransportOptions) -> HubResult<Self> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|source| HubError::TransportInit {
                message: source.to_string(),
            })?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http);
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build(https);
        Ok(Self {
            client,
            timeout: options.timeout,
            max_response_body_bytes: options.max_response_body_bytes,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn exchange(&self, request: Request<Bytes>) -> Result<HttpResponse, DispatchFailure> {
        let request = request.map(Full::new);
        let response = self
            .client
            .request(request)
            .await
            .map_err(|source| DispatchFailure::Transport(Box::new(source)))?;
        let (parts, body) = response.into_parts();
        let body = read_all_body_limited(body, self.max_response_body_bytes).await?;
        Ok(HttpResponse::new(parts.status, parts.headers, body))
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: Request<Bytes>) -> BoxFuture<'_, Result<HttpResponse, DispatchFailure>> {
        Box::pin(async move {
            match self.timeout {
                Some(limit) => match timeout(limit, self.exchange(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(DispatchFailure::TimedOut { after: limit }),
                },
                None => self.exchange(request).await,
            }
        })
    }

    fn close(&self) {
        debug!(timeout = ?self.timeout, "closing transport");
    }
}
