//! `hubreq` is the request-execution core for cloud service SDK clients.
//!
//! It turns a logical operation into a wire request, attaches credentials and
//! client identification, dispatches it, classifies the response and reports
//! every failure through one small taxonomy ([`HubError`] / [`ErrorKind`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use hubreq::prelude::{ETagHolder, ETagOperation, HubClient};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Deserialize, Serialize)]
//! struct Device {
//!     id: String,
//!     #[serde(rename = "etag", default)]
//!     etag: Option<String>,
//! }
//!
//! impl ETagHolder for Device {
//!     fn etag(&self) -> Option<&str> {
//!         self.etag.as_deref()
//!     }
//!
//!     fn set_etag(&mut self, etag: String) {
//!         self.etag = Some(etag);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HubClient::builder("https://my-hub.example.net")
//!         .static_authorization("SharedAccessSignature sr=...")
//!         .operation_timeout(Duration::from_secs(30))
//!         .try_build()?;
//!
//!     let device: Option<Device> = client.get_entity("/devices/thermostat-1", false).await?;
//!     if let Some(device) = device {
//!         let updated = client
//!             .put_entity("/devices/thermostat-1", &device, ETagOperation::UpdateExisting)
//!             .await?;
//!         println!("stored {} at {:?}", updated.id, updated.etag);
//!     }
//!
//!     client.dispose();
//!     Ok(())
//! }
//! ```

/// Header carrying the service's machine-readable error code.
pub const ERROR_CODE_HEADER: &str = "iothub-errorcode";
/// Error code reported when a bulk operation partially failed; the body holds per-item results.
pub const BULK_PARTIAL_FAILURE_CODE: &str = "BulkRegistryOperationFailure";

mod auth;
mod body;
mod classify;
mod client;
mod error;
mod etag;
mod mapping;
mod request;
mod response;
mod timeout;
mod translate;
mod transport;
mod util;

pub use crate::auth::{AuthorizationProvider, StaticAuthorization};
pub use crate::body::{BATCH_CONTENT_TYPE, JSON_CONTENT_TYPE, RAW_CONTENT_TYPE, RequestBody};
pub use crate::classify::{
    Classify, ErrorCodeExemption, ResponseClassifier, ResponseOutcome, SuccessExemption,
};
pub use crate::client::{HubClient, HubClientBuilder};
pub use crate::error::{DomainErrorKind, ErrorKind, HubError};
pub use crate::etag::{ETagHolder, ETagOperation, if_match_value, normalize_etag};
pub use crate::mapping::{ErrorDetails, ErrorFactory, ErrorMapping, domain_error, generic_error};
pub use crate::request::{CallOptions, OutgoingRequest, RequestBuilder};
pub use crate::response::HttpResponse;
pub use crate::timeout::{CallCancellation, TimeoutStrategy};
pub use crate::translate::{DispatchFailure, FailureShape, classify_failure, translate_failure};
pub use crate::transport::{HyperTransport, Transport};

pub use tokio_util::sync::CancellationToken;

pub type HubResult<T> = std::result::Result<T, HubError>;

pub mod prelude {
    pub use crate::{
        AuthorizationProvider, CallOptions, CancellationToken, Classify, DomainErrorKind,
        ETagHolder, ETagOperation, ErrorKind, ErrorMapping, HttpResponse, HubClient, HubError,
        HubResult, RequestBody, ResponseOutcome, TimeoutStrategy,
    };
}
