use std::collections::BTreeMap;
use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;

use crate::ERROR_CODE_HEADER;
use crate::error::{DomainErrorKind, HubError};
use crate::response::HttpResponse;
use crate::util::truncate_body;

const ERROR_CODE_MARKER: &str = "ErrorCode:";

/// Builds the error raised for a response whose status has a mapping entry.
pub type ErrorFactory = Arc<dyn Fn(&HttpResponse) -> HubError + Send + Sync>;

/// Status code to error factory table.
///
/// A client carries one default table; a call may supply overrides, which are
/// merged into a fresh copy for that call only.
#[derive(Clone, Default)]
pub struct ErrorMapping {
    entries: BTreeMap<u16, ErrorFactory>,
}

impl std::fmt::Debug for ErrorMapping {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ErrorMapping")
            .field("statuses", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ErrorMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table every client starts from.
    pub fn standard() -> Self {
        Self::new()
            .domain(StatusCode::NOT_FOUND, DomainErrorKind::DeviceNotFound)
            .domain(StatusCode::CONFLICT, DomainErrorKind::DeviceAlreadyExists)
            .domain(StatusCode::BAD_REQUEST, DomainErrorKind::InvalidArgument)
            .domain(StatusCode::UNAUTHORIZED, DomainErrorKind::Unauthorized)
            .domain(StatusCode::FORBIDDEN, DomainErrorKind::QuotaExceeded)
            .domain(
                StatusCode::PRECONDITION_FAILED,
                DomainErrorKind::PreconditionFailed,
            )
            .domain(
                StatusCode::PAYLOAD_TOO_LARGE,
                DomainErrorKind::MessageTooLarge,
            )
            .domain(StatusCode::TOO_MANY_REQUESTS, DomainErrorKind::Throttled)
            .domain(
                StatusCode::INTERNAL_SERVER_ERROR,
                DomainErrorKind::ServerError,
            )
            .domain(StatusCode::SERVICE_UNAVAILABLE, DomainErrorKind::ServerBusy)
    }

    pub fn with<F>(mut self, status: StatusCode, factory: F) -> Self
    where
        F: Fn(&HttpResponse) -> HubError + Send + Sync + 'static,
    {
        self.insert(status, Arc::new(factory));
        self
    }

    /// Maps `status` to a [`HubError::Domain`] of the given kind.
    pub fn domain(self, status: StatusCode, kind: DomainErrorKind) -> Self {
        self.with(status, move |response| domain_error(kind, response))
    }

    pub fn insert(&mut self, status: StatusCode, factory: ErrorFactory) {
        self.entries.insert(status.as_u16(), factory);
    }

    pub fn remove(&mut self, status: StatusCode) -> Option<ErrorFactory> {
        self.entries.remove(&status.as_u16())
    }

    pub fn contains(&self, status: StatusCode) -> bool {
        self.entries.contains_key(&status.as_u16())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy of this table with `overrides` layered on top.
    pub fn merged(&self, overrides: Option<&ErrorMapping>) -> ErrorMapping {
        let mut merged = self.clone();
        if let Some(overrides) = overrides {
            for (status, factory) in &overrides.entries {
                merged.entries.insert(*status, Arc::clone(factory));
            }
        }
        merged
    }

    /// Produces the error for a failed response, falling back to a transient
    /// [`HubError::Service`] when the status has no entry.
    pub fn resolve(&self, response: &HttpResponse) -> HubError {
        match self.entries.get(&response.status().as_u16()) {
            Some(factory) => factory(response),
            None => generic_error(response),
        }
    }
}

/// Message and machine-readable code extracted from an error response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub message: String,
    pub error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Message", alias = "message")]
    message: Option<String>,
    #[serde(rename = "ExceptionMessage", alias = "exceptionMessage")]
    exception_message: Option<String>,
    #[serde(rename = "errorCode", alias = "ErrorCode")]
    error_code: Option<serde_json::Value>,
}

impl ErrorDetails {
    pub fn from_response(response: &HttpResponse) -> Self {
        let header_code = response
            .header_str(ERROR_CODE_HEADER)
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(ToOwned::to_owned);

        let parsed = serde_json::from_slice::<ErrorBody>(response.body()).ok();
        let body_code = parsed.as_ref().and_then(|body| {
            body.error_code
                .as_ref()
                .and_then(|code| match code {
                    serde_json::Value::String(text) => Some(text.clone()),
                    serde_json::Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .or_else(|| body.message.as_deref().and_then(error_code_from_message))
        });

        let message = parsed
            .as_ref()
            .and_then(|body| body.exception_message.clone().or(body.message.clone()))
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback_message(response));

        Self {
            message,
            error_code: header_code.or(body_code),
        }
    }
}

fn fallback_message(response: &HttpResponse) -> String {
    if response.body().is_empty() {
        return response
            .status()
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_owned();
    }
    truncate_body(response.body())
}

/// Pulls `code` out of messages shaped like `ErrorCode:code;Detail`.
fn error_code_from_message(message: &str) -> Option<String> {
    let start = message.find(ERROR_CODE_MARKER)? + ERROR_CODE_MARKER.len();
    let rest = &message[start..];
    let code = rest.split(';').next().unwrap_or(rest).trim();
    (!code.is_empty()).then(|| code.to_owned())
}

pub fn domain_error(kind: DomainErrorKind, response: &HttpResponse) -> HubError {
    let details = ErrorDetails::from_response(response);
    HubError::Domain {
        kind,
        status: response.status().as_u16(),
        message: details.message,
        error_code: details.error_code,
    }
}

pub fn generic_error(response: &HttpResponse) -> HubError {
    let details = ErrorDetails::from_response(response);
    HubError::Service {
        message: details.message,
        status: Some(response.status().as_u16()),
        error_code: details.error_code,
        is_transient: true,
        source: None,
    }
}
