use thiserror::Error;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The stable taxonomy every [`HubError`] falls into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    Communication,
    Service,
    Domain,
    Argument,
    Fatal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Communication => "communication",
            Self::Service => "service",
            Self::Domain => "domain",
            Self::Argument => "argument",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Typed failures produced by the error-mapping table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DomainErrorKind {
    DeviceNotFound,
    DeviceAlreadyExists,
    InvalidArgument,
    Unauthorized,
    QuotaExceeded,
    PreconditionFailed,
    MessageTooLarge,
    ServerError,
    ServerBusy,
    Throttled,
}

impl DomainErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeviceNotFound => "device_not_found",
            Self::DeviceAlreadyExists => "device_already_exists",
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthorized => "unauthorized",
            Self::QuotaExceeded => "quota_exceeded",
            Self::PreconditionFailed => "precondition_failed",
            Self::MessageTooLarge => "message_too_large",
            Self::ServerError => "server_error",
            Self::ServerBusy => "server_busy",
            Self::Throttled => "throttled",
        }
    }

    pub const fn is_transient(self) -> bool {
        matches!(self, Self::ServerError | Self::ServerBusy | Self::Throttled)
    }
}

impl std::fmt::Display for DomainErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HubError {
    #[error("communication with the service failed: {message}")]
    Communication {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("service request failed{}: {message}", status_suffix(*status))]
    Service {
        message: String,
        status: Option<u16>,
        error_code: Option<String>,
        is_transient: bool,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{kind} (status {status}): {message}")]
    Domain {
        kind: DomainErrorKind,
        status: u16,
        message: String,
        error_code: Option<String>,
    },
    #[error("invalid argument {name}: {message}")]
    Argument { name: &'static str, message: String },
    #[error("invalid request uri: {uri}")]
    InvalidUri { uri: String },
    #[error("invalid header name {name}: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("invalid header value for {name}: {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("failed to serialize request json: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build http request: {source}")]
    RequestBuild {
        #[source]
        source: http::Error,
    },
    #[error("failed to initialize transport: {message}")]
    TransportInit { message: String },
    #[error("failed to decode response json: {source}; body={body}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error(transparent)]
    Fatal(BoxError),
}

fn status_suffix(status: Option<u16>) -> String {
    match status {
        Some(status) => format!(" with status {status}"),
        None => String::new(),
    }
}

impl HubError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Communication { .. } => ErrorKind::Communication,
            Self::Service { .. } | Self::Deserialize { .. } => ErrorKind::Service,
            Self::Domain { .. } => ErrorKind::Domain,
            Self::Argument { .. }
            | Self::InvalidUri { .. }
            | Self::InvalidHeaderName { .. }
            | Self::InvalidHeaderValue { .. }
            | Self::Serialize { .. }
            | Self::RequestBuild { .. }
            | Self::TransportInit { .. } => ErrorKind::Argument,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Communication { .. } => true,
            Self::Service { is_transient, .. } => *is_transient,
            Self::Domain { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// Status code of the response that produced this error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => *status,
            Self::Domain { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Service { error_code, .. } | Self::Domain { error_code, .. } => {
                error_code.as_deref()
            }
            _ => None,
        }
    }

    pub(crate) fn argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::Argument {
            name,
            message: message.into(),
        }
    }

    pub(crate) fn communication(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Communication {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn service(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Service {
            message: message.into(),
            status: None,
            error_code: None,
            is_transient: true,
            source,
        }
    }
}
