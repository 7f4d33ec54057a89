use std::sync::Arc;

use http::StatusCode;

use crate::response::HttpResponse;
use crate::{BULK_PARTIAL_FAILURE_CODE, ERROR_CODE_HEADER};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success,
    MappedFailure,
}

/// A narrow carve-out that lets a non-2xx response through as a success.
pub trait SuccessExemption: Send + Sync {
    fn exempts(&self, response: &HttpResponse) -> bool;
}

/// Exempts responses whose error-code header carries a specific code.
#[derive(Clone, Debug)]
pub struct ErrorCodeExemption {
    header: String,
    code: String,
}

impl ErrorCodeExemption {
    pub fn new(header: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            code: code.into(),
        }
    }

    /// Bulk registry operations report per-item failures in the body.
    pub fn bulk_partial_failure() -> Self {
        Self::new(ERROR_CODE_HEADER, BULK_PARTIAL_FAILURE_CODE)
    }
}

impl SuccessExemption for ErrorCodeExemption {
    fn exempts(&self, response: &HttpResponse) -> bool {
        response
            .header_str(&self.header)
            .is_some_and(|code| code.trim() == self.code)
    }
}

/// Client-level success predicate.
#[derive(Clone)]
pub struct ResponseClassifier {
    exemptions: Vec<Arc<dyn SuccessExemption>>,
}

impl std::fmt::Debug for ResponseClassifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ResponseClassifier")
            .field("exemptions", &self.exemptions.len())
            .finish()
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl ResponseClassifier {
    pub fn standard() -> Self {
        Self {
            exemptions: vec![Arc::new(ErrorCodeExemption::bulk_partial_failure())],
        }
    }

    pub fn strict() -> Self {
        Self {
            exemptions: Vec::new(),
        }
    }

    pub fn exemption(mut self, exemption: Arc<dyn SuccessExemption>) -> Self {
        self.exemptions.push(exemption);
        self
    }

    pub fn classify(&self, response: &HttpResponse) -> ResponseOutcome {
        if response.status().is_success()
            || self
                .exemptions
                .iter()
                .any(|exemption| exemption.exempts(response))
        {
            ResponseOutcome::Success
        } else {
            ResponseOutcome::MappedFailure
        }
    }
}

/// Per-call classification override.
#[derive(Clone, Default)]
pub enum Classify {
    #[default]
    Standard,
    /// Lookups that accept absence: 404 counts as success.
    TolerateNotFound,
    Custom(Arc<dyn Fn(&HttpResponse) -> ResponseOutcome + Send + Sync>),
}

impl std::fmt::Debug for Classify {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => formatter.write_str("Standard"),
            Self::TolerateNotFound => formatter.write_str("TolerateNotFound"),
            Self::Custom(_) => formatter.write_str("Custom(..)"),
        }
    }
}

impl Classify {
    pub fn custom<F>(classify: F) -> Self
    where
        F: Fn(&HttpResponse) -> ResponseOutcome + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(classify))
    }

    pub(crate) fn outcome(
        &self,
        classifier: &ResponseClassifier,
        response: &HttpResponse,
    ) -> ResponseOutcome {
        match self {
            Self::Standard => classifier.classify(response),
            Self::TolerateNotFound if response.status() == StatusCode::NOT_FOUND => {
                ResponseOutcome::Success
            }
            Self::TolerateNotFound => classifier.classify(response),
            Self::Custom(classify) => classify(response),
        }
    }
}
