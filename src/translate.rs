use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::error::{BoxError, HubError};

/// A failure raised below the HTTP layer while a request was in flight.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchFailure {
    #[error("transport request failed: {0}")]
    Transport(#[source] BoxError),
    #[error("i/o failure: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
    #[error("response body too large ({actual_bytes} bytes > {limit_bytes} bytes)")]
    BodyTooLarge {
        limit_bytes: usize,
        actual_bytes: usize,
    },
    #[error("transport timed out after {}ms", .after.as_millis())]
    TimedOut { after: Duration },
    #[error("request was cancelled")]
    Cancelled,
    #[error("{} dispatch failures", .0.len())]
    Aggregate(Vec<DispatchFailure>),
    #[error(transparent)]
    Fatal(BoxError),
    #[error(transparent)]
    Other(BoxError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureShape {
    Fatal,
    TimeoutShaped,
    CancellationShaped,
    NetworkShaped,
    Other,
}

fn io_error_shape(error: &std::io::Error) -> FailureShape {
    match error.kind() {
        std::io::ErrorKind::OutOfMemory => FailureShape::Fatal,
        std::io::ErrorKind::TimedOut => FailureShape::TimeoutShaped,
        _ => FailureShape::NetworkShaped,
    }
}

/// Walks the source chain of a library error looking for the io failure behind it.
fn source_chain_shape(error: &(dyn StdError + 'static)) -> Option<FailureShape> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(error) = current {
        if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
            return Some(io_error_shape(io_error));
        }
        current = error.source();
    }
    None
}

pub fn classify_failure(failure: &DispatchFailure) -> FailureShape {
    match failure {
        DispatchFailure::Fatal(_) => FailureShape::Fatal,
        DispatchFailure::Io(error) => io_error_shape(error),
        DispatchFailure::Transport(error) | DispatchFailure::Body(error) => {
            source_chain_shape(error.as_ref()).unwrap_or(FailureShape::NetworkShaped)
        }
        DispatchFailure::TimedOut { .. } => FailureShape::TimeoutShaped,
        DispatchFailure::Cancelled => FailureShape::CancellationShaped,
        DispatchFailure::BodyTooLarge { .. } | DispatchFailure::Other(_) => FailureShape::Other,
        DispatchFailure::Aggregate(failures) => {
            let shapes: Vec<FailureShape> = failures.iter().map(classify_failure).collect();
            if shapes.contains(&FailureShape::Fatal) {
                FailureShape::Fatal
            } else if shapes.contains(&FailureShape::TimeoutShaped) {
                FailureShape::TimeoutShaped
            } else {
                FailureShape::Other
            }
        }
    }
}

/// Removes the fatal failure from `failure`, unwrapped.
fn into_fatal_source(failure: DispatchFailure) -> BoxError {
    match failure {
        DispatchFailure::Fatal(source) => source,
        DispatchFailure::Io(error) => Box::new(error),
        DispatchFailure::Transport(source) | DispatchFailure::Body(source) => source,
        DispatchFailure::Aggregate(mut failures) => {
            match failures
                .iter()
                .position(|failure| classify_failure(failure) == FailureShape::Fatal)
            {
                Some(index) => into_fatal_source(failures.swap_remove(index)),
                None => Box::new(DispatchFailure::Aggregate(failures)),
            }
        }
        other => Box::new(other),
    }
}

/// Rewrites a dispatch failure into the public taxonomy.
///
/// `caller_cancelled` tells whether the caller's own token fired; a
/// cancellation without it can only have come from the per-call deadline.
pub fn translate_failure(failure: DispatchFailure, caller_cancelled: bool) -> HubError {
    match classify_failure(&failure) {
        FailureShape::Fatal => HubError::Fatal(into_fatal_source(failure)),
        FailureShape::CancellationShaped if caller_cancelled => HubError::Service {
            message: "the operation was cancelled by the caller".to_owned(),
            status: None,
            error_code: None,
            is_transient: false,
            source: Some(Box::new(failure)),
        },
        FailureShape::CancellationShaped => HubError::communication(
            "the operation timed out",
            Some(Box::new(failure)),
        ),
        FailureShape::TimeoutShaped => {
            HubError::communication("the operation timed out", Some(Box::new(failure)))
        }
        FailureShape::NetworkShaped => {
            HubError::communication(failure.to_string(), Some(Box::new(failure)))
        }
        FailureShape::Other => HubError::service(failure.to_string(), Some(Box::new(failure))),
    }
}
