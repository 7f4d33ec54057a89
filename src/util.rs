use std::sync::Mutex;

use http::Uri;
use http::header::{HeaderName, HeaderValue};

use crate::error::HubError;

const MAX_ERROR_BODY_LEN: usize = 2048;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn redact_uri_for_logs(uri_text: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(uri_text) else {
        return uri_text.split('?').next().unwrap_or(uri_text).to_owned();
    };

    let _ = parsed.set_username("");
    let _ = parsed.set_password(None);
    parsed.set_query(None);
    parsed.set_fragment(None);
    parsed.to_string()
}

fn is_absolute_http(path: &str) -> bool {
    let lower = path
        .get(..8)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub(crate) fn resolve_uri(base_url: &str, path: &str) -> Result<(String, Uri), HubError> {
    let uri_text = if is_absolute_http(path) {
        path.to_owned()
    } else {
        join_base_path(base_url, path)
    };
    let uri: Uri = uri_text.parse().map_err(|_| HubError::InvalidUri {
        uri: uri_text.clone(),
    })?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(HubError::InvalidUri { uri: uri_text });
    }
    Ok((uri_text, uri))
}

pub(crate) fn join_base_path(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let relative = path.trim_start_matches('/');
    match (base.is_empty(), relative.is_empty()) {
        (true, true) => String::new(),
        (true, false) => relative.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{base}/{relative}"),
    }
}

pub(crate) fn parse_header_name(name: &str) -> Result<HeaderName, HubError> {
    name.parse()
        .map_err(|source| HubError::InvalidHeaderName {
            name: name.to_owned(),
            source,
        })
}

pub(crate) fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, HubError> {
    value
        .parse()
        .map_err(|source| HubError::InvalidHeaderValue {
            name: name.to_owned(),
            source,
        })
}

pub(crate) fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= MAX_ERROR_BODY_LEN {
        return text.into_owned();
    }

    let truncated: String = text.chars().take(MAX_ERROR_BODY_LEN).collect();
    format!("{truncated}...(truncated)")
}
