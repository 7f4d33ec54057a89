use crate::HubResult;

/// Supplies the literal `Authorization` header value, once per request.
pub trait AuthorizationProvider: Send + Sync {
    fn authorization_header(&self) -> HubResult<String>;
}

/// A fixed credential, e.g. a pre-minted shared access signature.
#[derive(Clone)]
pub struct StaticAuthorization {
    value: String,
}

impl StaticAuthorization {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl std::fmt::Debug for StaticAuthorization {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StaticAuthorization")
            .field("value", &"<redacted>")
            .finish()
    }
}

impl AuthorizationProvider for StaticAuthorization {
    fn authorization_header(&self) -> HubResult<String> {
        Ok(self.value.clone())
    }
}

impl<F> AuthorizationProvider for F
where
    F: Fn() -> HubResult<String> + Send + Sync,
{
    fn authorization_header(&self) -> HubResult<String> {
        self()
    }
}
