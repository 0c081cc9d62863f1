use crate::domain::model::{ApiResponse, SessionState};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;

/// A request on its way through the middleware chain to the transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Structured body, turned into `body` bytes by a serializing middleware.
    pub json: Option<serde_json::Value>,
    pub body: Option<Vec<u8>>,
    pub basic_auth: Option<(String, Option<String>)>,
}

impl OutgoingRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            json: None,
            body: None,
            basic_auth: None,
        }
    }
}

/// Hooks run around every request a client sends.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn before_request(&self, _request: &mut OutgoingRequest) -> Result<()> {
        Ok(())
    }

    fn after_response(&self, _response: &mut ApiResponse) -> Result<()> {
        Ok(())
    }
}

/// Source of the current user's credentials.
#[async_trait]
pub trait SessionConfig: Send + Sync {
    /// Key used as the basic-auth password for controller requests.
    fn controller_key(&self) -> Option<String>;

    /// Reload the session, e.g. after a login or when credentials are rejected.
    async fn fetch(&self) -> Result<SessionState>;
}
