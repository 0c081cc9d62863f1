use crate::core::middleware::{CookieJar, SerializeJson, WithCredentials};
use crate::core::transport::HttpTransport;
use crate::domain::model::{SessionState, User};
use crate::domain::ports::{Middleware, OutgoingRequest, SessionConfig};
use crate::utils::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Method;
use std::sync::{Arc, RwLock};

/// Session config loaded from the dashboard's config endpoint.
///
/// Shares the cookie jar with the client, so the session cookie set by a
/// login is what authenticates the fetch.
pub struct RemoteSession {
    config_url: String,
    transport: HttpTransport,
    credentials: WithCredentials,
    state: RwLock<SessionState>,
}

impl RemoteSession {
    pub fn new(config_url: impl Into<String>, transport: HttpTransport, jar: Arc<CookieJar>) -> Self {
        Self {
            config_url: config_url.into(),
            transport,
            credentials: WithCredentials::new(jar),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Last state seen by `fetch`.
    pub fn state(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SessionConfig for RemoteSession {
    fn controller_key(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .user
            .as_ref()
            .and_then(|user| user.controller_key.clone())
    }

    async fn fetch(&self) -> Result<SessionState> {
        let mut request = OutgoingRequest::new(Method::GET, self.config_url.clone());
        self.credentials.before_request(&mut request)?;

        tracing::debug!("Fetching session config from {}", self.config_url);
        let mut response = self.transport.send(request).await?;
        self.credentials.after_response(&mut response)?;
        SerializeJson.after_response(&mut response)?;

        if !response.is_success() {
            return Err(ClientError::Status {
                status: response.status,
                url: self.config_url.clone(),
                response: Arc::new(response),
            });
        }

        let state: SessionState = response.json()?;
        tracing::debug!("Session config loaded (signed in: {})", state.user.is_some());
        *self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = state.clone();
        Ok(state)
    }
}

/// Fixed controller key, for scripts and tools that never log in interactively.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    controller_key: Option<String>,
}

impl StaticSession {
    pub fn new(controller_key: Option<String>) -> Self {
        Self { controller_key }
    }
}

#[async_trait]
impl SessionConfig for StaticSession {
    fn controller_key(&self) -> Option<String> {
        self.controller_key.clone()
    }

    async fn fetch(&self) -> Result<SessionState> {
        Ok(SessionState {
            user: self.controller_key.as_ref().map(|key| User {
                controller_key: Some(key.clone()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}
