use crate::domain::model::ApiResponse;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Can't make request without URL")]
    MissingUrl,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}")]
    Status {
        status: StatusCode,
        url: String,
        response: Arc<ApiResponse>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid config value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

impl ClientError {
    /// HTTP status of a rejected response, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// The rejected response, when the error came from a non-success status.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            ClientError::Status { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ClientError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                "Not logged in or the controller key was rejected".to_string()
            }
            ClientError::Status { status, response, .. } => {
                match response.body.get("message").and_then(|m| m.as_str()) {
                    Some(message) => format!("Server responded {}: {}", status, message),
                    None => format!("Server responded {}", status),
                }
            }
            ClientError::Transport(_) => "Could not reach the server".to_string(),
            ClientError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
