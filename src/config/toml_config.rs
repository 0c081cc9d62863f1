use crate::utils::error::{ClientError, Result};
use crate::utils::validation::{validate_positive_number, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// URLs the client talks to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoints {
    /// Base URL of the cluster controller; controller paths are appended to it.
    pub cluster_controller: String,
    pub login: String,
    pub logout: String,
    /// Session config document (current user and controller key).
    pub config: String,
}

impl Endpoints {
    /// Derive the dashboard session endpoints from the dashboard base URL.
    pub fn from_base(dashboard_url: &str, cluster_controller: &str) -> Self {
        let base = dashboard_url.trim_end_matches('/');
        Self {
            cluster_controller: cluster_controller.trim_end_matches('/').to_string(),
            login: format!("{}/user/sessions", base),
            logout: format!("{}/user/session", base),
            config: format!("{}/config", base),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpSettings {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_user_agent() -> Option<String> {
    Some(format!("dashboard-client/{}", env!("CARGO_PKG_VERSION")))
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSettings {
    /// Base URL of a host's job API, e.g. `http://10.0.0.2:1113`.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub host: Option<HostSettings>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl ClientConfig {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            http: HttpSettings::default(),
            host: None,
            log_level: None,
        }
    }

    /// Load the config from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ClientError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ClientError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replace `${VAR}` with the environment value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ClientError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        validate_url("endpoints.cluster_controller", &self.endpoints.cluster_controller)?;
        validate_url("endpoints.login", &self.endpoints.login)?;
        validate_url("endpoints.logout", &self.endpoints.logout)?;
        validate_url("endpoints.config", &self.endpoints.config)?;
        validate_positive_number("http.timeout_seconds", self.http.timeout_seconds as usize, 1)?;
        if let Some(host) = &self.host {
            validate_url("host.url", &host.url)?;
        }
        Ok(())
    }
}
