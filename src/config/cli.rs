use crate::config::{ClientConfig, Endpoints, HostSettings};
use crate::utils::error::{ClientError, Result};
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "dashboard-client")]
#[command(about = "Command line access to the cluster controller and host job APIs")]
pub struct CliConfig {
    #[arg(long, help = "TOML config file; overrides the URL flags")]
    pub config: Option<String>,

    #[arg(long, default_value = "http://dashboard.localhost")]
    pub dashboard_url: String,

    #[arg(long, default_value = "http://controller.localhost")]
    pub controller_url: String,

    #[arg(long, help = "Use this controller key instead of a dashboard session")]
    pub controller_key: Option<String>,

    #[arg(long, help = "Host job API base URL, e.g. http://10.0.0.2:1113")]
    pub host_url: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Exchange a login token for a dashboard session
    Login { token: String },
    Logout,
    /// List apps
    Apps,
    App { app: String },
    Release { app: String },
    Formation { app: String, release: String },
    Jobs { app: String },
    Routes { app: String },
    Resources { app: String },
    DeleteRoute { app: String, route: String },
    DeleteApp { app: String },
    TaffyRelease,
    /// List jobs running on a host
    HostJobs,
    HostJob { id: String },
    StopJob { id: String },
    /// Follow job events on a host (all jobs by default)
    Events { id: Option<String> },
}

impl CliConfig {
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::new(Endpoints::from_base(
                &self.dashboard_url,
                &self.controller_url,
            )),
        };
        if let Some(url) = &self.host_url {
            config.host = Some(HostSettings { url: url.clone() });
        }
        Ok(config)
    }

    pub fn host_url(config: &ClientConfig) -> Result<String> {
        config
            .host
            .as_ref()
            .map(|host| host.url.clone())
            .ok_or_else(|| ClientError::ConfigError {
                message: "host URL is required (--host-url or [host] url)".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand_and_defaults() {
        let cli = CliConfig::parse_from(["dashboard-client", "--verbose", "routes", "web"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Routes { ref app } if app == "web"));

        let config = cli.client_config().unwrap();
        assert_eq!(config.endpoints.cluster_controller, "http://controller.localhost");
        assert_eq!(config.endpoints.login, "http://dashboard.localhost/user/sessions");
        assert!(CliConfig::host_url(&config).is_err());
    }

    #[test]
    fn test_host_url_flag() {
        let cli = CliConfig::parse_from([
            "dashboard-client",
            "--host-url",
            "http://10.0.0.2:1113",
            "events",
        ]);
        assert!(matches!(cli.command, Command::Events { id: None }));
        let config = cli.client_config().unwrap();
        assert_eq!(CliConfig::host_url(&config).unwrap(), "http://10.0.0.2:1113");
    }
}
