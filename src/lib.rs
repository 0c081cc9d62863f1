pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::{ClientConfig, Endpoints};
pub use crate::core::client::{DashboardClient, RequestArgs};
pub use crate::core::host::{HostClient, JobEventStream};
pub use crate::core::session::{RemoteSession, StaticSession};
pub use crate::utils::error::{ClientError, Result};
