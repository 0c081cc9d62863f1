use clap::Parser;
use dashboard_client::config::cli::Command;
use dashboard_client::core::middleware::CookieJar;
use dashboard_client::core::transport::HttpTransport;
use dashboard_client::utils::logger;
use dashboard_client::utils::validation::{validate_non_empty_string, Validate};
use dashboard_client::{
    CliConfig, ClientConfig, ClientError, DashboardClient, HostClient, StaticSession,
};
use serde::Serialize;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        let configured = cli.client_config().ok().and_then(|config| config.log_level);
        let level = if cli.verbose { Some("debug") } else { configured.as_deref() };
        logger::init_json_logger(level);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!("❌ Command failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());

        let exit_code = match e.status() {
            Some(status) if status.is_client_error() => 2,
            _ => 1,
        };
        std::process::exit(exit_code);
    }
}

async fn run(cli: &CliConfig) -> Result<(), ClientError> {
    let config = cli.client_config()?;
    config.validate()?;
    tracing::debug!("Client config: {:?}", config);

    let client = build_client(cli, &config)?;
    if cli.controller_key.is_none() {
        if let Err(e) = client.session().fetch().await {
            tracing::warn!("Could not load session config: {}", e);
        }
    }

    match &cli.command {
        Command::Login { token } => {
            validate_non_empty_string("token", token)?;
            client.login(token).await?;
            println!("✅ Logged in");
        }
        Command::Logout => {
            client.logout().await?;
            println!("✅ Logged out");
        }
        Command::Apps => print_json(&client.get_apps().await?)?,
        Command::App { app } => print_json(&client.get_app(app).await?)?,
        Command::Release { app } => print_json(&client.get_app_release(app).await?)?,
        Command::Formation { app, release } => {
            print_json(&client.get_app_formation(app, release).await?)?
        }
        Command::Jobs { app } => print_json(&client.get_app_jobs(app).await?)?,
        Command::Routes { app } => print_json(&client.get_app_routes(app).await?)?,
        Command::Resources { app } => print_json(&client.get_app_resources(app).await?)?,
        Command::DeleteRoute { app, route } => {
            client.delete_app_route(app, route).await?;
            println!("✅ Deleted route {}", route);
        }
        Command::DeleteApp { app } => {
            client.delete_app(app).await?;
            println!("✅ Deleted app {}", app);
        }
        Command::TaffyRelease => print_json(&client.get_taffy_release().await?)?,
        Command::HostJobs => print_json(&host_client(&config)?.list_jobs().await?)?,
        Command::HostJob { id } => match host_client(&config)?.get_job(id).await? {
            Some(job) => print_json(&job)?,
            None => println!("No job {} on this host", id),
        },
        Command::StopJob { id } => {
            host_client(&config)?.stop_job(id).await?;
            println!("✅ Stopped job {}", id);
        }
        Command::Events { id } => {
            let host = host_client(&config)?;
            let mut events = match id {
                Some(id) => host.stream_events(id).await?,
                None => host.stream_all_events().await?,
            };
            while let Some(event) = events.next_event().await? {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    Ok(())
}

fn build_client(cli: &CliConfig, config: &ClientConfig) -> Result<DashboardClient, ClientError> {
    match &cli.controller_key {
        Some(key) => Ok(DashboardClient::with_session(
            config.endpoints.clone(),
            HttpTransport::new(&config.http)?,
            Arc::new(CookieJar::new()),
            Arc::new(StaticSession::new(Some(key.clone()))),
        )),
        None => DashboardClient::new(config),
    }
}

fn host_client(config: &ClientConfig) -> Result<HostClient, ClientError> {
    Ok(HostClient::new(
        CliConfig::host_url(config)?,
        HttpTransport::new(&config.http)?,
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ClientError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
