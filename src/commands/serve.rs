use anyhow::{Context, Result};
use std::path::PathBuf;

use gotime::coordinator::config::CoordinatorConfigBuilder;
use gotime::coordinator::{CoordinatorConfig, CoordinatorServer};

/// Parameters for the coordinator
pub struct CoordinatorParams {
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub quota: Option<u64>,
    pub verbose: bool,
    pub document_root: Option<PathBuf>,
    pub probe_timeout: Option<u64>,
    pub enable_logging: bool,
    pub readiness_command: Vec<String>,
}

/// Merge the config file (if any) with command-line flags
pub fn build_config(params: CoordinatorParams) -> Result<CoordinatorConfig> {
    let CoordinatorParams {
        config_file,
        host,
        port,
        quota,
        verbose,
        document_root,
        probe_timeout,
        enable_logging,
        readiness_command,
    } = params;

    let base = match &config_file {
        Some(path) => CoordinatorConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => CoordinatorConfig::default(),
    };

    let mut builder = CoordinatorConfigBuilder::from_config(base);

    if let Some(host) = host {
        let port = port.unwrap_or(gotime::coordinator::config::DEFAULT_PORT);
        builder = builder
            .bind_address_str(&format!("{host}:{port}"))
            .context("Invalid bind address")?;
    } else if let Some(port) = port {
        builder = builder.port(port);
    }
    if let Some(quota) = quota {
        builder = builder.quota(quota);
    }
    if verbose {
        builder = builder.verbose(true);
    }
    if let Some(root) = document_root {
        builder = builder.document_root(root);
    }
    if let Some(secs) = probe_timeout {
        builder = builder.probe_timeout_secs(secs);
    }
    if enable_logging {
        builder = builder.enable_request_logging(true);
    }
    if !readiness_command.is_empty() {
        builder = builder.readiness_command(readiness_command);
    }

    builder.build().context("Invalid coordinator configuration")
}

/// Run the coordinator until the quota is reached
pub async fn coordinator_server(params: CoordinatorParams) -> Result<()> {
    let config = build_config(params)?;
    let server = CoordinatorServer::new(config).context("Failed to create coordinator server")?;

    println!("{}", server.info().display());
    println!();

    server.start().await?;
    Ok(())
}
