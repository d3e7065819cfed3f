use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    coordinator_server, percentile, report_finish, stress, wait_for_go, ClientParams,
    CoordinatorParams, StressParams,
};

#[derive(Parser)]
#[command(
    name = "gotime",
    version,
    about = "HTTP rendezvous barrier for distributed load tests",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the barrier coordinator
    Serve {
        /// Configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of completions to wait for (0 = forever)
        #[arg(short = 'n', long)]
        quota: Option<u64>,

        /// Directory served for paths outside /gotime
        #[arg(long)]
        root: Option<PathBuf>,

        /// Readiness probe timeout in seconds
        #[arg(long)]
        probe_timeout: Option<u64>,

        /// Log every HTTP request
        #[arg(long, default_value = "false")]
        request_log: bool,

        /// Readiness command, run before admitting the first client
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Talk to a running coordinator
    Client {
        #[command(subcommand)]
        action: ClientAction,

        /// Coordinator base URL
        #[arg(long, global = true, default_value = "http://127.0.0.1:9090")]
        url: String,

        /// Request timeout in seconds
        #[arg(long, global = true, default_value = "10")]
        timeout: u64,

        /// Pause between two start polls in milliseconds
        #[arg(long, global = true, default_value = "1000")]
        interval: u64,

        /// Give up after this many NOGO answers (0 = never)
        #[arg(long, global = true, default_value = "0")]
        max_polls: u32,
    },

    /// Print the 90th, 95th and 99th percentiles of numbers read on stdin
    Percentile,

    /// Flood the local syslog with random messages
    Stress {
        /// Delay between messages in microseconds
        delay: u64,

        /// RNG seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Payload length
        #[arg(short, long, default_value_t = gotime::stress::DEFAULT_LENGTH)]
        length: usize,

        /// Generate words instead of random characters
        #[arg(short, long, default_value = "false")]
        words: bool,

        /// Message tag
        #[arg(short, long, default_value = gotime::stress::DEFAULT_TAG)]
        tag: String,

        /// Stop after this many messages
        #[arg(short, long)]
        count: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Poll until the coordinator answers GO
    Start,

    /// Report completion
    Finish,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            quota,
            root,
            probe_timeout,
            request_log,
            command,
        } => {
            tracing::debug!(
                config = ?config,
                port = ?port,
                quota = ?quota,
                command = ?command,
                "Starting serve command"
            );
            coordinator_server(CoordinatorParams {
                config_file: config,
                host,
                port,
                quota,
                verbose: cli.verbose,
                document_root: root,
                probe_timeout,
                enable_logging: request_log,
                readiness_command: command,
            })
            .await?;
        }

        Commands::Client {
            action,
            url,
            timeout,
            interval,
            max_polls,
        } => {
            let params = ClientParams {
                url,
                timeout_secs: timeout,
                interval_ms: interval,
                max_polls,
            };
            let accepted = match action {
                ClientAction::Start => wait_for_go(params).await?,
                ClientAction::Finish => report_finish(params).await?,
            };
            if !accepted {
                std::process::exit(1);
            }
        }

        Commands::Percentile => {
            percentile()?;
        }

        Commands::Stress {
            delay,
            seed,
            length,
            words,
            tag,
            count,
        } => {
            tracing::debug!(
                delay_us = delay,
                seed = seed,
                length = length,
                words = words,
                "Starting stress command"
            );
            stress(StressParams {
                delay_us: delay,
                seed,
                length,
                words,
                tag,
                count,
            })
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("gotime=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("gotime=info,warn")
    };

    // stdout carries command output (banner, GO/OK, percentiles)
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}
