use anyhow::{Context, Result};
use std::time::Duration;

use gotime::coordinator::{BarrierClient, ClientConfig, FinishReply};

/// Parameters shared by the client subcommands
pub struct ClientParams {
    pub url: String,
    pub timeout_secs: u64,
    pub interval_ms: u64,
    pub max_polls: u32,
}

fn client(params: &ClientParams) -> Result<BarrierClient> {
    let config = ClientConfig::new(params.url.clone())
        .with_timeout(Duration::from_secs(params.timeout_secs))
        .with_poll_interval(Duration::from_millis(params.interval_ms))
        .with_max_polls(params.max_polls);

    BarrierClient::new(config).context("Failed to create barrier client")
}

/// Block until admitted; returns whether the client got `GO`
pub async fn wait_for_go(params: ClientParams) -> Result<bool> {
    let client = client(&params)?;

    match client.wait_for_go().await {
        Ok(polls) => {
            tracing::info!(url = %params.url, polls = polls, "GO");
            println!("GO");
            Ok(true)
        }
        Err(gotime::coordinator::ClientError::GaveUp { polls }) => {
            tracing::warn!(url = %params.url, polls = polls, "Giving up, still NOGO");
            println!("NOGO");
            Ok(false)
        }
        Err(e) => Err(e).context("Start request failed"),
    }
}

/// Report completion; returns whether the coordinator accepted it
pub async fn report_finish(params: ClientParams) -> Result<bool> {
    let client = client(&params)?;
    let reply = client.finish().await.context("Finish request failed")?;

    match reply {
        FinishReply::Ok => {
            println!("OK");
            Ok(true)
        }
        FinishReply::Ko => {
            tracing::warn!(url = %params.url, "Completion refused");
            println!("KO");
            Ok(false)
        }
    }
}
