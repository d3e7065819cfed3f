use anyhow::{Context, Result};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

use gotime::stress::{StressConfig, SyslogSink, SyslogStress};

/// Parameters for the syslog stress run
pub struct StressParams {
    pub delay_us: u64,
    pub seed: u64,
    pub length: usize,
    pub words: bool,
    pub tag: String,
    pub count: Option<u64>,
}

/// Flood the local syslog until interrupted or `count` messages are sent
pub async fn stress(params: StressParams) -> Result<()> {
    let config = StressConfig {
        seed: params.seed,
        length: params.length,
        words: params.words,
        tag: params.tag,
        delay: Duration::from_micros(params.delay_us),
        limit: params.count,
    };

    let sink = SyslogSink::connect().await?;
    let pump = SyslogStress::new(config);
    let stats = pump.stats();

    let mut usr1 = signal(SignalKind::user_defined1()).context("Failed to install SIGUSR1 handler")?;
    let mut int = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let mut task = tokio::spawn(pump.run(sink));

    loop {
        tokio::select! {
            _ = usr1.recv() => {
                println!("{}", stats.display());
            }
            _ = int.recv() => break,
            _ = term.recv() => break,
            result = &mut task => {
                println!("{}", stats.display());
                result.context("Stress task panicked")??;
                return Ok(());
            }
        }
    }

    task.abort();
    println!("{}", stats.display());
    Ok(())
}
