use anyhow::{Context, Result};
use std::io::Write;

use gotime::stats::{format_report, read_samples};

/// Read samples from stdin and print the 90/95/99th percentiles
pub fn percentile() -> Result<()> {
    let stdin = std::io::stdin();
    let samples = read_samples(stdin.lock()).context("Failed to read samples")?;

    let mut stderr = std::io::stderr().lock();
    for rejected in samples.rejected() {
        writeln!(stderr, "{rejected}")?;
    }

    let report = format_report(&samples)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(report.as_bytes())?;
    stdout.flush()?;

    Ok(())
}
