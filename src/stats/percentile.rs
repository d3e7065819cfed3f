//! Nearest-rank percentiles over a sample stream

use std::io::BufRead;
use thiserror::Error;

/// Percentiles printed by the report, in order
pub const REPORTED_PERCENTILES: [u32; 3] = [90, 95, 99];

/// Errors while computing percentiles
#[derive(Error, Debug)]
pub enum StatsError {
    /// Input contained no parsable number
    #[error("no samples in input")]
    NoSamples,

    /// Percentile outside 1..=100
    #[error("invalid percentile {0}, expected 1..=100")]
    InvalidPercentile(u32),

    /// Reading the input failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line that could not be parsed as a number
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub line: usize,
    pub text: String,
    pub reason: String,
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "number conversion error: line {}: {:?}: {}",
            self.line, self.text, self.reason
        )
    }
}

/// Sorted samples plus the lines that were skipped
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    values: Vec<f64>,
    rejected: Vec<Rejected>,
}

impl SampleSet {
    /// Build from unsorted values
    pub fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        Self {
            values,
            rejected: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn rejected(&self) -> &[Rejected] {
        &self.rejected
    }

    /// Value at percentile `n`
    pub fn percentile(&self, n: u32) -> Result<f64, StatsError> {
        percentile(&self.values, n)
    }
}

/// Read one number per line; blank lines are ignored, garbage is recorded
pub fn read_samples<R: BufRead>(reader: R) -> Result<SampleSet, StatsError> {
    let mut values = Vec::new();
    let mut rejected = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match text.parse::<f64>() {
            Ok(value) => values.push(value),
            Err(e) => rejected.push(Rejected {
                line: index + 1,
                text: text.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    let mut set = SampleSet::from_values(values);
    set.rejected = rejected;
    Ok(set)
}

/// Value at percentile `n` of an ascending slice
///
/// Picks index `len * (n - 1) / 100` with integer division.
pub fn percentile(sorted: &[f64], n: u32) -> Result<f64, StatsError> {
    if !(1..=100).contains(&n) {
        return Err(StatsError::InvalidPercentile(n));
    }
    if sorted.is_empty() {
        return Err(StatsError::NoSamples);
    }

    let index = sorted.len() * (n as usize - 1) / 100;
    Ok(sorted[index])
}

/// Tab-separated report line for [`REPORTED_PERCENTILES`]
pub fn format_report(samples: &SampleSet) -> Result<String, StatsError> {
    let values = REPORTED_PERCENTILES
        .iter()
        .map(|&n| samples.percentile(n).map(|v| v.to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format!("{}\n", values.join("\t")))
}
