//! Latency statistics for barrier runs
//!
//! Clients usually log one timing per line; this module turns such a stream
//! into the 90th, 95th and 99th percentiles.

pub mod percentile;

pub use percentile::{
    format_report, percentile, read_samples, Rejected, SampleSet, StatsError,
    REPORTED_PERCENTILES,
};
