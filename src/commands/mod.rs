pub mod client;
pub mod percentile;
pub mod serve;
pub mod stress;

// Re-export command functions for convenience
pub use client::{report_finish, wait_for_go, ClientParams};
pub use percentile::percentile;
pub use serve::{coordinator_server, CoordinatorParams};
pub use stress::{stress, StressParams};
