//! Statistics for the fan-out hub

pub mod metrics;

pub use metrics::HubStats;
