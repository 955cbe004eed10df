pub mod logging;

#[cfg(feature = "monitoring")]
pub mod metrics;
