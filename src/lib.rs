//! Process and system metrics monitor: samples per-core CPU, load averages
//! and per-process CPU/memory/status on a fixed interval, buffers the
//! samples as time series, exports CSV/HTML (optionally PDF) reports and can
//! serve a live-updating web dashboard.

pub mod config;
pub mod export;
pub mod live;
pub mod metrics;
pub mod sampler;
pub mod system;
