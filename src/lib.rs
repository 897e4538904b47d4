//! Async uptime and latency monitor — probe scheduling with dynamic polling,
//! incident tracking, email alerting, and host telemetry snapshots.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod alert;
pub mod clock;
pub mod engine;
pub mod kv;
#[cfg(feature = "metrics")] pub mod metrics;
pub mod probe;
pub mod snapshot;
pub mod store;
pub mod telemetry;

mod error;
mod model;
mod monitor;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}
#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	error::{Error, Result},
	model::{
		DEFAULT_ALERT_THRESHOLD, DEFAULT_CHECK_INTERVAL_MIN, DEFAULT_FAILURE_POLL_INTERVAL_SECS,
		DEFAULT_RECOVERY_THRESHOLD, HealthPoint, Incident, IncidentId, ProbeLog, SystemConfig,
		SystemSnapshot, Target, TargetId, TargetStatus, UPTIME_WINDOW, uptime_percentage,
	},
	monitor::{Monitor, MonitorBuilder, MonitorHandle},
};
