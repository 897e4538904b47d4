//! Row types shared between the store, the probe engine, and the read paths.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Opaque identity of a target row.
pub type TargetId = i64;
/// Opaque identity of an incident row.
pub type IncidentId = i64;

/// Default healthy-cadence check interval in minutes.
pub const DEFAULT_CHECK_INTERVAL_MIN: u32 = 5;
/// Default fast-poll cadence in seconds while a target is down.
pub const DEFAULT_FAILURE_POLL_INTERVAL_SECS: u32 = 30;
/// Default consecutive-failure count that raises a CRITICAL alert.
pub const DEFAULT_ALERT_THRESHOLD: u32 = 3;
/// Default consecutive-success count that closes a down episode.
pub const DEFAULT_RECOVERY_THRESHOLD: u32 = 2;
/// Window applied by uptime read paths.
pub const UPTIME_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Health state tracked per target.
///
/// Unrecognised stored values deserialize as [`TargetStatus::Pending`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
	/// No probe outcome has been applied yet.
	#[default]
	Pending,
	/// Recent probes succeeded; the healthy cadence applies.
	Up,
	/// The target is failing and is polled at the fast cadence.
	Down,
}
impl<'de> Deserialize<'de> for TargetStatus {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Ok(match raw.as_str() {
			"up" => Self::Up,
			"down" => Self::Down,
			_ => Self::Pending,
		})
	}
}

/// A monitored HTTP endpoint with its configuration and health state.
///
/// Rows are created and edited by the control plane; the probe engine is the
/// sole mutator of `current_status`, `last_check_time`, and the two counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
	/// Row identity.
	pub id: TargetId,
	/// Human-readable name used in alerts and snapshots.
	pub name: String,
	/// Root URL probed with HTTP GET.
	pub url: Url,
	/// Nominal cadence in minutes while the target is healthy.
	#[serde(default = "default_check_interval_min")]
	pub check_interval_min: u32,
	/// Fast-poll cadence in seconds while the target is down.
	#[serde(default = "default_failure_poll_interval_secs")]
	pub failure_poll_interval_secs: u32,
	/// Consecutive failures required to raise a CRITICAL alert.
	#[serde(default = "default_alert_threshold")]
	pub alert_threshold: u32,
	/// Consecutive successes required to leave `Down`.
	#[serde(default = "default_recovery_threshold")]
	pub recovery_threshold: u32,
	/// Recipient for this target's alerts, when configured.
	#[serde(default)]
	pub alert_email: Option<String>,
	/// Whether the dispatch tick considers this target at all.
	#[serde(default = "default_true")]
	pub is_active: bool,
	/// Current health state.
	#[serde(default)]
	pub current_status: TargetStatus,
	/// Instant the most recent probe outcome was applied.
	#[serde(default)]
	pub last_check_time: Option<DateTime<Utc>>,
	/// Failure streak length; zeroed by every success.
	#[serde(default)]
	pub consecutive_failures: u32,
	/// Success streak length; zeroed by every failure.
	#[serde(default)]
	pub consecutive_successes: u32,
	/// Row creation instant.
	pub created_at: DateTime<Utc>,
	/// Instant of the most recent row mutation.
	pub updated_at: DateTime<Utc>,
}
impl Target {
	/// Construct a target row with default thresholds and cadences.
	pub fn new(name: impl Into<String>, url: impl AsRef<str>, now: DateTime<Utc>) -> Result<Self> {
		let url = Url::parse(url.as_ref())?;

		Ok(Self {
			id: 0,
			name: name.into(),
			url,
			check_interval_min: DEFAULT_CHECK_INTERVAL_MIN,
			failure_poll_interval_secs: DEFAULT_FAILURE_POLL_INTERVAL_SECS,
			alert_threshold: DEFAULT_ALERT_THRESHOLD,
			recovery_threshold: DEFAULT_RECOVERY_THRESHOLD,
			alert_email: None,
			is_active: true,
			current_status: TargetStatus::Pending,
			last_check_time: None,
			consecutive_failures: 0,
			consecutive_successes: 0,
			created_at: now,
			updated_at: now,
		})
	}

	/// Cadence that currently applies, given the health state.
	pub fn poll_interval(&self) -> Duration {
		match self.current_status {
			TargetStatus::Down => Duration::from_secs(u64::from(self.failure_poll_interval_secs)),
			_ => Duration::from_secs(u64::from(self.check_interval_min) * 60),
		}
	}

	/// Whether a probe is due at `now` under the applicable cadence.
	///
	/// A target that has never been probed is always due.
	pub fn is_due(&self, now: DateTime<Utc>) -> bool {
		let Some(last) = self.last_check_time else {
			return true;
		};
		let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);

		elapsed >= self.poll_interval()
	}

	/// Fast-poll delay used when the engine re-arms a failing target.
	pub fn failure_poll_interval(&self) -> Duration {
		Duration::from_secs(u64::from(self.failure_poll_interval_secs))
	}
}

/// Persisted record of one probe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeLog {
	/// Target the probe ran against.
	pub target_id: TargetId,
	/// Instant the outcome was applied.
	pub timestamp: DateTime<Utc>,
	/// HTTP status when a response arrived.
	pub status_code: Option<u16>,
	/// Wall time from request start to completion or failure, in seconds.
	pub response_time_s: f64,
	/// Time to first byte, when headers arrived.
	pub ttfb_s: Option<f64>,
	/// Body size drained from the response.
	pub payload_bytes: Option<u64>,
	/// Whether the probe counted as a success.
	pub is_success: bool,
	/// Short description of the failure, when any.
	pub error_message: Option<String>,
}

/// An open interval of `Down` status on a target; closed exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Incident {
	/// Row identity, assigned by the store.
	pub id: IncidentId,
	/// Target the incident belongs to.
	pub target_id: TargetId,
	/// Instant the target was marked down.
	pub start_time: DateTime<Utc>,
	/// Instant of recovery; set together with `is_resolved`.
	pub end_time: Option<DateTime<Utc>>,
	/// Error description captured from the opening failure.
	pub reason: Option<String>,
	/// Whether the incident has been closed.
	pub is_resolved: bool,
	/// Whole seconds from open to close.
	pub mttr_seconds: Option<i64>,
}
impl Incident {
	/// Open a new unresolved incident at `now`.
	pub fn open(target_id: TargetId, reason: Option<String>, now: DateTime<Utc>) -> Self {
		Self {
			id: 0,
			target_id,
			start_time: now,
			end_time: None,
			reason,
			is_resolved: false,
			mttr_seconds: None,
		}
	}

	/// Close the incident at `now`, recording the time to recovery.
	pub fn resolve(&mut self, now: DateTime<Utc>) {
		self.end_time = Some(now);
		self.is_resolved = true;
		self.mttr_seconds = Some((now - self.start_time).num_seconds().max(0));
	}
}

/// Singleton configuration row, lazily created on first read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
	/// Recipient for host resource-spike alerts.
	#[serde(default)]
	pub alert_email: Option<String>,
	/// CPU spike threshold in percent.
	#[serde(default = "default_cpu_alert_threshold")]
	pub cpu_alert_threshold: u8,
	/// Memory spike threshold in percent.
	#[serde(default = "default_memory_alert_threshold")]
	pub memory_alert_threshold: u8,
	/// Disk spike threshold in percent.
	#[serde(default = "default_disk_alert_threshold")]
	pub disk_alert_threshold: u8,
	/// Override connection string for the record store; opaque to the engine.
	#[serde(default)]
	pub store_dsn: Option<String>,
	/// Override connection string for the kv side-store; opaque to the engine.
	#[serde(default)]
	pub kv_url: Option<String>,
}
impl Default for SystemConfig {
	fn default() -> Self {
		Self {
			alert_email: None,
			cpu_alert_threshold: default_cpu_alert_threshold(),
			memory_alert_threshold: default_memory_alert_threshold(),
			disk_alert_threshold: default_disk_alert_threshold(),
			store_dsn: None,
			kv_url: None,
		}
	}
}

/// Persisted capture of host telemetry tagged with a cause.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemSnapshot {
	/// Short label, e.g. `Service Failure: api`.
	pub title: String,
	/// Longer description of what triggered the capture.
	pub reason: String,
	/// Capture instant.
	pub timestamp: DateTime<Utc>,
	/// CPU utilisation in percent.
	pub cpu: f64,
	/// Memory utilisation in percent.
	pub memory: f64,
	/// Disk utilisation in percent.
	pub disk: f64,
	/// One-minute load average.
	pub load_1: f64,
	/// Five-minute load average.
	pub load_5: f64,
	/// Fifteen-minute load average.
	pub load_15: f64,
	/// NIC bytes sent since boot.
	pub net_sent: u64,
	/// NIC bytes received since boot.
	pub net_recv: u64,
	/// Target the capture relates to, when any.
	pub target_id: Option<TargetId>,
	/// Incident the capture relates to, when any.
	pub incident_id: Option<IncidentId>,
	/// Response time that triggered a latency capture, when any.
	pub response_time_s: Option<f64>,
}

/// One point of the bounded host-health ring held in the kv side-store.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthPoint {
	/// Unix timestamp in seconds.
	pub time: f64,
	/// CPU utilisation in percent.
	pub cpu: f64,
	/// Memory utilisation in percent.
	pub memory: f64,
	/// Disk utilisation in percent.
	pub disk: f64,
}

/// Share of successful probes among the supplied log rows, in percent.
///
/// Callers pass a bounded window (the read path uses [`UPTIME_WINDOW`]); an
/// empty window reads as fully up. Rounded to two decimals.
pub fn uptime_percentage(logs: &[ProbeLog]) -> f64 {
	if logs.is_empty() {
		return 100.;
	}

	let successes = logs.iter().filter(|log| log.is_success).count();

	(successes as f64 / logs.len() as f64 * 10_000.).round() / 100.
}

fn default_true() -> bool {
	true
}

fn default_check_interval_min() -> u32 {
	DEFAULT_CHECK_INTERVAL_MIN
}

fn default_failure_poll_interval_secs() -> u32 {
	DEFAULT_FAILURE_POLL_INTERVAL_SECS
}

fn default_alert_threshold() -> u32 {
	DEFAULT_ALERT_THRESHOLD
}

fn default_recovery_threshold() -> u32 {
	DEFAULT_RECOVERY_THRESHOLD
}

fn default_cpu_alert_threshold() -> u8 {
	85
}

fn default_memory_alert_threshold() -> u8 {
	85
}

fn default_disk_alert_threshold() -> u8 {
	90
}

#[cfg(test)]
mod tests {
	// crates.io
	use chrono::TimeDelta;
	// self
	use super::*;

	fn sample_target(now: DateTime<Utc>) -> Target {
		Target::new("api", "http://api.internal/", now).expect("target")
	}

	#[test]
	fn never_probed_target_is_due() {
		let now = Utc::now();
		let target = sample_target(now);

		assert!(target.is_due(now));
	}

	#[test]
	fn healthy_target_uses_minute_cadence() {
		let now = Utc::now();
		let mut target = sample_target(now);

		target.current_status = TargetStatus::Up;
		target.last_check_time = Some(now);

		assert!(!target.is_due(now + TimeDelta::seconds(299)));
		assert!(target.is_due(now + TimeDelta::seconds(300)));
	}

	#[test]
	fn down_target_uses_second_cadence() {
		let now = Utc::now();
		let mut target = sample_target(now);

		target.current_status = TargetStatus::Down;
		target.failure_poll_interval_secs = 5;
		target.last_check_time = Some(now);

		assert!(!target.is_due(now + TimeDelta::seconds(4)));
		assert!(target.is_due(now + TimeDelta::seconds(5)));
	}

	#[test]
	fn resolve_records_whole_second_mttr() {
		let now = Utc::now();
		let mut incident = Incident::open(1, Some("Connection refused".into()), now);

		incident.resolve(now + TimeDelta::milliseconds(20_700));

		assert!(incident.is_resolved);
		assert_eq!(incident.mttr_seconds, Some(20));
		assert_eq!(incident.end_time, Some(now + TimeDelta::milliseconds(20_700)));
	}

	#[test]
	fn unknown_status_value_reads_as_pending() {
		let status: TargetStatus = serde_json::from_str("\"degraded\"").expect("status");

		assert_eq!(status, TargetStatus::Pending);
	}

	#[test]
	fn uptime_is_ratio_of_successes() {
		let now = Utc::now();
		let log = |is_success| ProbeLog {
			target_id: 1,
			timestamp: now,
			status_code: Some(200),
			response_time_s: 0.1,
			ttfb_s: None,
			payload_bytes: None,
			is_success,
			error_message: None,
		};

		assert_eq!(uptime_percentage(&[]), 100.);
		assert_eq!(uptime_percentage(&[log(true), log(true), log(false)]), 66.67);
	}
}
