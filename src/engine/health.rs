//! Host health sampling, ring buffering, and resource-spike alerts.

// self
use crate::{
	_prelude::*,
	alert::Alerter,
	clock::Clock,
	kv::Kv,
	model::{HealthPoint, SystemConfig},
	snapshot::{SnapshotContext, Snapshotter},
	store::Store,
	telemetry::{HostSample, HostTelemetry},
};

/// Kv key holding the bounded ring of recent health points.
pub const HEALTH_HISTORY_KEY: &str = "system_health_history";
/// Kv key guarding the resource-spike alert cooldown.
pub const HEALTH_LAST_ALERT_KEY: &str = "system_health_last_alert";
/// Number of points retained in the health ring.
pub const HEALTH_HISTORY_LEN: usize = 20;
/// Cooldown window between resource-spike alerts.
pub const SPIKE_ALERT_COOLDOWN: Duration = Duration::from_secs(3600);

/// Samples the host on a periodic tick and raises cooldown-gated spike alerts.
#[derive(Clone)]
pub struct HealthMonitor {
	store: Arc<dyn Store>,
	kv: Arc<dyn Kv>,
	telemetry: Arc<dyn HostTelemetry>,
	alerter: Arc<Alerter>,
	snapshotter: Arc<Snapshotter>,
	clock: Arc<dyn Clock>,
}
impl HealthMonitor {
	/// Wire a health monitor against its collaborators.
	pub fn new(
		store: Arc<dyn Store>,
		kv: Arc<dyn Kv>,
		telemetry: Arc<dyn HostTelemetry>,
		alerter: Arc<Alerter>,
		snapshotter: Arc<Snapshotter>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { store, kv, telemetry, alerter, snapshotter, clock }
	}

	/// One health tick; failures are logged and swallowed, the ring and
	/// cooldown are best-effort.
	pub async fn tick(&self) {
		if let Err(err) = self.run_tick().await {
			tracing::warn!(error = %err, "health tick failed");
		}
	}

	/// Recent host health points, most recent first.
	///
	/// Consumers reverse for chronological display.
	pub async fn recent_history(&self) -> Result<Vec<HealthPoint>> {
		let raw = self.kv.head_range(HEALTH_HISTORY_KEY, HEALTH_HISTORY_LEN).await?;

		raw.iter().map(|point| serde_json::from_str(point).map_err(Error::from)).collect()
	}

	async fn run_tick(&self) -> Result<()> {
		let sample = self.telemetry.sample()?;
		let now = self.clock.now();
		let point = HealthPoint {
			time: now.timestamp_micros() as f64 / 1_000_000.,
			cpu: sample.cpu_percent,
			memory: sample.memory_percent,
			disk: sample.disk_percent,
		};

		self.kv
			.push_head(HEALTH_HISTORY_KEY, serde_json::to_string(&point)?, HEALTH_HISTORY_LEN)
			.await?;

		let config = self.store.system_config().await?;
		let Some(alert_email) = config.alert_email.clone() else {
			return Ok(());
		};
		let spikes = describe_spikes(&sample, &config);

		if spikes.is_empty() {
			return Ok(());
		}

		if !self.cooldown_elapsed(now).await? {
			tracing::debug!(spikes = spikes.len(), "resource spike suppressed by cooldown");

			return Ok(());
		}

		// Read-then-set is best-effort: racing processes may double-fire once
		// per cooldown window.
		self.kv
			.set_with_ttl(HEALTH_LAST_ALERT_KEY, now.timestamp().to_string(), SPIKE_ALERT_COOLDOWN)
			.await?;

		let subject = "CRITICAL: System Health Spike";
		let message = format!("System resource spike detected:\n\n{}", spikes.join("\n"));

		self.snapshotter.capture(subject, &message, SnapshotContext::default()).await;
		self.alerter.alert_raw(Some(&alert_email), subject, &message).await;

		Ok(())
	}

	async fn cooldown_elapsed(&self, now: DateTime<Utc>) -> Result<bool> {
		let Some(raw) = self.kv.get(HEALTH_LAST_ALERT_KEY).await? else {
			return Ok(true);
		};
		let Ok(last) = raw.parse::<f64>() else {
			return Ok(true);
		};

		Ok(now.timestamp() as f64 - last > SPIKE_ALERT_COOLDOWN.as_secs_f64())
	}
}
impl std::fmt::Debug for HealthMonitor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HealthMonitor").finish_non_exhaustive()
	}
}

fn describe_spikes(sample: &HostSample, config: &SystemConfig) -> Vec<String> {
	let mut spikes = Vec::new();

	if sample.cpu_percent > f64::from(config.cpu_alert_threshold) {
		spikes.push(format!(
			"CPU at {:.1}% (Threshold {}%)",
			sample.cpu_percent, config.cpu_alert_threshold
		));
	}
	if sample.memory_percent > f64::from(config.memory_alert_threshold) {
		spikes.push(format!(
			"Memory at {:.1}% (Threshold {}%)",
			sample.memory_percent, config.memory_alert_threshold
		));
	}
	if sample.disk_percent > f64::from(config.disk_alert_threshold) {
		spikes.push(format!(
			"Disk at {:.1}% (Threshold {}%)",
			sample.disk_percent, config.disk_alert_threshold
		));
	}

	spikes
}
