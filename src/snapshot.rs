//! Host telemetry snapshot capture.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	model::{IncidentId, SystemSnapshot, TargetId},
	store::Store,
	telemetry::HostTelemetry,
};

/// Optional context attached to a snapshot row.
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotContext {
	/// Target the capture relates to.
	pub target_id: Option<TargetId>,
	/// Incident the capture relates to.
	pub incident_id: Option<IncidentId>,
	/// Response time that triggered a latency capture.
	pub response_time_s: Option<f64>,
}

/// Persists host telemetry snapshot rows tagged to a cause.
#[derive(Clone)]
pub struct Snapshotter {
	store: Arc<dyn Store>,
	telemetry: Arc<dyn HostTelemetry>,
	clock: Arc<dyn Clock>,
}
impl Snapshotter {
	/// Wire a snapshotter against the given collaborators.
	pub fn new(
		store: Arc<dyn Store>,
		telemetry: Arc<dyn HostTelemetry>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { store, telemetry, clock }
	}

	/// Capture one snapshot row.
	///
	/// Snapshot rows are advisory: telemetry and store failures are logged and
	/// swallowed.
	pub async fn capture(&self, title: &str, reason: &str, context: SnapshotContext) {
		let sample = match self.telemetry.sample() {
			Ok(sample) => sample,
			Err(err) => {
				tracing::warn!(error = %err, title, "host telemetry sample failed; skipping snapshot");

				return;
			},
		};
		let snapshot = SystemSnapshot {
			title: title.to_string(),
			reason: reason.to_string(),
			timestamp: self.clock.now(),
			cpu: sample.cpu_percent,
			memory: sample.memory_percent,
			disk: sample.disk_percent,
			load_1: sample.load_1,
			load_5: sample.load_5,
			load_15: sample.load_15,
			net_sent: sample.net_bytes_sent,
			net_recv: sample.net_bytes_recv,
			target_id: context.target_id,
			incident_id: context.incident_id,
			response_time_s: context.response_time_s,
		};

		if let Err(err) = self.store.append_snapshot(snapshot).await {
			tracing::warn!(error = %err, title, "snapshot row could not be persisted");
		} else {
			tracing::debug!(title, "snapshot captured");
		}
	}
}
impl std::fmt::Debug for Snapshotter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Snapshotter").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		clock::ManualClock,
		store::MemoryStore,
		telemetry::{HostSample, HostTelemetry},
	};

	#[derive(Debug)]
	struct StaticTelemetry(HostSample);
	impl HostTelemetry for StaticTelemetry {
		fn sample(&self) -> Result<HostSample> {
			Ok(self.0)
		}
	}

	#[derive(Debug)]
	struct BrokenTelemetry;
	impl HostTelemetry for BrokenTelemetry {
		fn sample(&self) -> Result<HostSample> {
			Err(Error::Telemetry("no /proc".into()))
		}
	}

	#[tokio::test]
	async fn capture_appends_row_with_context() {
		let store = Arc::new(MemoryStore::new());
		let clock = ManualClock::new(Utc::now());
		let telemetry = StaticTelemetry(HostSample { cpu_percent: 42., ..Default::default() });
		let snapshotter =
			Snapshotter::new(store.clone(), Arc::new(telemetry), Arc::new(clock.clone()));

		snapshotter
			.capture(
				"Service Failure: api",
				"Service dropped offline. Error: Connection refused",
				SnapshotContext { target_id: Some(7), incident_id: Some(3), ..Default::default() },
			)
			.await;

		let snapshots = store.snapshots().await;

		assert_eq!(snapshots.len(), 1);
		assert_eq!(snapshots[0].title, "Service Failure: api");
		assert_eq!(snapshots[0].cpu, 42.);
		assert_eq!(snapshots[0].target_id, Some(7));
		assert_eq!(snapshots[0].incident_id, Some(3));
		assert_eq!(snapshots[0].timestamp, clock.now());
	}

	#[tokio::test]
	async fn telemetry_failure_is_swallowed() {
		let store = Arc::new(MemoryStore::new());
		let snapshotter = Snapshotter::new(
			store.clone(),
			Arc::new(BrokenTelemetry),
			Arc::new(ManualClock::new(Utc::now())),
		);

		snapshotter.capture("Manual", "Inspection", SnapshotContext::default()).await;

		assert!(store.snapshots().await.is_empty());
	}
}
