//! Per-target state transitions driven by probe outcomes.
//!
//! One call to [`TargetFsm::apply`] performs the full effect sequence for one
//! outcome: log row, optional latency snapshot, counter flip, status
//! transition with incident bookkeeping, alert decisions, row persistence, and
//! the re-arm verdict. The scheduler guarantees calls for one target never
//! overlap, which makes the state machine the sole mutator of a target's
//! health fields.

// self
use crate::{
	_prelude::*,
	alert::Alerter,
	model::{Incident, ProbeLog, Target, TargetStatus},
	probe::ProbeOutcome,
	snapshot::{SnapshotContext, Snapshotter},
	store::Store,
};

/// Response time above which a successful probe records a latency snapshot.
///
/// Strictly greater-than: a probe at exactly the threshold does not capture.
pub const LATENCY_SNAPSHOT_THRESHOLD_SECS: f64 = 5.;

/// Follow-up the scheduler owes a target after an outcome is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Followup {
	/// Healthy target; the next dispatch tick decides when to re-probe.
	NextTick,
	/// Failing or down target; re-probe after its fast-poll interval.
	FastRepoll(Duration),
}

/// Applies probe outcomes to target rows.
#[derive(Clone)]
pub struct TargetFsm {
	store: Arc<dyn Store>,
	alerter: Arc<Alerter>,
	snapshotter: Arc<Snapshotter>,
}
impl TargetFsm {
	/// Wire the state machine against its collaborators.
	pub fn new(store: Arc<dyn Store>, alerter: Arc<Alerter>, snapshotter: Arc<Snapshotter>) -> Self {
		Self { store, alerter, snapshotter }
	}

	/// Apply one probe outcome to one target at `now`.
	///
	/// Store failures abort the remaining effects for this cycle and surface to
	/// the caller; alert and snapshot failures are swallowed by their owners.
	#[tracing::instrument(skip(self, target, outcome), fields(name = %target.name, success = outcome.is_success))]
	pub async fn apply(
		&self,
		target: &mut Target,
		outcome: &ProbeOutcome,
		now: DateTime<Utc>,
	) -> Result<Followup> {
		self.store
			.append_probe_log(ProbeLog {
				target_id: target.id,
				timestamp: now,
				status_code: outcome.status_code,
				response_time_s: outcome.elapsed_s,
				ttfb_s: outcome.ttfb_s,
				payload_bytes: outcome.payload_bytes,
				is_success: outcome.is_success,
				error_message: outcome.error_message.clone(),
			})
			.await?;

		#[cfg(feature = "metrics")]
		crate::metrics::record_probe(&target.name, outcome.is_success, outcome.elapsed_s);

		if outcome.is_success && outcome.elapsed_s > LATENCY_SNAPSHOT_THRESHOLD_SECS {
			self.snapshotter
				.capture(
					&format!("High Latency Spike: {}", target.name),
					&format!("Response time spiked to {:.2}s", outcome.elapsed_s),
					SnapshotContext {
						target_id: Some(target.id),
						response_time_s: Some(outcome.elapsed_s),
						..Default::default()
					},
				)
				.await;
		}

		let prev_status = target.current_status;

		if outcome.is_success {
			target.consecutive_failures = 0;
			target.consecutive_successes = target.consecutive_successes.saturating_add(1);

			if prev_status == TargetStatus::Down
				&& target.consecutive_successes >= target.recovery_threshold
			{
				target.current_status = TargetStatus::Up;
				self.close_incident(target, now).await?;
			} else if prev_status == TargetStatus::Pending {
				target.current_status = TargetStatus::Up;
			}
		} else {
			target.consecutive_successes = 0;
			target.consecutive_failures = target.consecutive_failures.saturating_add(1);

			if prev_status != TargetStatus::Down && target.consecutive_failures == 1 {
				// Down right away so fast polling begins; the CRITICAL alert
				// waits for the configured threshold.
				target.current_status = TargetStatus::Down;
				self.open_incident(target, outcome, now).await?;
			}

			if target.consecutive_failures == target.alert_threshold {
				let error = outcome.error_message.as_deref().unwrap_or("unknown");

				self.alerter
					.alert_target(
						target,
						"CRITICAL FAILURE",
						&format!(
							"Service has failed {} consecutive times. Error: {error}",
							target.alert_threshold,
						),
						now,
					)
					.await;
			}
		}

		target.last_check_time = Some(now);
		target.updated_at = now;
		self.store.update_target(target).await?;

		if !outcome.is_success || target.current_status == TargetStatus::Down {
			Ok(Followup::FastRepoll(target.failure_poll_interval()))
		} else {
			Ok(Followup::NextTick)
		}
	}

	async fn open_incident(
		&self,
		target: &Target,
		outcome: &ProbeOutcome,
		now: DateTime<Utc>,
	) -> Result<()> {
		let incident = self
			.store
			.open_incident(Incident::open(target.id, outcome.error_message.clone(), now))
			.await?;

		tracing::warn!(
			name = %target.name,
			incident = incident.id,
			reason = incident.reason.as_deref().unwrap_or("unknown"),
			"target went down; incident opened"
		);

		#[cfg(feature = "metrics")]
		crate::metrics::record_incident_opened(&target.name);

		self.snapshotter
			.capture(
				&format!("Service Failure: {}", target.name),
				&format!(
					"Service dropped offline. Error: {}",
					outcome.error_message.as_deref().unwrap_or("unknown"),
				),
				SnapshotContext {
					target_id: Some(target.id),
					incident_id: Some(incident.id),
					..Default::default()
				},
			)
			.await;

		Ok(())
	}

	async fn close_incident(&self, target: &Target, now: DateTime<Utc>) -> Result<()> {
		let Some(mut incident) = self.store.unresolved_incident(target.id).await? else {
			tracing::warn!(name = %target.name, "target recovered without an open incident");

			return Ok(());
		};

		incident.resolve(now);
		self.store.update_incident(&incident).await?;

		#[cfg(feature = "metrics")]
		crate::metrics::record_incident_resolved(&target.name);

		let minutes = incident.mttr_seconds.unwrap_or(0) / 60;

		self.alerter
			.alert_target(
				target,
				"RECOVERED",
				&format!("Service is back online after {minutes} minutes."),
				now,
			)
			.await;

		Ok(())
	}
}
impl std::fmt::Debug for TargetFsm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TargetFsm").finish_non_exhaustive()
	}
}
