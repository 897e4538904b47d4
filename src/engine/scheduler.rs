//! Dispatch tick and probe job execution with per-target deduplication.
//!
//! Two cadences are multiplexed through one periodic tick: minutes while a
//! target is healthy, seconds while it is down. Down targets additionally
//! self-re-arm after each outcome, giving sub-minute polling without raising
//! the tick rate. A busy set keyed by target id guarantees at most one
//! in-flight probe per target, which also serialises state-machine
//! applications and keeps per-target log timestamps in probe-start order.

// std
use std::collections::HashSet;
// crates.io
use tokio::sync::{Mutex, Semaphore};
// self
use crate::{
	_prelude::*,
	clock::Clock,
	engine::fsm::{Followup, TargetFsm},
	model::TargetId,
	probe::Prober,
	store::Store,
};

/// Default dispatch tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
/// Default ceiling on concurrently running probe jobs.
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 8;

/// Decides when each target is due and runs probe jobs without overlap.
pub struct Scheduler {
	store: Arc<dyn Store>,
	prober: Arc<dyn Prober>,
	fsm: TargetFsm,
	clock: Arc<dyn Clock>,
	inflight: Mutex<HashSet<TargetId>>,
	permits: Arc<Semaphore>,
}
impl Scheduler {
	/// Wire a scheduler with the given parallelism bound.
	pub fn new(
		store: Arc<dyn Store>,
		prober: Arc<dyn Prober>,
		fsm: TargetFsm,
		clock: Arc<dyn Clock>,
		max_concurrent_probes: usize,
	) -> Arc<Self> {
		Arc::new(Self {
			store,
			prober,
			fsm,
			clock,
			inflight: Mutex::new(HashSet::new()),
			permits: Arc::new(Semaphore::new(max_concurrent_probes.max(1))),
		})
	}

	/// One dispatch tick: enqueue a probe job for every due, idle target.
	///
	/// Due-ness is evaluated against `last_check_time`, which only the probe
	/// job advances, so an immediately repeated tick enqueues nothing new.
	pub async fn tick(self: &Arc<Self>) {
		let now = self.clock.now();
		let targets = match self.store.active_targets().await {
			Ok(targets) => targets,
			Err(err) => {
				tracing::warn!(error = %err, "dispatch tick could not list targets");

				return;
			},
		};

		for target in targets {
			if target.is_due(now) {
				tracing::debug!(
					name = %target.name,
					status = ?target.current_status,
					"dispatching probe"
				);

				self.enqueue(target.id).await;
			}
		}
	}

	/// Enqueue one probe job unless the target is already in flight.
	///
	/// Also the control-plane entry point for immediate checks.
	pub async fn enqueue(self: &Arc<Self>, id: TargetId) {
		{
			let mut inflight = self.inflight.lock().await;

			if !inflight.insert(id) {
				tracing::debug!(target_id = id, "probe already in flight; skipping");

				return;
			}
		}

		let scheduler = self.clone();

		tokio::spawn(async move {
			scheduler.run_job(id).await;
			scheduler.inflight.lock().await.remove(&id);
		});
	}

	async fn run_job(self: &Arc<Self>, id: TargetId) {
		let Ok(_permit) = self.permits.clone().acquire_owned().await else {
			return;
		};
		// Re-read the row at job start so control-plane edits are honoured.
		let mut target = match self.store.target(id).await {
			Ok(Some(target)) => target,
			Ok(None) => {
				tracing::warn!(target_id = id, "probe job for unknown target; dropping");

				return;
			},
			Err(err) => {
				tracing::warn!(target_id = id, error = %err, "probe job could not read target");

				return;
			},
		};

		if !target.is_active {
			tracing::debug!(name = %target.name, "target deactivated; skipping probe");

			return;
		}

		let outcome = self.prober.probe(&target).await;
		let now = self.clock.now();

		match self.fsm.apply(&mut target, &outcome, now).await {
			Ok(Followup::FastRepoll(delay)) => self.rearm(id, delay),
			Ok(Followup::NextTick) => {},
			Err(err) => {
				tracing::warn!(target_id = id, error = %err, "probe outcome could not be persisted");
			},
		}
	}

	/// One-shot self re-arm used while a target is failing.
	///
	/// If the dispatch tick gets there first, the busy set collapses the two
	/// into a single probe.
	fn rearm(self: &Arc<Self>, id: TargetId, delay: Duration) {
		let scheduler = self.clone();

		tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			scheduler.enqueue(id).await;
		});
	}
}
impl std::fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scheduler").finish_non_exhaustive()
	}
}
