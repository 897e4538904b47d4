//! Record store contract and the in-memory reference implementation.
//!
//! The store is the single source of truth for target state: the engine writes
//! health state through it, the control plane edits rows behind it, and read
//! paths only read.

// std
use std::collections::HashMap;
// crates.io
use async_trait::async_trait;
use tokio::sync::RwLock;
// self
use crate::{_prelude::*, model::*};

/// Durable record store consumed by the probe engine.
#[async_trait]
pub trait Store: Send + Sync {
	/// Every target currently enabled for probing.
	async fn active_targets(&self) -> Result<Vec<Target>>;

	/// Fetch one target row by id.
	async fn target(&self, id: TargetId) -> Result<Option<Target>>;

	/// Persist mutated health state for a target.
	async fn update_target(&self, target: &Target) -> Result<()>;

	/// Append one probe log row.
	async fn append_probe_log(&self, log: ProbeLog) -> Result<()>;

	/// Probe logs for a target since `since`, newest first.
	async fn probe_logs_since(
		&self,
		target_id: TargetId,
		since: DateTime<Utc>,
	) -> Result<Vec<ProbeLog>>;

	/// Open a new incident row, returning it with its assigned id.
	async fn open_incident(&self, incident: Incident) -> Result<Incident>;

	/// The unresolved incident for a target, if one exists.
	async fn unresolved_incident(&self, target_id: TargetId) -> Result<Option<Incident>>;

	/// Persist a mutated incident row.
	async fn update_incident(&self, incident: &Incident) -> Result<()>;

	/// Read the singleton configuration row, creating it on first access.
	async fn system_config(&self) -> Result<SystemConfig>;

	/// Replace the singleton configuration row.
	async fn update_system_config(&self, config: &SystemConfig) -> Result<()>;

	/// Append one host telemetry snapshot row.
	async fn append_snapshot(&self, snapshot: SystemSnapshot) -> Result<()>;
}

/// In-memory store used by tests and single-process embeddings.
#[derive(Debug, Default)]
pub struct MemoryStore {
	inner: RwLock<MemoryState>,
}
impl MemoryStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a target row, assigning an id when the row carries none.
	pub async fn insert_target(&self, mut target: Target) -> Target {
		let mut state = self.inner.write().await;

		if target.id == 0 {
			state.next_target_id += 1;
			target.id = state.next_target_id;
		} else {
			state.next_target_id = state.next_target_id.max(target.id);
		}

		state.targets.insert(target.id, target.clone());

		target
	}

	/// Remove a target row; existing log and incident rows are retained.
	pub async fn remove_target(&self, id: TargetId) -> bool {
		self.inner.write().await.targets.remove(&id).is_some()
	}

	/// Every probe log row for a target, newest first.
	pub async fn probe_logs(&self, target_id: TargetId) -> Vec<ProbeLog> {
		let state = self.inner.read().await;
		let mut logs: Vec<_> =
			state.logs.iter().filter(|log| log.target_id == target_id).cloned().collect();

		logs.sort_by_key(|log| std::cmp::Reverse(log.timestamp));

		logs
	}

	/// Every incident row for a target, oldest first.
	pub async fn incidents(&self, target_id: TargetId) -> Vec<Incident> {
		let state = self.inner.read().await;

		state.incidents.iter().filter(|incident| incident.target_id == target_id).cloned().collect()
	}

	/// Every snapshot row, oldest first.
	pub async fn snapshots(&self) -> Vec<SystemSnapshot> {
		self.inner.read().await.snapshots.clone()
	}
}
#[async_trait]
impl Store for MemoryStore {
	async fn active_targets(&self) -> Result<Vec<Target>> {
		let state = self.inner.read().await;
		let mut targets: Vec<_> =
			state.targets.values().filter(|target| target.is_active).cloned().collect();

		targets.sort_by_key(|target| target.id);

		Ok(targets)
	}

	async fn target(&self, id: TargetId) -> Result<Option<Target>> {
		Ok(self.inner.read().await.targets.get(&id).cloned())
	}

	async fn update_target(&self, target: &Target) -> Result<()> {
		let mut state = self.inner.write().await;

		if !state.targets.contains_key(&target.id) {
			return Err(Error::TargetNotFound(target.id));
		}

		state.targets.insert(target.id, target.clone());

		Ok(())
	}

	async fn append_probe_log(&self, log: ProbeLog) -> Result<()> {
		self.inner.write().await.logs.push(log);

		Ok(())
	}

	async fn probe_logs_since(
		&self,
		target_id: TargetId,
		since: DateTime<Utc>,
	) -> Result<Vec<ProbeLog>> {
		let state = self.inner.read().await;
		let mut logs: Vec<_> = state
			.logs
			.iter()
			.filter(|log| log.target_id == target_id && log.timestamp >= since)
			.cloned()
			.collect();

		logs.sort_by_key(|log| std::cmp::Reverse(log.timestamp));

		Ok(logs)
	}

	async fn open_incident(&self, mut incident: Incident) -> Result<Incident> {
		let mut state = self.inner.write().await;

		state.next_incident_id += 1;
		incident.id = state.next_incident_id;
		state.incidents.push(incident.clone());

		Ok(incident)
	}

	async fn unresolved_incident(&self, target_id: TargetId) -> Result<Option<Incident>> {
		let state = self.inner.read().await;

		Ok(state
			.incidents
			.iter()
			.find(|incident| incident.target_id == target_id && !incident.is_resolved)
			.cloned())
	}

	async fn update_incident(&self, incident: &Incident) -> Result<()> {
		let mut state = self.inner.write().await;
		let Some(row) = state.incidents.iter_mut().find(|row| row.id == incident.id) else {
			return Err(Error::Store(format!("no incident row with id {}", incident.id)));
		};

		*row = incident.clone();

		Ok(())
	}

	async fn system_config(&self) -> Result<SystemConfig> {
		let mut state = self.inner.write().await;

		Ok(state.config.get_or_insert_with(SystemConfig::default).clone())
	}

	async fn update_system_config(&self, config: &SystemConfig) -> Result<()> {
		self.inner.write().await.config = Some(config.clone());

		Ok(())
	}

	async fn append_snapshot(&self, snapshot: SystemSnapshot) -> Result<()> {
		self.inner.write().await.snapshots.push(snapshot);

		Ok(())
	}
}

#[derive(Debug, Default)]
struct MemoryState {
	targets: HashMap<TargetId, Target>,
	next_target_id: TargetId,
	logs: Vec<ProbeLog>,
	incidents: Vec<Incident>,
	next_incident_id: IncidentId,
	config: Option<SystemConfig>,
	snapshots: Vec<SystemSnapshot>,
}
