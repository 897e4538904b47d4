//! Monitor wiring: builder, background loops, and control-plane entry points.

// crates.io
use tokio::{task::JoinHandle, time};
// self
use crate::{
	_prelude::*,
	alert::{Alerter, DEFAULT_FROM_EMAIL, LogMailer, Mailer},
	clock::{Clock, SystemClock},
	engine::{
		fsm::TargetFsm,
		health::HealthMonitor,
		scheduler::{DEFAULT_MAX_CONCURRENT_PROBES, DEFAULT_TICK_INTERVAL, Scheduler},
	},
	kv::{Kv, MemoryKv},
	model::{HealthPoint, TargetId, UPTIME_WINDOW, uptime_percentage},
	probe::{HttpProber, Prober},
	snapshot::Snapshotter,
	store::Store,
	telemetry::{HostSample, HostTelemetry, SysinfoTelemetry},
};

/// Builder for [`Monitor`], wiring contracts and cadences.
#[derive(Default)]
pub struct MonitorBuilder {
	store: Option<Arc<dyn Store>>,
	kv: Option<Arc<dyn Kv>>,
	mailer: Option<Arc<dyn Mailer>>,
	telemetry: Option<Arc<dyn HostTelemetry>>,
	prober: Option<Arc<dyn Prober>>,
	clock: Option<Arc<dyn Clock>>,
	config: MonitorConfig,
}
impl MonitorBuilder {
	/// Create a builder with default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Record store holding target, log, incident, and snapshot rows.
	///
	/// Required; every other collaborator has a default.
	pub fn store(mut self, store: Arc<dyn Store>) -> Self {
		self.store = Some(store);

		self
	}

	/// Kv side-store for the health ring and alert cooldown.
	pub fn kv(mut self, kv: Arc<dyn Kv>) -> Self {
		self.kv = Some(kv);

		self
	}

	#[cfg(feature = "redis")]
	/// Use a Redis-backed kv side-store.
	pub fn with_redis_kv(mut self, client: redis::Client) -> Self {
		self.kv = Some(Arc::new(crate::kv::RedisKv::new(client)));

		self
	}

	/// Outbound mail transport for alerts.
	pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
		self.mailer = Some(mailer);

		self
	}

	/// Host metrics provider.
	pub fn telemetry(mut self, telemetry: Arc<dyn HostTelemetry>) -> Self {
		self.telemetry = Some(telemetry);

		self
	}

	/// Probe implementation; defaults to the HTTP GET prober.
	pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
		self.prober = Some(prober);

		self
	}

	/// Clock used for due-ness, MTTR, and cooldowns.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}

	/// Dispatch tick period; defaults to 60 seconds.
	pub fn tick_interval(mut self, value: Duration) -> Self {
		self.config.tick_interval = value;

		self
	}

	/// Health tick period; defaults to 60 seconds.
	pub fn health_tick_interval(mut self, value: Duration) -> Self {
		self.config.health_tick_interval = value;

		self
	}

	/// Sender address for alert email.
	pub fn default_from_email(mut self, value: impl Into<String>) -> Self {
		self.config.default_from_email = value.into();

		self
	}

	/// Ceiling on concurrently running probe jobs.
	pub fn max_concurrent_probes(mut self, value: usize) -> Self {
		self.config.max_concurrent_probes = value;

		self
	}

	/// Finalise the configuration and construct a [`Monitor`].
	pub fn build(self) -> Result<Monitor> {
		let Some(store) = self.store else {
			return Err(Error::Validation {
				field: "store",
				reason: "A record store implementation is required.".into(),
			});
		};

		if self.config.tick_interval.is_zero() {
			return Err(Error::Validation {
				field: "tick_interval",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.config.health_tick_interval.is_zero() {
			return Err(Error::Validation {
				field: "health_tick_interval",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.config.max_concurrent_probes == 0 {
			return Err(Error::Validation {
				field: "max_concurrent_probes",
				reason: "Must be greater than zero.".into(),
			});
		}

		let kv = self.kv.unwrap_or_else(|| Arc::new(MemoryKv::new()));
		let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogMailer));
		let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(SysinfoTelemetry::new()));
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let prober = match self.prober {
			Some(prober) => prober,
			None => Arc::new(HttpProber::new()?),
		};
		let alerter = Arc::new(Alerter::new(mailer, self.config.default_from_email.clone()));
		let snapshotter =
			Arc::new(Snapshotter::new(store.clone(), telemetry.clone(), clock.clone()));
		let fsm = TargetFsm::new(store.clone(), alerter.clone(), snapshotter.clone());
		let scheduler = Scheduler::new(
			store.clone(),
			prober,
			fsm,
			clock.clone(),
			self.config.max_concurrent_probes,
		);
		let health = HealthMonitor::new(
			store.clone(),
			kv,
			telemetry.clone(),
			alerter,
			snapshotter,
			clock.clone(),
		);

		Ok(Monitor {
			store,
			scheduler,
			health,
			telemetry,
			clock,
			tick_interval: self.config.tick_interval,
			health_tick_interval: self.config.health_tick_interval,
		})
	}
}

/// The assembled uptime monitor.
///
/// Owns the dispatch scheduler and the host health monitor; the control plane
/// talks to it through [`Monitor::trigger_check`] and the read helpers.
#[derive(Clone)]
pub struct Monitor {
	store: Arc<dyn Store>,
	scheduler: Arc<Scheduler>,
	health: HealthMonitor,
	telemetry: Arc<dyn HostTelemetry>,
	clock: Arc<dyn Clock>,
	tick_interval: Duration,
	health_tick_interval: Duration,
}
impl Monitor {
	/// Create a [`MonitorBuilder`].
	pub fn builder() -> MonitorBuilder {
		MonitorBuilder::new()
	}

	/// Spawn the dispatch and health loops.
	///
	/// Both loops fire immediately, then on their configured cadence. Dropping
	/// the returned handle does not stop them; call [`MonitorHandle::shutdown`].
	pub fn start(&self) -> MonitorHandle {
		let scheduler = self.scheduler.clone();
		let tick_interval = self.tick_interval;
		let dispatch = tokio::spawn(async move {
			let mut ticker = time::interval(tick_interval);

			loop {
				ticker.tick().await;
				scheduler.tick().await;
			}
		});
		let health_monitor = self.health.clone();
		let health_tick_interval = self.health_tick_interval;
		let health = tokio::spawn(async move {
			let mut ticker = time::interval(health_tick_interval);

			loop {
				ticker.tick().await;
				health_monitor.tick().await;
			}
		});

		tracing::info!(
			tick_interval = ?self.tick_interval,
			health_tick_interval = ?self.health_tick_interval,
			"monitor loops started"
		);

		MonitorHandle { dispatch, health }
	}

	/// Enqueue one immediate probe for a target.
	///
	/// Used by the control plane on target creation and manual trigger; the
	/// in-flight guard still applies.
	pub async fn trigger_check(&self, id: TargetId) {
		self.scheduler.enqueue(id).await;
	}

	/// Run one dispatch tick on demand.
	pub async fn dispatch_tick(&self) {
		self.scheduler.tick().await;
	}

	/// Run one health tick on demand.
	pub async fn health_tick(&self) {
		self.health.tick().await;
	}

	/// Recent host health points, most recent first.
	pub async fn health_history(&self) -> Result<Vec<HealthPoint>> {
		self.health.recent_history().await
	}

	/// Current host metrics sample.
	pub fn host_sample(&self) -> Result<HostSample> {
		self.telemetry.sample()
	}

	/// Share of successful probes over the trailing 30-day window, in percent.
	pub async fn uptime_percentage(&self, id: TargetId) -> Result<f64> {
		let since = self.clock.now()
			- chrono::TimeDelta::from_std(UPTIME_WINDOW)
				.unwrap_or_else(|_| chrono::TimeDelta::days(30));
		let logs = self.store.probe_logs_since(id, since).await?;

		Ok(uptime_percentage(&logs))
	}
}
impl std::fmt::Debug for Monitor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Monitor")
			.field("tick_interval", &self.tick_interval)
			.field("health_tick_interval", &self.health_tick_interval)
			.finish_non_exhaustive()
	}
}

/// Handle over the two background loops.
#[derive(Debug)]
pub struct MonitorHandle {
	dispatch: JoinHandle<()>,
	health: JoinHandle<()>,
}
impl MonitorHandle {
	/// Stop both loops.
	///
	/// In-flight probe jobs run on their own tasks and are left to finish;
	/// no new work is dispatched afterwards.
	pub fn shutdown(&self) {
		self.dispatch.abort();
		self.health.abort();
	}
}

struct MonitorConfig {
	tick_interval: Duration,
	health_tick_interval: Duration,
	default_from_email: String,
	max_concurrent_probes: usize,
}
impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			tick_interval: DEFAULT_TICK_INTERVAL,
			health_tick_interval: DEFAULT_TICK_INTERVAL,
			default_from_email: DEFAULT_FROM_EMAIL.into(),
			max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
		}
	}
}
