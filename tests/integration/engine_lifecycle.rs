//! End-to-end lifecycle tests driving the monitor with scripted probe
//! outcomes and a manual clock.

// std
use std::{
	collections::VecDeque,
	sync::{Arc, Mutex},
	time::Duration,
};
// crates.io
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uptime_pulse::{
	Monitor, Result, Target, TargetId, TargetStatus,
	alert::Mailer,
	clock::{Clock, ManualClock},
	probe::{ProbeOutcome, Prober},
	store::{MemoryStore, Store},
	telemetry::{HostSample, HostTelemetry},
};

/// Pops pre-scripted outcomes; falls back to an instant success when drained.
#[derive(Debug, Default)]
struct ScriptedProber {
	outcomes: Mutex<VecDeque<ProbeOutcome>>,
}
impl ScriptedProber {
	fn push(&self, outcome: ProbeOutcome) {
		self.outcomes.lock().expect("lock").push_back(outcome);
	}
}
#[async_trait]
impl Prober for ScriptedProber {
	async fn probe(&self, _target: &Target) -> ProbeOutcome {
		self.outcomes
			.lock()
			.expect("lock")
			.pop_front()
			.unwrap_or_else(|| ProbeOutcome::success(Utc::now(), 0.1))
	}
}

#[derive(Debug, Default)]
struct RecordingMailer {
	sent: Mutex<Vec<(String, String)>>,
}
impl RecordingMailer {
	fn sent(&self) -> Vec<(String, String)> {
		self.sent.lock().expect("lock").clone()
	}
}
#[async_trait]
impl Mailer for RecordingMailer {
	async fn send(&self, _from: &str, _to: &str, subject: &str, body: &str) -> Result<()> {
		self.sent.lock().expect("lock").push((subject.to_string(), body.to_string()));

		Ok(())
	}
}

#[derive(Debug, Default)]
struct StaticTelemetry;
impl HostTelemetry for StaticTelemetry {
	fn sample(&self) -> Result<HostSample> {
		Ok(HostSample::default())
	}
}

async fn wait_for_logs(store: &MemoryStore, id: TargetId, count: usize) {
	for _ in 0..400 {
		if store.probe_logs(id).await.len() >= count {
			return;
		}

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	panic!("timed out waiting for {count} probe log rows");
}

#[tokio::test]
async fn full_down_and_recovery_lifecycle() {
	let _ = tracing_subscriber::fmt::try_init();

	let store = Arc::new(MemoryStore::new());
	let prober = Arc::new(ScriptedProber::default());
	let mailer = Arc::new(RecordingMailer::default());
	let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).expect("start"));
	let monitor = Monitor::builder()
		.store(store.clone())
		.prober(prober.clone())
		.mailer(mailer.clone())
		.telemetry(Arc::new(StaticTelemetry))
		.clock(Arc::new(clock.clone()))
		.build()
		.expect("monitor");
	let mut target = Target::new("web", "http://web.internal/", clock.now()).expect("target");

	target.alert_email = Some("oncall@example.com".into());
	// Keep the self-re-arm far out so the scripted steps stay in control.
	target.failure_poll_interval_secs = 300;

	let target = store.insert_target(target).await;
	let start = clock.now();

	// Healthy baseline probe: pending becomes up, silently.
	prober.push(ProbeOutcome::success(clock.now(), 0.2));
	monitor.trigger_check(target.id).await;
	wait_for_logs(&store, target.id, 1).await;

	let row = store.target(target.id).await.expect("read").expect("row");

	assert_eq!(row.current_status, TargetStatus::Up);
	assert!(mailer.sent().is_empty());

	// Three failures five seconds apart: down at once, CRITICAL at the third.
	for step in 0..3 {
		clock.set(start + chrono::TimeDelta::seconds(300 + step * 5));
		prober.push(ProbeOutcome::failure(clock.now(), 0.2, "Connection refused"));
		monitor.trigger_check(target.id).await;
		wait_for_logs(&store, target.id, 2 + step as usize).await;
	}

	let row = store.target(target.id).await.expect("read").expect("row");

	assert_eq!(row.current_status, TargetStatus::Down);
	assert_eq!(row.consecutive_failures, 3);

	let incidents = store.incidents(target.id).await;

	assert_eq!(incidents.len(), 1);
	assert!(!incidents[0].is_resolved);
	assert_eq!(incidents[0].reason.as_deref(), Some("Connection refused"));

	let snapshots = store.snapshots().await;

	assert_eq!(snapshots.len(), 1);
	assert_eq!(snapshots[0].title, "Service Failure: web");
	assert_eq!(snapshots[0].incident_id, Some(incidents[0].id));

	// Two successes close the incident and raise the recovery alert.
	for step in 0..2 {
		clock.set(start + chrono::TimeDelta::seconds(315 + step * 5));
		prober.push(ProbeOutcome::success(clock.now(), 0.2));
		monitor.trigger_check(target.id).await;
		wait_for_logs(&store, target.id, 5 + step as usize).await;
	}

	let row = store.target(target.id).await.expect("read").expect("row");

	assert_eq!(row.current_status, TargetStatus::Up);
	assert_eq!(row.consecutive_successes, 2);

	let incidents = store.incidents(target.id).await;

	assert!(incidents[0].is_resolved);
	assert_eq!(incidents[0].mttr_seconds, Some(20));

	// Alerts arrive in outcome order: escalation first, recovery second.
	let sent = mailer.sent();

	assert_eq!(sent.len(), 2);
	assert_eq!(sent[0].0, "[CRITICAL FAILURE] Uptime Pulse: web");
	assert!(sent[0].1.contains("failed 3 consecutive times"));
	assert!(sent[0].1.contains("Connection refused"));
	assert_eq!(sent[1].0, "[RECOVERED] Uptime Pulse: web");
	assert!(sent[1].1.contains("back online after 0 minutes"));

	// Six probes, three successful: the 30-day uptime reads 50%.
	assert_eq!(monitor.uptime_percentage(target.id).await.expect("uptime"), 50.);
}

#[tokio::test]
async fn slow_success_records_latency_snapshot_without_state_change() {
	let _ = tracing_subscriber::fmt::try_init();

	let store = Arc::new(MemoryStore::new());
	let prober = Arc::new(ScriptedProber::default());
	let mailer = Arc::new(RecordingMailer::default());
	let clock = ManualClock::new(DateTime::from_timestamp(1_700_000_000, 0).expect("start"));
	let monitor = Monitor::builder()
		.store(store.clone())
		.prober(prober.clone())
		.mailer(mailer.clone())
		.telemetry(Arc::new(StaticTelemetry))
		.clock(Arc::new(clock.clone()))
		.build()
		.expect("monitor");
	let mut target = Target::new("web", "http://web.internal/", clock.now()).expect("target");

	target.current_status = TargetStatus::Up;

	let target = store.insert_target(target).await;
	let mut slow = ProbeOutcome::success(clock.now(), 5.01);

	slow.payload_bytes = Some(2_048);
	prober.push(slow);
	monitor.dispatch_tick().await;
	wait_for_logs(&store, target.id, 1).await;

	let snapshots = store.snapshots().await;

	assert_eq!(snapshots.len(), 1);
	assert_eq!(snapshots[0].title, "High Latency Spike: web");
	assert_eq!(snapshots[0].response_time_s, Some(5.01));

	let row = store.target(target.id).await.expect("read").expect("row");

	assert_eq!(row.current_status, TargetStatus::Up);
	assert!(store.incidents(target.id).await.is_empty());
	assert!(mailer.sent().is_empty());
}
