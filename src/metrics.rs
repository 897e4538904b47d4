//! Metrics helpers for probe, incident, and alert accounting.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
#[cfg(feature = "prometheus")] use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_PROBES_TOTAL: &str = "uptime_pulse_probes_total";
const METRIC_PROBE_DURATION: &str = "uptime_pulse_probe_duration_seconds";
const METRIC_INCIDENTS_OPENED: &str = "uptime_pulse_incidents_opened_total";
const METRIC_INCIDENTS_RESOLVED: &str = "uptime_pulse_incidents_resolved_total";
const METRIC_ALERTS_TOTAL: &str = "uptime_pulse_alerts_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the
/// recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record one probe outcome with its latency.
pub fn record_probe(target: &str, success: bool, elapsed_s: f64) {
	let status = if success { "success" } else { "failure" };

	metrics::counter!(METRIC_PROBES_TOTAL, status_labels(target, status).iter()).increment(1);
	metrics::histogram!(METRIC_PROBE_DURATION, target_labels(target).iter()).record(elapsed_s);
}

/// Record an incident being opened for a target.
pub fn record_incident_opened(target: &str) {
	metrics::counter!(METRIC_INCIDENTS_OPENED, target_labels(target).iter()).increment(1);
}

/// Record an incident being resolved for a target.
pub fn record_incident_resolved(target: &str) {
	metrics::counter!(METRIC_INCIDENTS_RESOLVED, target_labels(target).iter()).increment(1);
}

/// Record an alert being raised at the given level.
pub fn record_alert(level: &str) {
	let mut labels = LabelSet::new();

	labels.push(Label::new("level", level.to_owned()));

	metrics::counter!(METRIC_ALERTS_TOTAL, labels.iter()).increment(1);
}

fn target_labels(target: &str) -> LabelSet {
	let mut labels = LabelSet::with_capacity(1);

	labels.push(Label::new("target", target.to_owned()));

	labels
}

fn status_labels(target: &str, status: &'static str) -> LabelSet {
	let mut labels = target_labels(target);

	labels.push(Label::new("status", status));

	labels
}
