//! HTTP probing of monitored targets.

// crates.io
use async_trait::async_trait;
use reqwest::{Client, redirect::Policy};
// self
use crate::{_prelude::*, model::Target};

/// Hard deadline applied to one probe end to end, body read included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of one probe attempt against a target.
#[derive(Clone, Debug)]
pub struct ProbeOutcome {
	/// UTC instant the probe started.
	pub started_at: DateTime<Utc>,
	/// Wall time from request start to completion or failure, in seconds.
	pub elapsed_s: f64,
	/// Time to first byte, when response headers arrived.
	pub ttfb_s: Option<f64>,
	/// Body size drained from the response.
	pub payload_bytes: Option<u64>,
	/// HTTP status when a response arrived.
	pub status_code: Option<u16>,
	/// Whether the probe counts as a success (2xx/3xx).
	pub is_success: bool,
	/// Short description of the failure, when any.
	pub error_message: Option<String>,
}
impl ProbeOutcome {
	/// Successful outcome with the given latency; used by tests and simulations.
	pub fn success(started_at: DateTime<Utc>, elapsed_s: f64) -> Self {
		Self {
			started_at,
			elapsed_s,
			ttfb_s: Some(elapsed_s / 2.),
			payload_bytes: Some(0),
			status_code: Some(200),
			is_success: true,
			error_message: None,
		}
	}

	/// Failed outcome carrying a transport error description.
	pub fn failure(started_at: DateTime<Utc>, elapsed_s: f64, message: impl Into<String>) -> Self {
		Self {
			started_at,
			elapsed_s,
			ttfb_s: None,
			payload_bytes: None,
			status_code: None,
			is_success: false,
			error_message: Some(message.into()),
		}
	}
}

/// Capability of performing one probe.
///
/// The scheduler and state machine only see this trait, so alternative probe
/// kinds (TCP connect, TLS handshake, synthetic scripts) slot in without
/// touching either.
#[async_trait]
pub trait Prober: Send + Sync {
	/// Execute one probe against the target.
	async fn probe(&self, target: &Target) -> ProbeOutcome;
}

/// Plain HTTP GET prober measuring TTFB and full-body latency.
#[derive(Clone, Debug)]
pub struct HttpProber {
	client: Client,
}
impl HttpProber {
	/// Build a prober with the default client.
	pub fn new() -> Result<Self> {
		let client = Client::builder()
			.redirect(Policy::limited(10))
			.user_agent(format!("uptime-pulse/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Ok(Self { client })
	}

	/// Build a prober using the supplied HTTP client (primarily for tests).
	pub fn with_client(client: Client) -> Self {
		Self { client }
	}
}
#[async_trait]
impl Prober for HttpProber {
	async fn probe(&self, target: &Target) -> ProbeOutcome {
		let started_at = Utc::now();
		let start = Instant::now();
		let mut response = match self
			.client
			.get(target.url.clone())
			.timeout(PROBE_TIMEOUT)
			.send()
			.await
		{
			Ok(response) => response,
			Err(err) => {
				return ProbeOutcome::failure(
					started_at,
					start.elapsed().as_secs_f64(),
					describe_transport_error(&err),
				);
			},
		};
		// Headers are in; the body is streamed so TTFB and total latency stay
		// distinguishable.
		let ttfb_s = start.elapsed().as_secs_f64();
		let status = response.status().as_u16();
		let mut payload_bytes: u64 = 0;

		loop {
			match response.chunk().await {
				Ok(Some(chunk)) => payload_bytes += chunk.len() as u64,
				Ok(None) => break,
				Err(err) => {
					return ProbeOutcome::failure(
						started_at,
						start.elapsed().as_secs_f64(),
						describe_transport_error(&err),
					);
				},
			}
		}

		let elapsed_s = start.elapsed().as_secs_f64();
		let is_success = (200..400).contains(&status);
		let error_message = (!is_success).then(|| format!("HTTP {status}"));

		tracing::debug!(
			name = %target.name,
			status,
			elapsed_s,
			payload_bytes,
			"probe complete"
		);

		ProbeOutcome {
			started_at,
			elapsed_s,
			ttfb_s: Some(ttfb_s),
			payload_bytes: Some(payload_bytes),
			status_code: Some(status),
			is_success,
			error_message,
		}
	}
}

fn describe_transport_error(err: &reqwest::Error) -> String {
	if err.is_timeout() {
		"Request timed out".into()
	} else if err.is_connect() {
		"Connection failed".into()
	} else if err.is_redirect() {
		"Too many redirects".into()
	} else if err.is_body() || err.is_decode() {
		"Response body read failed".into()
	} else {
		err.to_string()
	}
}
