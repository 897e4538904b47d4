//! Alert formatting and dispatch.
//!
//! Every alert lands on the operator log stream; mail delivery is attempted on
//! top when a recipient is configured, and delivery failures never propagate.

// crates.io
use async_trait::async_trait;
// self
use crate::{_prelude::*, model::Target};

/// Sender address used when none is configured.
pub const DEFAULT_FROM_EMAIL: &str = "alerts@uptime-pulse.local";

/// Outbound mail transport consumed by the alerter.
#[async_trait]
pub trait Mailer: Send + Sync {
	/// Deliver one message, reporting failures to the caller.
	async fn send(&self, from: &str, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Mail transport that only records deliveries on the log stream.
///
/// Stands in when no real transport is wired up, so alert formatting and
/// cooldown behaviour stay observable without an SMTP relay.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;
#[async_trait]
impl Mailer for LogMailer {
	async fn send(&self, from: &str, to: &str, subject: &str, _body: &str) -> Result<()> {
		tracing::info!(from, to, subject, "mail transport not configured; logging only");

		Ok(())
	}
}

/// Formats and sends alert messages.
#[derive(Clone)]
pub struct Alerter {
	mailer: Arc<dyn Mailer>,
	from: String,
}
impl Alerter {
	/// Create an alerter sending from the given address.
	pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
		Self { mailer, from: from.into() }
	}

	/// Emit a target alert.
	///
	/// The subject reads `[<level>] Uptime Pulse: <name>`; the body carries the
	/// target name, URL, level, timestamp, and message.
	pub async fn alert_target(
		&self,
		target: &Target,
		level: &str,
		message: &str,
		now: DateTime<Utc>,
	) {
		let subject = format!("[{level}] Uptime Pulse: {}", target.name);
		let body = format!(
			"Alert for {name} ({url})\n\nLevel: {level}\nTime: {now}\n\nMessage: {message}",
			name = target.name,
			url = target.url,
		);

		#[cfg(feature = "metrics")]
		crate::metrics::record_alert(level);

		self.dispatch(target.alert_email.as_deref(), &subject, &body).await;
	}

	/// Emit a preformatted alert, optionally mailing it to `to`.
	pub async fn alert_raw(&self, to: Option<&str>, subject: &str, body: &str) {
		#[cfg(feature = "metrics")]
		crate::metrics::record_alert("SYSTEM");

		self.dispatch(to, subject, body).await;
	}

	async fn dispatch(&self, to: Option<&str>, subject: &str, body: &str) {
		tracing::warn!(subject, message = body, "alert raised");

		let Some(to) = to else {
			return;
		};

		if let Err(err) = self.mailer.send(&self.from, to, subject, body).await {
			tracing::warn!(error = %err, to, subject, "alert email delivery failed");
		}
	}
}
impl std::fmt::Debug for Alerter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Alerter").field("from", &self.from).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::Mutex;
	// self
	use super::*;

	#[derive(Debug, Default)]
	struct RecordingMailer {
		sent: Mutex<Vec<(String, String)>>,
		fail: bool,
	}
	#[async_trait]
	impl Mailer for RecordingMailer {
		async fn send(&self, _from: &str, to: &str, subject: &str, _body: &str) -> Result<()> {
			if self.fail {
				return Err(Error::Mail("relay unreachable".into()));
			}

			self.sent.lock().expect("lock").push((to.to_string(), subject.to_string()));

			Ok(())
		}
	}

	fn sample_target(email: Option<&str>) -> Target {
		let mut target = Target::new("api", "http://api.internal/", Utc::now()).expect("target");

		target.alert_email = email.map(str::to_string);

		target
	}

	#[tokio::test]
	async fn mails_configured_recipient_with_levelled_subject() {
		let mailer = Arc::new(RecordingMailer::default());
		let alerter = Alerter::new(mailer.clone(), DEFAULT_FROM_EMAIL);
		let target = sample_target(Some("oncall@example.com"));

		alerter.alert_target(&target, "CRITICAL FAILURE", "3 consecutive failures", Utc::now()).await;

		let sent = mailer.sent.lock().expect("lock");

		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].0, "oncall@example.com");
		assert_eq!(sent[0].1, "[CRITICAL FAILURE] Uptime Pulse: api");
	}

	#[tokio::test]
	async fn skips_mail_without_recipient() {
		let mailer = Arc::new(RecordingMailer::default());
		let alerter = Alerter::new(mailer.clone(), DEFAULT_FROM_EMAIL);
		let target = sample_target(None);

		alerter.alert_target(&target, "RECOVERED", "back online", Utc::now()).await;

		assert!(mailer.sent.lock().expect("lock").is_empty());
	}

	#[tokio::test]
	async fn delivery_failures_are_swallowed() {
		let mailer = Arc::new(RecordingMailer { fail: true, ..Default::default() });
		let alerter = Alerter::new(mailer, DEFAULT_FROM_EMAIL);
		let target = sample_target(Some("oncall@example.com"));

		// Must not panic or propagate.
		alerter.alert_target(&target, "CRITICAL FAILURE", "unreachable", Utc::now()).await;
	}
}
