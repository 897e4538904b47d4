//! Crate-wide error types and `Result` alias.

// self
use crate::model::TargetId;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the uptime monitor crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[cfg(feature = "redis")]
	#[error(transparent)]
	Redis(#[from] redis::RedisError),

	#[error("Kv error: {0}")]
	Kv(String),
	#[error("Mail delivery failed: {0}")]
	Mail(String),
	#[cfg(feature = "metrics")]
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Store error: {0}")]
	Store(String),
	#[error("No target row exists for id {0}.")]
	TargetNotFound(TargetId),
	#[error("Telemetry error: {0}")]
	Telemetry(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
#[cfg(feature = "metrics")]
impl<T> From<metrics::SetRecorderError<T>> for Error
where
	T: std::fmt::Display,
{
	fn from(value: metrics::SetRecorderError<T>) -> Self {
		Self::Metrics(value.to_string())
	}
}
