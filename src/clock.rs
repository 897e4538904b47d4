//! Wall-clock abstraction so due-ness, MTTR, and cooldowns stay testable.

// std
use std::sync::atomic::{AtomicI64, Ordering};
// self
use crate::_prelude::*;

/// Source of the current UTC instant; every time the engine reads the clock it
/// goes through this seam.
pub trait Clock: Send + Sync {
	/// Current instant in UTC.
	fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Manually driven clock for tests and simulations.
#[derive(Clone, Debug)]
pub struct ManualClock {
	micros: Arc<AtomicI64>,
}
impl ManualClock {
	/// Create a clock frozen at `start`.
	pub fn new(start: DateTime<Utc>) -> Self {
		Self { micros: Arc::new(AtomicI64::new(start.timestamp_micros())) }
	}

	/// Jump the clock to an absolute instant.
	pub fn set(&self, now: DateTime<Utc>) {
		self.micros.store(now.timestamp_micros(), Ordering::SeqCst);
	}

	/// Move the clock forward by `delta`.
	pub fn advance(&self, delta: Duration) {
		self.micros.fetch_add(delta.as_micros() as i64, Ordering::SeqCst);
	}
}
impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
	}
}
