//! Key-value side-store contract with in-memory and Redis-backed
//! implementations.
//!
//! The engine keeps only two things here: the bounded ring of recent host
//! health points and the resource-spike alert cooldown key. Both are
//! best-effort.

// std
use std::collections::{HashMap, VecDeque};
// crates.io
use async_trait::async_trait;
#[cfg(feature = "redis")] use redis::AsyncCommands;
use tokio::sync::Mutex;
// self
use crate::_prelude::*;

/// Key-value side-store consumed by the health monitor.
#[async_trait]
pub trait Kv: Send + Sync {
	/// Push a value onto the head of a list and trim the list to `keep`
	/// entries.
	async fn push_head(&self, key: &str, value: String, keep: usize) -> Result<()>;

	/// Read up to `count` entries from the head of a list, most recent first.
	async fn head_range(&self, key: &str, count: usize) -> Result<Vec<String>>;

	/// Fetch a scalar value, honouring any time-to-live it was stored with.
	async fn get(&self, key: &str) -> Result<Option<String>>;

	/// Store a scalar value with a time-to-live.
	async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}

/// In-memory kv used by tests and single-process embeddings.
#[derive(Debug, Default)]
pub struct MemoryKv {
	inner: Mutex<MemoryKvState>,
}
impl MemoryKv {
	/// Create an empty kv.
	pub fn new() -> Self {
		Self::default()
	}
}
#[async_trait]
impl Kv for MemoryKv {
	async fn push_head(&self, key: &str, value: String, keep: usize) -> Result<()> {
		let mut state = self.inner.lock().await;
		let list = state.lists.entry(key.to_string()).or_default();

		list.push_front(value);
		list.truncate(keep);

		Ok(())
	}

	async fn head_range(&self, key: &str, count: usize) -> Result<Vec<String>> {
		let state = self.inner.lock().await;

		Ok(state
			.lists
			.get(key)
			.map(|list| list.iter().take(count).cloned().collect())
			.unwrap_or_default())
	}

	async fn get(&self, key: &str) -> Result<Option<String>> {
		let mut state = self.inner.lock().await;
		let Some((value, deadline)) = state.scalars.get(key) else {
			return Ok(None);
		};

		if Instant::now() >= *deadline {
			state.scalars.remove(key);

			return Ok(None);
		}

		Ok(Some(value.clone()))
	}

	async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
		let mut state = self.inner.lock().await;

		state.scalars.insert(key.to_string(), (value, Instant::now() + ttl));

		Ok(())
	}
}

#[derive(Debug, Default)]
struct MemoryKvState {
	lists: HashMap<String, VecDeque<String>>,
	scalars: HashMap<String, (String, Instant)>,
}

#[cfg(feature = "redis")]
/// Redis-backed kv.
#[derive(Clone, Debug)]
pub struct RedisKv {
	client: redis::Client,
}
#[cfg(feature = "redis")]
impl RedisKv {
	/// Wrap an existing Redis client.
	pub fn new(client: redis::Client) -> Self {
		Self { client }
	}

	/// Open a client for the given connection URL.
	pub fn open(url: &str) -> Result<Self> {
		Ok(Self { client: redis::Client::open(url)? })
	}
}
#[cfg(feature = "redis")]
#[async_trait]
impl Kv for RedisKv {
	async fn push_head(&self, key: &str, value: String, keep: usize) -> Result<()> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;

		conn.lpush::<_, _, ()>(key, value).await?;
		conn.ltrim::<_, ()>(key, 0, keep.saturating_sub(1) as isize).await?;

		Ok(())
	}

	async fn head_range(&self, key: &str, count: usize) -> Result<Vec<String>> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;
		let values: Vec<String> =
			conn.lrange(key, 0, count.saturating_sub(1) as isize).await?;

		Ok(values)
	}

	async fn get(&self, key: &str) -> Result<Option<String>> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;
		let value: Option<String> = conn.get(key).await?;

		Ok(value)
	}

	async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
		let mut conn = self.client.get_multiplexed_async_connection().await?;

		conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn push_head_trims_to_bound() {
		let kv = MemoryKv::new();

		for index in 1..=25 {
			kv.push_head("ring", index.to_string(), 20).await.expect("push");
		}

		let values = kv.head_range("ring", 20).await.expect("range");

		assert_eq!(values.len(), 20);
		assert_eq!(values[0], "25");
		assert_eq!(values[19], "6");
	}

	#[tokio::test(start_paused = true)]
	async fn scalar_expires_after_ttl() {
		let kv = MemoryKv::new();

		kv.set_with_ttl("cooldown", "1".into(), Duration::from_secs(60)).await.expect("set");

		assert_eq!(kv.get("cooldown").await.expect("get").as_deref(), Some("1"));

		tokio::time::advance(Duration::from_secs(61)).await;

		assert_eq!(kv.get("cooldown").await.expect("get"), None);
	}
}
