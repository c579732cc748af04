//! In-process cooldown store
//!
//! Bounded LRU map of counters. Expiry uses the tokio clock so that paused
//! time in tests drives it. Counters are lost on restart, which is acceptable
//! for single-process deployments.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::prelude::*;
use courier_types::cooldown_adapter::{
	CooldownAdapter, CooldownEntry, CooldownLimits, CooldownVerdict,
};

const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Counter {
	count: u32,
	expires_at: Instant,
}

#[derive(Debug)]
pub struct MemoryCooldownStore {
	counters: Mutex<LruCache<Box<str>, Counter>>,
}

impl MemoryCooldownStore {
	pub fn new(capacity: NonZeroUsize) -> Self {
		Self { counters: Mutex::new(LruCache::new(capacity)) }
	}

	/// Live counter for `key`, dropping it when expired
	fn live(cache: &mut LruCache<Box<str>, Counter>, key: &str, now: Instant) -> Option<Counter> {
		match cache.get(key).copied() {
			Some(counter) if counter.expires_at > now => Some(counter),
			Some(_) => {
				cache.pop(key);
				None
			}
			None => None,
		}
	}
}

impl Default for MemoryCooldownStore {
	fn default() -> Self {
		Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
	}
}

#[async_trait]
impl CooldownAdapter for MemoryCooldownStore {
	async fn hit(&self, key: &str, limits: &CooldownLimits) -> ClResult<CooldownVerdict> {
		let now = Instant::now();
		let mut cache = self.counters.lock();
		let count = Self::live(&mut cache, key, now).map_or(0, |counter| counter.count);

		let (count, ttl, verdict) = limits.apply(count);
		cache.put(key.into(), Counter { count, expires_at: now + ttl });
		Ok(verdict)
	}

	async fn peek(&self, key: &str) -> ClResult<Option<CooldownEntry>> {
		let now = Instant::now();
		let mut cache = self.counters.lock();
		Ok(Self::live(&mut cache, key, now).map(|counter| CooldownEntry {
			count: counter.count,
			ttl: counter.expires_at.saturating_duration_since(now),
		}))
	}

	async fn reset(&self, key: &str) -> ClResult<()> {
		self.counters.lock().pop(key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const LIMITS: CooldownLimits = CooldownLimits::new(5, 60, 600);

	#[tokio::test(start_paused = true)]
	async fn test_window_is_sliding() {
		let store = MemoryCooldownStore::default();

		for _ in 0..4 {
			assert!(store.hit("k", &LIMITS).await.unwrap().allowed);
			tokio::time::advance(Duration::from_secs(50)).await;
		}
		// Each allowed hit refreshed the TTL, so the counter survived 200s
		let entry = store.peek("k").await.unwrap().unwrap();
		assert_eq!(entry.count, 4);
		assert_eq!(entry.ttl, Duration::from_secs(10));
	}

	#[tokio::test(start_paused = true)]
	async fn test_counter_expires() {
		let store = MemoryCooldownStore::default();
		assert!(store.hit("k", &LIMITS).await.unwrap().allowed);

		tokio::time::advance(Duration::from_secs(61)).await;
		assert!(store.peek("k").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_reset() {
		let store = MemoryCooldownStore::default();
		store.hit("k", &LIMITS).await.unwrap();
		store.reset("k").await.unwrap();
		assert!(store.peek("k").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_capacity_evicts_oldest() {
		let store = MemoryCooldownStore::new(NonZeroUsize::new(2).unwrap());
		store.hit("a", &LIMITS).await.unwrap();
		store.hit("b", &LIMITS).await.unwrap();
		store.hit("c", &LIMITS).await.unwrap();
		assert!(store.peek("a").await.unwrap().is_none());
		assert!(store.peek("c").await.unwrap().is_some());
	}
}

// vim: ts=4
