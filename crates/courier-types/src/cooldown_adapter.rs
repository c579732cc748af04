//! Adapter for attempt counters with TTL expiry
//!
//! A counter is created on the first attempt and disappears when its TTL
//! runs out. One `hit` applies this rule atomically:
//!
//! - stored count below `max_attempts`: allow, store count + 1, refresh the
//!   TTL to `window`
//! - otherwise: deny, store `max_attempts`, stamp the TTL to `ban` and report
//!   `ban` as the retry delay

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownLimits {
	pub max_attempts: u32,
	pub window: Duration,
	pub ban: Duration,
}

impl CooldownLimits {
	pub const fn new(max_attempts: u32, window_secs: u64, ban_secs: u64) -> Self {
		Self {
			max_attempts,
			window: Duration::from_secs(window_secs),
			ban: Duration::from_secs(ban_secs),
		}
	}

	/// Apply one attempt to a stored count, returning the new count, its TTL
	/// and the verdict
	pub fn apply(&self, count: u32) -> (u32, Duration, CooldownVerdict) {
		if count < self.max_attempts {
			(count + 1, self.window, CooldownVerdict::allowed())
		} else {
			(self.max_attempts, self.ban, CooldownVerdict::denied(self.ban))
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownVerdict {
	pub allowed: bool,
	pub retry_after: Duration,
}

impl CooldownVerdict {
	pub fn allowed() -> Self {
		Self { allowed: true, retry_after: Duration::ZERO }
	}

	pub fn denied(retry_after: Duration) -> Self {
		Self { allowed: false, retry_after }
	}
}

/// Current state of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownEntry {
	pub count: u32,
	pub ttl: Duration,
}

#[async_trait]
pub trait CooldownAdapter: Debug + Send + Sync {
	/// Count one attempt against `key`
	async fn hit(&self, key: &str, limits: &CooldownLimits) -> ClResult<CooldownVerdict>;

	/// Read a counter without touching it
	async fn peek(&self, key: &str) -> ClResult<Option<CooldownEntry>>;

	async fn reset(&self, key: &str) -> ClResult<()>;
}


// vim: ts=4
