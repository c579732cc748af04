//! Redis-backed cooldown counters for Courier
//!
//! Counters live under their cooldown key with a Redis TTL, so every Courier
//! process pointed at the same Redis shares them. Each attempt runs as one
//! Lua script, which makes the read-compare-write step atomic across clients.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::time::Duration;

use courier_types::cooldown_adapter::{
	CooldownAdapter, CooldownEntry, CooldownLimits, CooldownVerdict,
};
use courier_types::prelude::*;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);
const CONNECT_RETRIES: usize = 2;

/// KEYS[1] counter, ARGV[1] max attempts, ARGV[2] window secs, ARGV[3] ban secs
///
/// Returns `{allowed, retry_after_secs}`.
const HIT_SCRIPT: &str = r"
local count = tonumber(redis.call('GET', KEYS[1]) or '0')
local max = tonumber(ARGV[1])
if count < max then
	redis.call('SET', KEYS[1], count + 1, 'EX', ARGV[2])
	return {1, 0}
end
redis.call('SET', KEYS[1], max, 'EX', ARGV[3])
return {0, tonumber(ARGV[3])}
";

pub struct CooldownAdapterRedis {
	conn: ConnectionManager,
	hit_script: redis::Script,
}

impl std::fmt::Debug for CooldownAdapterRedis {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CooldownAdapterRedis").finish_non_exhaustive()
	}
}

fn unavailable(err: &redis::RedisError) -> Error {
	warn!("Redis: {}", err);
	Error::ServiceUnavailable(format!("redis: {}", err))
}

/// Redis rejects `EX 0`
fn ttl_secs(ttl: Duration) -> u64 {
	ttl.as_secs().max(1)
}

impl CooldownAdapterRedis {
	/// Connect to Redis at `url`
	///
	/// Fails with `ServiceUnavailable` when the server cannot be reached
	/// within a few seconds. Once connected, a lost connection is re-established
	/// in the background and commands time out after one second, so callers
	/// see an error instead of waiting on a hung server.
	pub async fn new(url: &str) -> ClResult<Self> {
		let client = redis::Client::open(url)
			.map_err(|err| Error::ConfigError(format!("invalid Redis URL: {}", err)))?;
		let config = ConnectionManagerConfig::new()
			.set_connection_timeout(CONNECT_TIMEOUT)
			.set_response_timeout(RESPONSE_TIMEOUT)
			.set_number_of_retries(CONNECT_RETRIES);
		let conn = ConnectionManager::new_with_config(client, config)
			.await
			.map_err(|err| unavailable(&err))?;

		info!("Cooldown counters stored in Redis");
		Ok(Self { conn, hit_script: redis::Script::new(HIT_SCRIPT) })
	}
}

#[async_trait]
impl CooldownAdapter for CooldownAdapterRedis {
	async fn hit(&self, key: &str, limits: &CooldownLimits) -> ClResult<CooldownVerdict> {
		let mut conn = self.conn.clone();
		let (allowed, retry_after): (i64, u64) = self
			.hit_script
			.key(key)
			.arg(limits.max_attempts)
			.arg(ttl_secs(limits.window))
			.arg(ttl_secs(limits.ban))
			.invoke_async(&mut conn)
			.await
			.map_err(|err| unavailable(&err))?;

		if allowed == 1 {
			Ok(CooldownVerdict::allowed())
		} else {
			Ok(CooldownVerdict::denied(Duration::from_secs(retry_after)))
		}
	}

	async fn peek(&self, key: &str) -> ClResult<Option<CooldownEntry>> {
		let mut conn = self.conn.clone();
		let (count, pttl): (Option<u32>, i64) = redis::pipe()
			.get(key)
			.pttl(key)
			.query_async(&mut conn)
			.await
			.map_err(|err| unavailable(&err))?;

		// PTTL is negative for missing keys
		Ok(count.filter(|_| pttl > 0).map(|count| CooldownEntry {
			count,
			ttl: Duration::from_millis(pttl.unsigned_abs()),
		}))
	}

	async fn reset(&self, key: &str) -> ClResult<()> {
		let mut conn = self.conn.clone();
		conn.del::<_, ()>(key).await.map_err(|err| unavailable(&err))
	}
}

// vim: ts=4
