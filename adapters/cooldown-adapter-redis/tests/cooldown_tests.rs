//! Redis cooldown adapter tests
//!
//! Skipped unless `COURIER_TEST_REDIS_URL` points to a scratch Redis.

use courier_cooldown_adapter_redis::CooldownAdapterRedis;
use courier_types::cooldown_adapter::{CooldownAdapter, CooldownLimits};
use courier_types::error::Error;
use std::time::Duration;

async fn create_test_adapter() -> Option<CooldownAdapterRedis> {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let url = std::env::var("COURIER_TEST_REDIS_URL").ok()?;
	Some(CooldownAdapterRedis::new(&url).await.expect("Failed to connect to Redis"))
}

#[tokio::test]
async fn test_window_then_ban() {
	let Some(store) = create_test_adapter().await else { return };
	let key = "cooldown:test_window:ip1";
	store.reset(key).await.unwrap();
	let limits = CooldownLimits::new(3, 60, 600);

	for _ in 0..3 {
		assert!(store.hit(key, &limits).await.unwrap().allowed);
	}
	let entry = store.peek(key).await.unwrap().unwrap();
	assert_eq!(entry.count, 3);
	assert!(entry.ttl <= Duration::from_secs(60));

	let verdict = store.hit(key, &limits).await.unwrap();
	assert!(!verdict.allowed);
	assert_eq!(verdict.retry_after, Duration::from_secs(600));
	assert!(store.peek(key).await.unwrap().unwrap().ttl > Duration::from_secs(60));

	store.reset(key).await.unwrap();
	assert!(store.peek(key).await.unwrap().is_none());
	assert!(store.hit(key, &limits).await.unwrap().allowed);
	store.reset(key).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_hits_are_counted_once_each() {
	let Some(store) = create_test_adapter().await else { return };
	let store = std::sync::Arc::new(store);
	let key = "cooldown:test_concurrent:user_9";
	store.reset(key).await.unwrap();
	let limits = CooldownLimits::new(5, 60, 60);

	let tasks: Vec<_> = (0..20)
		.map(|_| {
			let store = store.clone();
			tokio::spawn(async move { store.hit(key, &limits).await.unwrap().allowed })
		})
		.collect();
	let mut allowed = 0;
	for task in tasks {
		if task.await.unwrap() {
			allowed += 1;
		}
	}
	assert_eq!(allowed, 5);
	store.reset(key).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_fails_fast() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let res = tokio::time::timeout(
		Duration::from_secs(20),
		CooldownAdapterRedis::new("redis://127.0.0.1:1/"),
	)
	.await
	.expect("connect attempt is bounded");
	assert!(matches!(res, Err(Error::ServiceUnavailable(_))));

	let res = CooldownAdapterRedis::new("not a url").await;
	assert!(matches!(res, Err(Error::ConfigError(_))));
}

// vim: ts=4
