//! Cooldown gate
//!
//! Front of the counter store used by the application flows. A store that
//! cannot be reached lets the attempt through.

use std::sync::Arc;
use std::time::Duration;

use super::error::CooldownError;
use super::policy::CooldownPolicy;
use super::subject::{CooldownSubject, cooldown_key};
use crate::prelude::*;
use courier_types::cooldown_adapter::{CooldownAdapter, CooldownLimits, CooldownVerdict};

#[derive(Debug, Clone)]
pub struct CooldownGate {
	store: Arc<dyn CooldownAdapter>,
}

impl CooldownGate {
	pub fn new(store: Arc<dyn CooldownAdapter>) -> Self {
		Self { store }
	}

	/// Count one attempt of `purpose` for `subject`
	pub async fn check_and_increment(
		&self,
		purpose: &str,
		subject: &str,
		max_attempts: u32,
		window_ttl: Duration,
		ban_ttl: Duration,
	) -> CooldownVerdict {
		let limits = CooldownLimits { max_attempts, window: window_ttl, ban: ban_ttl };
		let key = cooldown_key(purpose, subject);
		match self.store.hit(&key, &limits).await {
			Ok(verdict) => {
				if !verdict.allowed {
					debug!("Cooldown {} denied, retry after {:?}", key, verdict.retry_after);
				}
				verdict
			}
			Err(err) => {
				warn!("Cooldown store unavailable for {}, allowing attempt: {}", key, err);
				CooldownVerdict::allowed()
			}
		}
	}

	/// Count one attempt against a policy
	pub async fn check(
		&self,
		policy: &CooldownPolicy,
		subject: &CooldownSubject<'_>,
	) -> Result<(), CooldownError> {
		let verdict = self
			.check_and_increment(
				policy.purpose,
				&subject.slug(),
				policy.limits.max_attempts,
				policy.limits.window,
				policy.limits.ban,
			)
			.await;
		if verdict.allowed {
			Ok(())
		} else {
			Err(CooldownError::Throttled { purpose: policy.purpose, retry_after: verdict.retry_after })
		}
	}

	/// Evaluate gates in order, stopping at the first denial
	///
	/// Gates after a denial are not counted.
	pub async fn check_all(
		&self,
		gates: &[(&CooldownPolicy, CooldownSubject<'_>)],
	) -> Result<(), CooldownError> {
		for (policy, subject) in gates {
			self.check(policy, subject).await?;
		}
		Ok(())
	}

	/// Forget the counter of `policy` for `subject`, e.g. after a successful login
	pub async fn clear(&self, policy: &CooldownPolicy, subject: &CooldownSubject<'_>) -> ClResult<()> {
		self.store.reset(&cooldown_key(policy.purpose, &subject.slug())).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cooldown::MemoryCooldownStore;
	use async_trait::async_trait;
	use courier_types::cooldown_adapter::CooldownEntry;
	use std::net::{IpAddr, Ipv4Addr};

	#[derive(Debug)]
	struct BrokenStore;

	#[async_trait]
	impl CooldownAdapter for BrokenStore {
		async fn hit(&self, _key: &str, _limits: &CooldownLimits) -> ClResult<CooldownVerdict> {
			Err(Error::ServiceUnavailable("connection refused".into()))
		}
		async fn peek(&self, _key: &str) -> ClResult<Option<CooldownEntry>> {
			Err(Error::ServiceUnavailable("connection refused".into()))
		}
		async fn reset(&self, _key: &str) -> ClResult<()> {
			Err(Error::ServiceUnavailable("connection refused".into()))
		}
	}

	fn gate() -> (CooldownGate, Arc<MemoryCooldownStore>) {
		let store = Arc::new(MemoryCooldownStore::default());
		(CooldownGate::new(store.clone()), store)
	}

	const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

	#[tokio::test(start_paused = true)]
	async fn test_five_per_minute_then_ban() {
		let (gate, store) = gate();
		let window = Duration::from_secs(60);
		let ban = Duration::from_secs(600);

		for i in 0..5 {
			let verdict = gate.check_and_increment("forgot_passwd_ip", "ip1", 5, window, ban).await;
			assert!(verdict.allowed, "attempt {} should pass", i + 1);
			assert_eq!(verdict.retry_after, Duration::ZERO);
		}
		let entry = store.peek("cooldown:forgot_passwd_ip:ip1").await.unwrap().unwrap();
		assert_eq!(entry.count, 5);
		assert_eq!(entry.ttl, Duration::from_secs(60));

		let verdict = gate.check_and_increment("forgot_passwd_ip", "ip1", 5, window, ban).await;
		assert!(!verdict.allowed);
		assert_eq!(verdict.retry_after, ban);
		let entry = store.peek("cooldown:forgot_passwd_ip:ip1").await.unwrap().unwrap();
		assert_eq!(entry.ttl, ban);

		// Still denied while banned
		tokio::time::advance(Duration::from_secs(599)).await;
		let verdict = gate.check_and_increment("forgot_passwd_ip", "ip1", 5, window, ban).await;
		assert!(!verdict.allowed);

		// The denial re-stamped the ban; once it runs out the window starts over
		tokio::time::advance(Duration::from_secs(601)).await;
		let verdict = gate.check_and_increment("forgot_passwd_ip", "ip1", 5, window, ban).await;
		assert!(verdict.allowed);
		let entry = store.peek("cooldown:forgot_passwd_ip:ip1").await.unwrap().unwrap();
		assert_eq!(entry.count, 1);
	}

	#[tokio::test]
	async fn test_subjects_are_independent() {
		let (gate, _store) = gate();
		let policy = CooldownPolicy::FORGOT_PASSWD_EMAIL;

		assert!(gate.check(&policy, &CooldownSubject::Email("a@example.com")).await.is_ok());
		assert!(gate.check(&policy, &CooldownSubject::Email("b@example.com")).await.is_ok());
		let err = gate.check(&policy, &CooldownSubject::Email("A@example.com")).await.unwrap_err();
		assert_eq!(err.retry_after(), Duration::from_secs(300));
	}

	#[tokio::test]
	async fn test_check_all_short_circuits() {
		let (gate, store) = gate();
		let gates = [
			(&CooldownPolicy::RESEND_UID, CooldownSubject::User(42)),
			(&CooldownPolicy::RESEND_IP, CooldownSubject::Ip(IP)),
		];

		assert!(gate.check_all(&gates).await.is_ok());
		let err = gate.check_all(&gates).await.unwrap_err();
		assert!(matches!(err, CooldownError::Throttled { purpose: "resend_uid", .. }));

		// The IP gate was only counted once
		let entry = store.peek("cooldown:resend_ip:203_0_113_7").await.unwrap().unwrap();
		assert_eq!(entry.count, 1);
	}

	#[tokio::test]
	async fn test_store_failure_allows() {
		let _ = tracing_subscriber::fmt().with_test_writer().try_init();
		let gate = CooldownGate::new(Arc::new(BrokenStore));

		for _ in 0..10 {
			assert!(gate.check(&CooldownPolicy::UPDATE_EMAIL, &CooldownSubject::User(1)).await.is_ok());
		}
	}

	#[tokio::test]
	async fn test_clear() {
		let (gate, _store) = gate();
		let subject = CooldownSubject::User(7);
		gate.check(&CooldownPolicy::RESEND_UID, &subject).await.unwrap();
		assert!(gate.check(&CooldownPolicy::RESEND_UID, &subject).await.is_err());

		gate.clear(&CooldownPolicy::RESEND_UID, &subject).await.unwrap();
		assert!(gate.check(&CooldownPolicy::RESEND_UID, &subject).await.is_ok());
	}
}

// vim: ts=4
