//! Mail queue adapter tests
//!
//! Enqueue, claim and outcome recording against an on-disk database.

use courier_queue_adapter_sqlite::QueueAdapterSqlite;
use courier_types::params::{ParamValue, TemplateParams};
use courier_types::queue_adapter::{ListMessageOptions, MailQueueAdapter, MessageState, NewMessage};
use courier_types::types::{MsgId, Timestamp};
use courier_types::error::Error;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn create_test_adapter() -> (QueueAdapterSqlite, TempDir) {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let adapter = QueueAdapterSqlite::new(temp_dir.path().join("queue.db"))
		.await
		.expect("Failed to create adapter");

	(adapter, temp_dir)
}

fn new_message(recipient: &str) -> NewMessage {
	let mut params = TemplateParams::new();
	params.insert("name".into(), ParamValue::from("Alice"));
	params.insert("count".into(), ParamValue::from(3_i64));
	NewMessage {
		sender: "Courier <noreply@example.com>".into(),
		recipient: recipient.into(),
		subject: "Hi".into(),
		template: "mail/en/default".into(),
		params,
		bcc: vec!["audit@example.com".into()],
	}
}

#[tokio::test]
async fn test_enqueue_and_read() {
	let (adapter, _temp) = create_test_adapter().await;

	let id = adapter.enqueue(&new_message("alice@example.com")).await.unwrap();
	let msg = adapter.read(id).await.unwrap();

	assert_eq!(msg.id, id);
	assert_eq!(msg.recipient.as_ref(), "alice@example.com");
	assert_eq!(msg.params["name"], ParamValue::Text("Alice".into()));
	assert_eq!(msg.bcc, vec![Box::<str>::from("audit@example.com")]);
	assert_eq!(msg.state(), MessageState::Pending);
	assert!(msg.created_at.0 > 0);
}

#[tokio::test]
async fn test_ids_are_monotonic() {
	let (adapter, _temp) = create_test_adapter().await;

	let a = adapter.enqueue(&new_message("a@example.com")).await.unwrap();
	let b = adapter.enqueue(&new_message("b@example.com")).await.unwrap();
	assert!(b > a);
}

#[tokio::test]
async fn test_read_unknown_id() {
	let (adapter, _temp) = create_test_adapter().await;
	assert!(matches!(adapter.read(MsgId(999)).await, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_claim_oldest_first() {
	let (adapter, _temp) = create_test_adapter().await;
	let first = adapter.enqueue(&new_message("a@example.com")).await.unwrap();
	let second = adapter.enqueue(&new_message("b@example.com")).await.unwrap();

	let claim = adapter.claim_next(None).await.unwrap().expect("a pending row");
	assert_eq!(claim.message().id, first);
	claim.mark_sent(Timestamp(1_700_000_000)).await.unwrap();

	let claim = adapter.claim_next(None).await.unwrap().expect("a pending row");
	assert_eq!(claim.message().id, second);
	claim.mark_failed("SMTP timeout").await.unwrap();

	assert!(adapter.claim_next(None).await.unwrap().is_none());

	let sent = adapter.read(first).await.unwrap();
	assert_eq!(sent.state(), MessageState::Sent);
	assert_eq!(sent.sent_at, Some(Timestamp(1_700_000_000)));
	assert!(sent.error.is_none());

	let failed = adapter.read(second).await.unwrap();
	assert_eq!(failed.state(), MessageState::Failed);
	assert_eq!(failed.error.as_deref(), Some("SMTP timeout"));
	assert!(failed.sent_at.is_none());
}

#[tokio::test]
async fn test_claim_after_cursor() {
	let (adapter, _temp) = create_test_adapter().await;
	let first = adapter.enqueue(&new_message("a@example.com")).await.unwrap();
	let second = adapter.enqueue(&new_message("b@example.com")).await.unwrap();

	let claim = adapter.claim_next(Some(first)).await.unwrap().expect("a pending row");
	assert_eq!(claim.message().id, second);
	claim.release().await.unwrap();

	assert!(adapter.claim_next(Some(second)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_claim_is_exclusive() {
	let (adapter, _temp) = create_test_adapter().await;
	let id = adapter.enqueue(&new_message("a@example.com")).await.unwrap();

	let claim = adapter.claim_next(None).await.unwrap().expect("a pending row");
	assert_eq!(claim.message().id, id);

	// A second worker cannot get the row while the first holds it
	assert!(adapter.claim_next(None).await.unwrap().is_none());

	claim.mark_sent(Timestamp::now()).await.unwrap();

	// Sent rows are never handed out again
	assert!(adapter.claim_next(None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dropped_claim_rolls_back() {
	let (adapter, _temp) = create_test_adapter().await;
	let id = adapter.enqueue(&new_message("a@example.com")).await.unwrap();

	{
		let claim = adapter.claim_next(None).await.unwrap().expect("a pending row");
		assert_eq!(claim.message().id, id);
		// Worker dies before committing
		drop(claim);
	}

	let claim = adapter.claim_next(None).await.unwrap().expect("row is pending again");
	assert_eq!(claim.message().id, id);
	claim.release().await.unwrap();
	assert_eq!(adapter.read(id).await.unwrap().state(), MessageState::Pending);
}

#[tokio::test]
async fn test_undecodable_row_is_marked_failed() {
	let (adapter, temp) = create_test_adapter().await;
	let raw = SqlitePool::connect(&format!("sqlite://{}", temp.path().join("queue.db").display()))
		.await
		.expect("open raw connection");

	let bad: i64 = sqlx::query_scalar(
		"INSERT INTO mail_queue (sender, recipient, subject, template, params, bcc, created_at)
		VALUES ('noreply@example.com', 'a@example.com', 'Hi', 'mail/en/default', '{broken', '[]', 1)
		RETURNING id",
	)
	.fetch_one(&raw)
	.await
	.expect("insert raw row");
	let good = adapter.enqueue(&new_message("b@example.com")).await.unwrap();

	// The broken row is skipped, not handed out and not left blocking the queue
	let claim = adapter.claim_next(None).await.unwrap().expect("the decodable row");
	assert_eq!(claim.message().id, good);
	claim.release().await.unwrap();

	let error: Option<String> = sqlx::query_scalar("SELECT error FROM mail_queue WHERE id = ?")
		.bind(bad)
		.fetch_one(&raw)
		.await
		.expect("read raw row");
	assert!(error.is_some_and(|e| e.starts_with("undecodable row: ")));

	let pending = adapter.claim_next(Some(good)).await.unwrap();
	assert!(pending.is_none());
	raw.close().await;
}

#[tokio::test]
async fn test_outcome_is_written_once() {
	let (adapter, _temp) = create_test_adapter().await;
	let id = adapter.enqueue(&new_message("a@example.com")).await.unwrap();

	let claim = adapter.claim_next(None).await.unwrap().expect("a pending row");
	claim.mark_failed("first failure").await.unwrap();

	// Requeue makes a fresh row and leaves the failed one untouched
	let copy = adapter.requeue(id).await.unwrap();
	assert_ne!(copy, id);
	assert_eq!(adapter.read(id).await.unwrap().error.as_deref(), Some("first failure"));

	let copied = adapter.read(copy).await.unwrap();
	assert_eq!(copied.state(), MessageState::Pending);
	assert_eq!(copied.recipient.as_ref(), "a@example.com");
	assert_eq!(copied.params, adapter.read(id).await.unwrap().params);
}

#[tokio::test]
async fn test_requeue_unknown_id() {
	let (adapter, _temp) = create_test_adapter().await;
	assert!(matches!(adapter.requeue(MsgId(42)).await, Err(Error::NotFound)));
}

#[tokio::test]
async fn test_list_by_state() {
	let (adapter, _temp) = create_test_adapter().await;
	let a = adapter.enqueue(&new_message("a@example.com")).await.unwrap();
	let b = adapter.enqueue(&new_message("b@example.com")).await.unwrap();
	let c = adapter.enqueue(&new_message("c@example.com")).await.unwrap();

	adapter.claim_next(None).await.unwrap().unwrap().mark_sent(Timestamp::now()).await.unwrap();
	adapter.claim_next(None).await.unwrap().unwrap().mark_failed("bounced").await.unwrap();

	let all = adapter.list(&ListMessageOptions::default()).await.unwrap();
	assert_eq!(all.iter().map(|m| m.id).collect::<Vec<_>>(), vec![c, b, a]);

	let failed =
		adapter.list(&ListMessageOptions { state: Some(MessageState::Failed), limit: None }).await.unwrap();
	assert_eq!(failed.len(), 1);
	assert_eq!(failed[0].id, b);

	let pending = adapter
		.list(&ListMessageOptions { state: Some(MessageState::Pending), limit: Some(10) })
		.await
		.unwrap();
	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0].id, c);
}

#[tokio::test]
async fn test_enqueue_while_claimed() {
	let (adapter, _temp) = create_test_adapter().await;
	adapter.enqueue(&new_message("a@example.com")).await.unwrap();

	let claim = adapter.claim_next(None).await.unwrap().expect("a pending row");
	let adapter = std::sync::Arc::new(adapter);

	// The writer waits for the claim to commit instead of failing
	let writer = {
		let adapter = adapter.clone();
		tokio::spawn(async move { adapter.enqueue(&new_message("b@example.com")).await })
	};
	tokio::time::sleep(std::time::Duration::from_millis(100)).await;
	claim.mark_sent(Timestamp::now()).await.unwrap();

	let id = writer.await.unwrap().unwrap();
	assert_eq!(adapter.read(id).await.unwrap().state(), MessageState::Pending);
}

// vim: ts=4
