//! SQLite-backed mail queue for Courier
//!
//! Suits single-host deployments. SQLite serializes writers, so a claimed
//! message holds the database write lock until its outcome is committed;
//! enqueues wait for it (up to the main pool's busy timeout) and concurrent
//! claims skip instead of waiting.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod queue;
mod schema;
mod utils;

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::path::Path;
use std::time::Duration;

use courier_types::prelude::*;
use courier_types::queue_adapter::{
	ClaimedMessage, ListMessageOptions, MailQueueAdapter, NewMessage, QueuedMessage,
};

/// How long an enqueue waits for a delivery in progress
const WRITE_BUSY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct QueueAdapterSqlite {
	db: SqlitePool,
	/// Connections used for claims, with the short lock wait
	claim_db: SqlitePool,
}

impl QueueAdapterSqlite {
	/// Open (or create) the queue database at `path`
	pub async fn new(path: impl AsRef<Path>) -> ClResult<Self> {
		Self::with_lock_wait(path, Duration::ZERO).await
	}

	/// Like [`new`](Self::new), with a custom wait for a contended claim
	pub async fn with_lock_wait(path: impl AsRef<Path>, lock_wait: Duration) -> ClResult<Self> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal)
			.busy_timeout(WRITE_BUSY_TIMEOUT);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts.clone())
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		schema::init_db(&db)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		let claim_db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts.busy_timeout(lock_wait))
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		info!("Mail queue opened at {}", path.display());
		Ok(Self { db, claim_db })
	}
}

#[async_trait]
impl MailQueueAdapter for QueueAdapterSqlite {
	async fn enqueue(&self, msg: &NewMessage) -> ClResult<MsgId> {
		queue::enqueue(&self.db, msg).await
	}

	async fn read(&self, id: MsgId) -> ClResult<QueuedMessage> {
		queue::read(&self.db, id).await
	}

	async fn list(&self, opts: &ListMessageOptions) -> ClResult<Vec<QueuedMessage>> {
		queue::list(&self.db, opts).await
	}

	async fn claim_next(&self, after: Option<MsgId>) -> ClResult<Option<Box<dyn ClaimedMessage>>> {
		queue::claim_next(&self.claim_db, after).await
	}

	async fn requeue(&self, id: MsgId) -> ClResult<MsgId> {
		queue::requeue(&self.db, id).await
	}
}

// vim: ts=4
