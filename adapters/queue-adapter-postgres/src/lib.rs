//! PostgreSQL-backed mail queue for Courier
//!
//! Claims use `SELECT ... FOR UPDATE SKIP LOCKED`, so any number of worker
//! processes can poll the same table: each pending row is locked by at most
//! one of them, and the others move on to the next row.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

mod schema;
mod utils;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};

use courier_types::prelude::*;
use courier_types::queue_adapter::*;

use crate::utils::*;

#[derive(Debug)]
pub struct QueueAdapterPostgres {
	db: PgPool,
}

impl QueueAdapterPostgres {
	pub async fn new(url: &str) -> ClResult<Self> {
		let db = PgPoolOptions::new()
			.max_connections(10)
			.connect(url)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		Self::from_pool(db).await
	}

	/// Use an existing pool, creating the schema when missing
	pub async fn from_pool(db: PgPool) -> ClResult<Self> {
		schema::init_db(&db)
			.await
			.inspect_err(|err| error!("DbError: {:#?}", err))
			.or(Err(Error::DbError))?;

		Ok(Self { db })
	}
}

#[async_trait]
impl MailQueueAdapter for QueueAdapterPostgres {
	async fn enqueue(&self, msg: &NewMessage) -> ClResult<MsgId> {
		let params = serde_json::to_string(&msg.params)?;
		let bcc = serde_json::to_string(&msg.bcc)?;

		let res = sqlx::query(
			"INSERT INTO mail_queue (sender, recipient, subject, template, params, bcc, created_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
		)
		.bind(msg.sender.as_ref())
		.bind(msg.recipient.as_ref())
		.bind(msg.subject.as_ref())
		.bind(msg.template.as_ref())
		.bind(params)
		.bind(bcc)
		.bind(Timestamp::now().0)
		.fetch_one(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		Ok(MsgId(res.get(0)))
	}

	async fn read(&self, id: MsgId) -> ClResult<QueuedMessage> {
		let res = sqlx::query(&format!("SELECT {} FROM mail_queue WHERE id = $1", MESSAGE_COLUMNS))
			.bind(id.0)
			.fetch_one(&self.db)
			.await;

		map_res(res, |row| row_to_message(&row))
	}

	async fn list(&self, opts: &ListMessageOptions) -> ClResult<Vec<QueuedMessage>> {
		let mut query =
			sqlx::QueryBuilder::new(format!("SELECT {} FROM mail_queue", MESSAGE_COLUMNS));
		if let Some(state) = opts.state {
			query.push(match state {
				MessageState::Pending => " WHERE sent_at IS NULL AND error IS NULL",
				MessageState::Sent => " WHERE sent_at IS NOT NULL",
				MessageState::Failed => " WHERE error IS NOT NULL",
			});
		}
		query.push(" ORDER BY id DESC LIMIT ").push_bind(i64::from(opts.limit.unwrap_or(100)));

		let res = query
			.build()
			.fetch_all(&self.db)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

		collect_res(res.iter().map(row_to_message))
	}

	async fn claim_next(&self, after: Option<MsgId>) -> ClResult<Option<Box<dyn ClaimedMessage>>> {
		loop {
			let mut tx = self.db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

			let row = sqlx::query(&format!(
				"SELECT {} FROM mail_queue
				WHERE sent_at IS NULL AND error IS NULL AND id > $1
				ORDER BY id LIMIT 1
				FOR UPDATE SKIP LOCKED",
				MESSAGE_COLUMNS
			))
			.bind(after.map_or(0, |id| id.0))
			.fetch_optional(&mut *tx)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

			let Some(row) = row else {
				return Ok(None);
			};
			match row_to_message(&row) {
				Ok(message) => {
					let claim: Box<dyn ClaimedMessage> = Box::new(PgClaim { tx, message });
					return Ok(Some(claim));
				}
				// Mark the row failed so it stops blocking the queue
				Err(err) => {
					let id: i64 =
						row.try_get("id").inspect_err(inspect).map_err(|_| Error::DbError)?;
					let text = undecodable(&err);
					warn!(msg_id = id, "Mail queue row rejected: {}", text);

					sqlx::query("UPDATE mail_queue SET error = $1 WHERE id = $2")
						.bind(text)
						.bind(id)
						.execute(&mut *tx)
						.await
						.inspect_err(inspect)
						.map_err(|_| Error::DbError)?;
					tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
				}
			}
		}
	}

	async fn requeue(&self, id: MsgId) -> ClResult<MsgId> {
		let res = sqlx::query(
			"INSERT INTO mail_queue (sender, recipient, subject, template, params, bcc, created_at)
			SELECT sender, recipient, subject, template, params, bcc, $1 FROM mail_queue WHERE id = $2
			RETURNING id",
		)
		.bind(Timestamp::now().0)
		.bind(id.0)
		.fetch_optional(&self.db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		match res {
			Some(row) => Ok(MsgId(row.get(0))),
			None => Err(Error::NotFound),
		}
	}
}

/// A claimed row and the transaction holding its `FOR UPDATE` lock
struct PgClaim {
	tx: Transaction<'static, Postgres>,
	message: QueuedMessage,
}

impl PgClaim {
	async fn finish(self, column: &str, value: PgOutcome<'_>) -> ClResult<()> {
		let PgClaim { mut tx, message } = self;
		let sql = format!(
			"UPDATE mail_queue SET {} = $1 WHERE id = $2 AND sent_at IS NULL AND error IS NULL",
			column
		);
		let query = sqlx::query(&sql);
		let query = match value {
			PgOutcome::SentAt(ts) => query.bind(ts.0),
			PgOutcome::Error(text) => query.bind(text),
		};
		query
			.bind(message.id.0)
			.execute(&mut *tx)
			.await
			.inspect_err(inspect)
			.map_err(|_| Error::DbError)?;

		tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)
	}
}

enum PgOutcome<'a> {
	SentAt(Timestamp),
	Error(&'a str),
}

#[async_trait]
impl ClaimedMessage for PgClaim {
	fn message(&self) -> &QueuedMessage {
		&self.message
	}

	async fn mark_sent(self: Box<Self>, sent_at: Timestamp) -> ClResult<()> {
		self.finish("sent_at", PgOutcome::SentAt(sent_at)).await
	}

	async fn mark_failed(self: Box<Self>, error: &str) -> ClResult<()> {
		self.finish("error", PgOutcome::Error(error)).await
	}

	async fn release(self: Box<Self>) -> ClResult<()> {
		let PgClaim { tx, .. } = *self;
		tx.rollback().await.inspect_err(inspect).map_err(|_| Error::DbError)
	}
}

// vim: ts=4
