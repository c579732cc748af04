//! Mail queue persistence

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use courier_types::prelude::*;
use courier_types::queue_adapter::*;

use crate::utils::*;

/// Insert a pending message
pub(crate) async fn enqueue(db: &SqlitePool, msg: &NewMessage) -> ClResult<MsgId> {
	let params = serde_json::to_string(&msg.params)?;
	let bcc = serde_json::to_string(&msg.bcc)?;

	let res = sqlx::query(
		"INSERT INTO mail_queue (sender, recipient, subject, template, params, bcc, created_at)
		VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
	)
	.bind(msg.sender.as_ref())
	.bind(msg.recipient.as_ref())
	.bind(msg.subject.as_ref())
	.bind(msg.template.as_ref())
	.bind(params)
	.bind(bcc)
	.bind(Timestamp::now().0)
	.fetch_one(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	Ok(MsgId(res.get(0)))
}

pub(crate) async fn read(db: &SqlitePool, id: MsgId) -> ClResult<QueuedMessage> {
	let res = sqlx::query(&format!("SELECT {} FROM mail_queue WHERE id = ?", MESSAGE_COLUMNS))
		.bind(id.0)
		.fetch_one(db)
		.await;

	map_res(res, |row| row_to_message(&row))
}

/// List messages newest first, optionally filtered by state
pub(crate) async fn list(db: &SqlitePool, opts: &ListMessageOptions) -> ClResult<Vec<QueuedMessage>> {
	let mut query = sqlx::QueryBuilder::new(format!("SELECT {} FROM mail_queue", MESSAGE_COLUMNS));
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
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(res.iter().map(row_to_message))
}

/// Copy a message into a new pending row
pub(crate) async fn requeue(db: &SqlitePool, id: MsgId) -> ClResult<MsgId> {
	let res = sqlx::query(
		"INSERT INTO mail_queue (sender, recipient, subject, template, params, bcc, created_at)
		SELECT sender, recipient, subject, template, params, bcc, ? FROM mail_queue WHERE id = ?
		RETURNING id",
	)
	.bind(Timestamp::now().0)
	.bind(id.0)
	.fetch_optional(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	match res {
		Some(row) => Ok(MsgId(row.get(0))),
		None => Err(Error::NotFound),
	}
}

/// Lock the oldest pending row after `after`
///
/// SQLite has no row locks: the claim takes the database write lock by
/// touching the row, and keeps it until the transaction ends. The claim pool
/// has a short busy timeout, so a concurrent claim gives up quickly and
/// reports no row instead of waiting.
///
/// A row that cannot be decoded is marked failed on the spot and the next
/// one is tried.
pub(crate) async fn claim_next(
	claim_db: &SqlitePool,
	after: Option<MsgId>,
) -> ClResult<Option<Box<dyn ClaimedMessage>>> {
	loop {
		let mut tx = claim_db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

		let res = sqlx::query(&format!(
			"UPDATE mail_queue SET id = id WHERE id = (
				SELECT id FROM mail_queue
				WHERE sent_at IS NULL AND error IS NULL AND id > ?
				ORDER BY id LIMIT 1
			) RETURNING {}",
			MESSAGE_COLUMNS
		))
		.bind(after.map_or(0, |id| id.0))
		.fetch_optional(&mut *tx)
		.await;

		let row = match res {
			Ok(Some(row)) => row,
			Ok(None) => return Ok(None),
			Err(err) if is_contention(&err) => {
				debug!("Mail queue is locked by another worker, skipping");
				return Ok(None);
			}
			Err(err) => {
				inspect(&err);
				return Err(Error::DbError);
			}
		};

		match row_to_message(&row) {
			Ok(message) => {
				let claim: Box<dyn ClaimedMessage> = Box::new(SqliteClaim { tx, message });
				return Ok(Some(claim));
			}
			Err(err) => {
				let id: i64 = row.try_get("id").inspect_err(inspect).map_err(|_| Error::DbError)?;
				let text = undecodable(&err);
				warn!(msg_id = id, "Mail queue row rejected: {}", text);

				sqlx::query("UPDATE mail_queue SET error = ? WHERE id = ?")
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

/// A claimed row together with the transaction holding its lock
struct SqliteClaim {
	tx: Transaction<'static, Sqlite>,
	message: QueuedMessage,
}

#[async_trait]
impl ClaimedMessage for SqliteClaim {
	fn message(&self) -> &QueuedMessage {
		&self.message
	}

	async fn mark_sent(self: Box<Self>, sent_at: Timestamp) -> ClResult<()> {
		let SqliteClaim { mut tx, message } = *self;
		sqlx::query(
			"UPDATE mail_queue SET sent_at = ? WHERE id = ? AND sent_at IS NULL AND error IS NULL",
		)
		.bind(sent_at.0)
		.bind(message.id.0)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)
	}

	async fn mark_failed(self: Box<Self>, error: &str) -> ClResult<()> {
		let SqliteClaim { mut tx, message } = *self;
		sqlx::query(
			"UPDATE mail_queue SET error = ? WHERE id = ? AND sent_at IS NULL AND error IS NULL",
		)
		.bind(error)
		.bind(message.id.0)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

		tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)
	}

	async fn release(self: Box<Self>) -> ClResult<()> {
		let SqliteClaim { tx, .. } = *self;
		tx.rollback().await.inspect_err(inspect).map_err(|_| Error::DbError)
	}
}

// vim: ts=4
