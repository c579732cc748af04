//! Shared utilities for the SQLite adapter
//!
//! Row decoding and error mapping used by the queue operations.

use courier_types::params::TemplateParams;
use courier_types::prelude::*;
use courier_types::queue_adapter::QueuedMessage;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

pub(crate) const MESSAGE_COLUMNS: &str =
	"id, sender, recipient, subject, template, params, bcc, created_at, sent_at, error";

/// Log database error for debugging
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Map a single-row query result, translating SQL errors to ClResult
pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> ClResult<T>
where
	F: FnOnce(SqliteRow) -> Result<T, sqlx::Error>,
{
	match row {
		Ok(row) => f(row).inspect_err(inspect).map_err(|_| Error::DbError),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

/// Collect results from an iterator, failing on the first decode error
pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>>,
) -> ClResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// True for SQLITE_BUSY / SQLITE_LOCKED, including their extended codes
pub(crate) fn is_contention(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Database(db_err) => db_err
			.code()
			.and_then(|code| code.parse::<i32>().ok())
			.is_some_and(|code| matches!(code & 0xff, 5 | 6)),
		_ => false,
	}
}

/// Failure text recorded for a row that cannot be decoded
pub(crate) fn undecodable(err: &sqlx::Error) -> String {
	format!("undecodable row: {}", err)
}

fn decode_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, sqlx::Error> {
	serde_json::from_str(json).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

/// Decode a `mail_queue` row selected with [`MESSAGE_COLUMNS`]
pub(crate) fn row_to_message(row: &SqliteRow) -> Result<QueuedMessage, sqlx::Error> {
	let params: &str = row.try_get("params")?;
	let bcc: &str = row.try_get("bcc")?;
	Ok(QueuedMessage {
		id: MsgId(row.try_get("id")?),
		sender: row.try_get("sender")?,
		recipient: row.try_get("recipient")?,
		subject: row.try_get("subject")?,
		template: row.try_get("template")?,
		params: decode_json::<TemplateParams>(params)?,
		bcc: decode_json::<Vec<Box<str>>>(bcc)?,
		created_at: row.try_get("created_at").map(Timestamp)?,
		sent_at: row.try_get::<Option<i64>, _>("sent_at")?.map(Timestamp),
		error: row.try_get("error")?,
	})
}

// vim: ts=4
