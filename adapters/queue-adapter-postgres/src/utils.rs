//! Row decoding and error mapping

use courier_types::params::TemplateParams;
use courier_types::prelude::*;
use courier_types::queue_adapter::QueuedMessage;
use sqlx::Row;
use sqlx::postgres::PgRow;

pub(crate) const MESSAGE_COLUMNS: &str =
	"id, sender, recipient, subject, template, params, bcc, created_at, sent_at, error";

pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

pub(crate) fn map_res<T, F>(row: Result<PgRow, sqlx::Error>, f: F) -> ClResult<T>
where
	F: FnOnce(PgRow) -> Result<T, sqlx::Error>,
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

pub(crate) fn collect_res<T>(
	iter: impl Iterator<Item = Result<T, sqlx::Error>>,
) -> ClResult<Vec<T>> {
	let mut items = Vec::new();
	for item in iter {
		items.push(item.inspect_err(inspect).map_err(|_| Error::DbError)?);
	}
	Ok(items)
}

/// Failure text recorded for a row that cannot be decoded
pub(crate) fn undecodable(err: &sqlx::Error) -> String {
	format!("undecodable row: {}", err)
}

fn decode_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, sqlx::Error> {
	serde_json::from_str(json).map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

fn get_str(row: &PgRow, col: &str) -> Result<Box<str>, sqlx::Error> {
	row.try_get::<String, _>(col).map(String::into_boxed_str)
}

pub(crate) fn row_to_message(row: &PgRow) -> Result<QueuedMessage, sqlx::Error> {
	let params: String = row.try_get("params")?;
	let bcc: String = row.try_get("bcc")?;
	Ok(QueuedMessage {
		id: MsgId(row.try_get("id")?),
		sender: get_str(row, "sender")?,
		recipient: get_str(row, "recipient")?,
		subject: get_str(row, "subject")?,
		template: get_str(row, "template")?,
		params: decode_json::<TemplateParams>(&params)?,
		bcc: decode_json::<Vec<Box<str>>>(&bcc)?,
		created_at: row.try_get("created_at").map(Timestamp)?,
		sent_at: row.try_get::<Option<i64>, _>("sent_at")?.map(Timestamp),
		error: row.try_get::<Option<String>, _>("error")?.map(String::into_boxed_str),
	})
}

// vim: ts=4
