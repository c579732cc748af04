//! Database schema initialization

use sqlx::SqlitePool;

/// Create the queue table and its indexes
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS globals (
			key text NOT NULL,
			value text,
			PRIMARY KEY(key)
	)",
	)
	.execute(&mut *tx)
	.await?;

	// Mail queue
	//************
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS mail_queue (
		id integer PRIMARY KEY AUTOINCREMENT,
		sender text NOT NULL,
		recipient text NOT NULL,
		subject text NOT NULL,
		template text NOT NULL,
		params text NOT NULL,
		bcc text NOT NULL,
		created_at integer NOT NULL,
		sent_at integer,
		error text
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_mail_queue_pending ON mail_queue(id)
		WHERE sent_at IS NULL AND error IS NULL",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query("INSERT OR IGNORE INTO globals (key, value) VALUES ('schema_version', '1')")
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
