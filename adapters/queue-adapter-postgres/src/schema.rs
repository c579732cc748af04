//! Database schema initialization

use sqlx::PgPool;

/// Create the queue table and its indexes
pub(crate) async fn init_db(db: &PgPool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS mail_queue (
		id bigserial PRIMARY KEY,
		sender text NOT NULL,
		recipient text NOT NULL,
		subject text NOT NULL,
		template text NOT NULL,
		params text NOT NULL,
		bcc text NOT NULL,
		created_at bigint NOT NULL,
		sent_at bigint,
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

	tx.commit().await?;

	Ok(())
}

// vim: ts=4
