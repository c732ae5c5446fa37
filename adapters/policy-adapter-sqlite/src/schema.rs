//! Database schema initialization and migrations

use sqlx::{Sqlite, SqlitePool, Transaction};

// Current schema version - update this when adding new migrations
const CURRENT_DB_VERSION: i64 = 1;

/// Get the schema version stored in the database header
async fn get_db_version(tx: &mut Transaction<'_, Sqlite>) -> i64 {
	sqlx::query_scalar::<_, i64>("PRAGMA user_version")
		.fetch_one(&mut **tx)
		.await
		.unwrap_or(0)
}

async fn set_db_version(tx: &mut Transaction<'_, Sqlite>, version: i64) -> Result<(), sqlx::Error> {
	// PRAGMA does not take bound parameters
	sqlx::query(&format!("PRAGMA user_version = {}", version)).execute(&mut **tx).await?;
	Ok(())
}

/// Create missing tables. Safe to run on every open.
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	let version = get_db_version(&mut tx).await;

	// Settings key/value table
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS settings (
			key text NOT NULL,
			value text,
			PRIMARY KEY(key)
		)",
	)
	.execute(&mut *tx)
	.await?;

	// Listing server URL whitelist (regular expressions)
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS listingservers (
			url text NOT NULL
		)",
	)
	.execute(&mut *tx)
	.await?;

	// Serverwide IP bans. Timestamps are 'YYYY-MM-DD HH:MM:SS' UTC text.
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS ipbans (
			id integer PRIMARY KEY,
			ip text NOT NULL,
			subnet integer NOT NULL DEFAULT 0,
			expires text NOT NULL,
			comment text,
			added text NOT NULL
		)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_ipbans_ip_subnet ON ipbans(ip, subnet)")
		.execute(&mut *tx)
		.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_ipbans_expires ON ipbans(expires)")
		.execute(&mut *tx)
		.await?;

	// Registered user accounts
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS users (
			username text NOT NULL,
			password text,
			locked integer NOT NULL DEFAULT 0,
			flags text,
			PRIMARY KEY(username)
		)",
	)
	.execute(&mut *tx)
	.await?;

	if version < CURRENT_DB_VERSION {
		set_db_version(&mut tx, CURRENT_DB_VERSION).await?;
	}

	tx.commit().await?;
	Ok(())
}

// vim: ts=4
