//! Server settings key-value store

use sqlx::SqlitePool;

use crate::utils::*;
use palisade_types::prelude::*;

/// Read a single setting; `Ok(None)` if the key is absent
pub(crate) async fn read(db: &SqlitePool, key: &str) -> PlResult<Option<Box<str>>> {
	let res = sqlx::query("SELECT value FROM settings WHERE key = ?")
		.bind(key)
		.fetch_one(db)
		.await;

	match map_res(res, |row| column::<Option<String>>(row, "value")) {
		Ok(value) => Ok(Some(value.unwrap_or_default().into_boxed_str())),
		Err(Error::NotFound) => Ok(None),
		Err(err) => Err(err),
	}
}

/// Insert or replace a setting
pub(crate) async fn update(db: &SqlitePool, key: &str, value: &str) -> PlResult<()> {
	sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
		.bind(key)
		.bind(value)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(())
}

// vim: ts=4
