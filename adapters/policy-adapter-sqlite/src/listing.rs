//! Listing server whitelist
//!
//! Each row holds a regular expression. A URL is whitelisted if any pattern
//! matches its normalized form. Patterns are validated on insert, but rows
//! written by other tools may still be malformed; those are skipped.

use regex::Regex;
use sqlx::{Row, SqlitePool};
use url::Url;

use crate::{setting, utils::*};
use palisade_types::{
	policy_adapter::{ConfigKey, parse_config_bool},
	prelude::*,
};

async fn whitelist_enabled(db: &SqlitePool) -> PlResult<bool> {
	let key = ConfigKey::ANNOUNCE_WHITELIST;
	let value = setting::read(db, key.name).await?;
	Ok(parse_config_bool(value.as_deref().unwrap_or(key.default)))
}

/// Whether a session may be announced at `url`
pub(crate) async fn is_whitelisted(db: &SqlitePool, url: &str) -> PlResult<bool> {
	let Ok(url) = Url::parse(url) else {
		debug!("Rejecting unparseable listing server URL {:?}", url);
		return Ok(false);
	};

	if !whitelist_enabled(db).await? {
		return Ok(true);
	}

	let rows = sqlx::query("SELECT url FROM listingservers ORDER BY rowid")
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	for row in rows {
		let pattern: String = row.try_get("url").inspect_err(inspect).map_err(|_| Error::DbError)?;
		match Regex::new(&pattern) {
			Ok(re) if re.is_match(url.as_str()) => return Ok(true),
			Ok(_) => {}
			Err(err) => warn!("Skipping invalid listing server pattern {:?}: {}", pattern, err),
		}
	}

	Ok(false)
}

pub(crate) async fn add(db: &SqlitePool, pattern: &str) -> PlResult<()> {
	Regex::new(pattern).map_err(|err| Error::ValidationError(format!("Invalid pattern: {}", err)))?;

	sqlx::query("INSERT INTO listingservers (url) VALUES (?)")
		.bind(pattern)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(())
}

pub(crate) async fn list(db: &SqlitePool) -> PlResult<Vec<Box<str>>> {
	let rows = sqlx::query("SELECT url FROM listingservers ORDER BY rowid")
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	rows.iter().map(|row| column::<String>(row, "url").map(String::into_boxed_str)).collect()
}

pub(crate) async fn remove(db: &SqlitePool, pattern: &str) -> PlResult<bool> {
	let res = sqlx::query("DELETE FROM listingservers WHERE url = ?")
		.bind(pattern)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected() > 0)
}

// vim: ts=4
