//! Serverwide IP bans

use std::net::IpAddr;

use sqlx::{SqlitePool, sqlite::SqliteRow};

use crate::utils::*;
use palisade_types::{
	address::{family_width, is_in_subnet},
	policy_adapter::{BanEntry, NewBan},
	prelude::*,
};

const BAN_COLUMNS: &str = "rowid AS id, ip, subnet, expires, comment, added";

fn ban_from_row(row: &SqliteRow) -> PlResult<BanEntry> {
	let ip: String = column(row, "ip")?;
	let ip = ip.parse().map_err(|_| {
		warn!("Invalid address in ipbans: {:?}", ip);
		Error::DbError
	})?;
	let subnet: i64 = column(row, "subnet")?;
	let expires: String = column(row, "expires")?;
	let added: Option<String> = column(row, "added")?;
	let comment: Option<String> = column(row, "comment")?;

	Ok(BanEntry {
		id: column(row, "id")?,
		ip,
		subnet: u8::try_from(subnet).map_err(|_| Error::DbError)?,
		expires: Timestamp::from_db_str(&expires)?,
		comment: comment.unwrap_or_default().into_boxed_str(),
		added: added.as_deref().map(Timestamp::from_db_str).transpose()?.unwrap_or_default(),
	})
}

/// Whether any ban active at `now` covers `addr`
pub(crate) async fn is_banned(db: &SqlitePool, addr: &IpAddr, now: Timestamp) -> PlResult<bool> {
	let rows = sqlx::query("SELECT ip, subnet FROM ipbans WHERE expires > ?")
		.bind(now.to_db_string())
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	for row in &rows {
		let ip: String = column(row, "ip")?;
		let subnet: i64 = column(row, "subnet")?;
		let Ok(net) = ip.parse::<IpAddr>() else {
			warn!("Skipping ban with invalid address {:?}", ip);
			continue;
		};
		let Ok(subnet) = u8::try_from(subnet) else {
			warn!("Skipping ban {} with invalid subnet {}", ip, subnet);
			continue;
		};
		if is_in_subnet(addr, &net, subnet) {
			return Ok(true);
		}
	}

	Ok(false)
}

pub(crate) async fn list(db: &SqlitePool) -> PlResult<Vec<BanEntry>> {
	let rows = sqlx::query(&format!("SELECT {} FROM ipbans ORDER BY rowid", BAN_COLUMNS))
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	let bans = rows
		.iter()
		.filter_map(|row| match ban_from_row(row) {
			Ok(ban) => Some(ban),
			Err(err) => {
				warn!("Skipping unreadable ban row: {}", err);
				None
			}
		})
		.collect();
	Ok(bans)
}

/// Insert a ban unless one with the same address and subnet exists
pub(crate) async fn add(db: &SqlitePool, ban: NewBan<'_>, now: Timestamp) -> PlResult<BanEntry> {
	if ban.subnet > family_width(&ban.ip) {
		return Err(Error::ValidationError(format!(
			"Subnet /{} is too wide for {}",
			ban.subnet, ban.ip
		)));
	}

	let ip = ban.ip.to_string();
	let mut tx = db.begin().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	let rows = sqlx::query(&format!(
		"SELECT {} FROM ipbans WHERE ip = ? AND subnet = ? ORDER BY rowid",
		BAN_COLUMNS
	))
	.bind(&ip)
	.bind(i64::from(ban.subnet))
	.fetch_all(&mut *tx)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	for row in &rows {
		match ban_from_row(row) {
			Ok(existing) => {
				debug!("Ban for {}/{} already exists (id {})", ip, ban.subnet, existing.id);
				tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;
				return Ok(existing);
			}
			// An unreadable row for the same address is replaced by the new one
			Err(err) => {
				let id: i64 = column(row, "id")?;
				warn!("Replacing unreadable ban row {} for {}/{}: {}", id, ip, ban.subnet, err);
				sqlx::query("DELETE FROM ipbans WHERE rowid = ?")
					.bind(id)
					.execute(&mut *tx)
					.await
					.inspect_err(inspect)
					.map_err(|_| Error::DbError)?;
			}
		}
	}

	let res = sqlx::query(
		"INSERT INTO ipbans (ip, subnet, expires, comment, added) VALUES (?, ?, ?, ?, ?)",
	)
	.bind(&ip)
	.bind(i64::from(ban.subnet))
	.bind(ban.expires.to_db_string())
	.bind(ban.comment)
	.bind(now.to_db_string())
	.execute(&mut *tx)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	tx.commit().await.inspect_err(inspect).map_err(|_| Error::DbError)?;

	info!("Banned {}/{} until {}", ip, ban.subnet, ban.expires);
	Ok(BanEntry {
		id: res.last_insert_rowid(),
		ip: ban.ip,
		subnet: ban.subnet,
		expires: ban.expires,
		comment: ban.comment.into(),
		added: now,
	})
}

pub(crate) async fn delete(db: &SqlitePool, id: i64) -> PlResult<bool> {
	let res = sqlx::query("DELETE FROM ipbans WHERE rowid = ?")
		.bind(id)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected() > 0)
}

/// Remove bans whose expiration is at or before `now`
pub(crate) async fn purge_expired(db: &SqlitePool, now: Timestamp) -> PlResult<u64> {
	let res = sqlx::query("DELETE FROM ipbans WHERE expires <= ?")
		.bind(now.to_db_string())
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	Ok(res.rows_affected())
}

// vim: ts=4
