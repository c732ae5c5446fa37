//! Registered user accounts and login checks
//!
//! Every `authenticate` call costs one bcrypt verification. Unknown and
//! locked accounts are verified against a throwaway hash so they take as
//! long as a wrong password.

use sqlx::{SqlitePool, sqlite::SqliteRow};

use crate::{crypto, utils::*};
use palisade_types::{
	policy_adapter::{AuthOutcome, NewUser, UserAccount},
	prelude::*,
	worker::WorkerPool,
};

struct StoredUser {
	account: UserAccount,
	password: Option<Box<str>>,
}

fn user_from_row(row: &SqliteRow) -> PlResult<StoredUser> {
	let username: String = column(row, "username")?;
	let password: Option<String> = column(row, "password")?;
	let locked: Option<i64> = column(row, "locked")?;
	let flags: Option<String> = column(row, "flags")?;

	Ok(StoredUser {
		account: UserAccount {
			username: username.into(),
			locked: locked.unwrap_or(0) != 0,
			flags: parse_str_list(flags.as_deref().unwrap_or_default()),
		},
		password: password.map(String::into_boxed_str),
	})
}

async fn read_stored(db: &SqlitePool, username: &str) -> PlResult<StoredUser> {
	let res = sqlx::query("SELECT username, password, locked, flags FROM users WHERE username = ?")
		.bind(username)
		.fetch_one(db)
		.await;

	map_res(res, user_from_row)
}

pub(crate) async fn read(db: &SqlitePool, username: &str) -> PlResult<UserAccount> {
	Ok(read_stored(db, username).await?.account)
}

pub(crate) async fn authenticate(
	db: &SqlitePool,
	worker: &WorkerPool,
	dummy_hash: &str,
	username: &str,
	password: &str,
) -> PlResult<AuthOutcome> {
	let user = match read_stored(db, username).await {
		Ok(user) => user,
		Err(Error::NotFound) => {
			let _ignore = crypto::check_password(worker, password.into(), dummy_hash.into()).await;
			return Ok(AuthOutcome::NotFound);
		}
		Err(err) => return Err(err),
	};

	// Locked is decided before the password so it cannot be probed
	if user.account.locked {
		let _ignore = crypto::check_password(worker, password.into(), dummy_hash.into()).await;
		return Ok(AuthOutcome::Locked);
	}

	let Some(hash) = user.password else {
		let _ignore = crypto::check_password(worker, password.into(), dummy_hash.into()).await;
		return Ok(AuthOutcome::BadPassword);
	};

	match crypto::check_password(worker, password.into(), hash).await {
		Ok(()) => Ok(AuthOutcome::Ok { flags: user.account.flags }),
		Err(_) => Ok(AuthOutcome::BadPassword),
	}
}

pub(crate) async fn create(db: &SqlitePool, worker: &WorkerPool, user: NewUser<'_>) -> PlResult<()> {
	if user.username.trim().is_empty() {
		return Err(Error::ValidationError("Username must not be empty".into()));
	}
	let flags = join_str_list(user.flags)?;
	let hash = crypto::generate_password_hash(worker, user.password.into()).await?;

	let res = sqlx::query("INSERT INTO users (username, password, locked, flags) VALUES (?, ?, ?, ?)")
		.bind(user.username)
		.bind(hash.as_ref())
		.bind(i64::from(user.locked))
		.bind(flags)
		.execute(db)
		.await;

	match res {
		Ok(_) => {
			info!("Created user {}", user.username);
			Ok(())
		}
		Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
			Err(Error::ValidationError(format!("User {} already exists", user.username)))
		}
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

pub(crate) async fn set_locked(db: &SqlitePool, username: &str, locked: bool) -> PlResult<()> {
	let res = sqlx::query("UPDATE users SET locked = ? WHERE username = ?")
		.bind(i64::from(locked))
		.bind(username)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

pub(crate) async fn set_password(
	db: &SqlitePool,
	worker: &WorkerPool,
	username: &str,
	password: &str,
) -> PlResult<()> {
	let hash = crypto::generate_password_hash(worker, password.into()).await?;

	let res = sqlx::query("UPDATE users SET password = ? WHERE username = ?")
		.bind(hash.as_ref())
		.bind(username)
		.execute(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	if res.rows_affected() == 0 {
		return Err(Error::NotFound);
	}
	Ok(())
}

// vim: ts=4
