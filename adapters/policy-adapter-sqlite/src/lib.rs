//! SQLite-backed policy adapter.
//!
//! The pool holds a single connection, so every query is serialized and
//! readers never observe a half-applied write. The database file and its
//! parent directory are created on first open.

use async_trait::async_trait;
use sqlx::sqlite::{self, SqlitePool};
use std::fmt::Debug;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use palisade_types::{
	policy_adapter::{AuthOutcome, BanEntry, NewBan, NewUser, PolicyAdapter, UserAccount},
	prelude::*,
	worker::WorkerPool,
};

mod ban;
mod crypto;
mod listing;
mod schema;
mod setting;
mod user;
mod utils;

use schema::init_db;

// Verified against on unknown or locked accounts to equalize login timing
const DUMMY_PASSWORD: &str = "palisade-dummy-password";

pub struct PolicyAdapterSqlite {
	db: SqlitePool,
	worker: Arc<WorkerPool>,
	dummy_hash: Box<str>,
}

impl Debug for PolicyAdapterSqlite {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PolicyAdapterSqlite").field("db", &self.db).finish_non_exhaustive()
	}
}

impl PolicyAdapterSqlite {
	pub async fn new(worker: Arc<WorkerPool>, path: impl AsRef<Path>) -> PlResult<Self> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}

		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path)
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(opts)
			.await
			.inspect_err(|err| error!("Unable to open database {}: {}", path.display(), err))
			.map_err(|_| Error::DbError)?;

		init_db(&db)
			.await
			.inspect_err(|err| error!("Database initialization failed {}: {}", path.display(), err))
			.map_err(|_| Error::DbError)?;

		let dummy_hash = crypto::generate_password_hash(&worker, DUMMY_PASSWORD.into()).await?;

		info!("Opened configuration database: {}", path.display());
		Ok(Self { db, worker, dummy_hash })
	}

	/// Close the underlying pool. Later queries fail with `DbError`.
	pub async fn close(&self) {
		self.db.close().await;
	}
}

#[async_trait]
impl PolicyAdapter for PolicyAdapterSqlite {
	// Settings
	//**********
	async fn get_setting(&self, key: &str) -> PlResult<Option<Box<str>>> {
		setting::read(&self.db, key).await
	}

	async fn set_setting(&self, key: &str, value: &str) -> PlResult<()> {
		setting::update(&self.db, key, value).await
	}

	// Listing server whitelist
	//**************************
	async fn is_url_whitelisted(&self, url: &str) -> bool {
		listing::is_whitelisted(&self.db, url).await.unwrap_or_else(|err| {
			warn!("Whitelist check failed, denying {}: {}", url, err);
			false
		})
	}

	async fn add_listing_server(&self, pattern: &str) -> PlResult<()> {
		listing::add(&self.db, pattern).await
	}

	async fn list_listing_servers(&self) -> PlResult<Vec<Box<str>>> {
		listing::list(&self.db).await
	}

	async fn remove_listing_server(&self, pattern: &str) -> PlResult<bool> {
		listing::remove(&self.db, pattern).await
	}

	// IP bans
	//*********
	async fn is_ip_banned(&self, addr: &IpAddr, now: Timestamp) -> bool {
		ban::is_banned(&self.db, addr, now).await.unwrap_or_else(|err| {
			warn!("Ban check failed, denying {}: {}", addr, err);
			true
		})
	}

	async fn list_bans(&self) -> PlResult<Vec<BanEntry>> {
		ban::list(&self.db).await
	}

	async fn add_ban(&self, new_ban: NewBan<'_>, now: Timestamp) -> PlResult<BanEntry> {
		ban::add(&self.db, new_ban, now).await
	}

	async fn delete_ban(&self, id: i64) -> PlResult<bool> {
		ban::delete(&self.db, id).await
	}

	async fn purge_expired_bans(&self, now: Timestamp) -> PlResult<u64> {
		ban::purge_expired(&self.db, now).await
	}

	// Users
	//*******
	async fn authenticate(&self, username: &str, password: &str) -> PlResult<AuthOutcome> {
		user::authenticate(&self.db, &self.worker, &self.dummy_hash, username, password).await
	}

	async fn read_user(&self, username: &str) -> PlResult<UserAccount> {
		user::read(&self.db, username).await
	}

	async fn create_user(&self, new_user: NewUser<'_>) -> PlResult<()> {
		user::create(&self.db, &self.worker, new_user).await
	}

	async fn set_user_locked(&self, username: &str, locked: bool) -> PlResult<()> {
		user::set_locked(&self.db, username, locked).await
	}

	async fn set_user_password(&self, username: &str, password: &str) -> PlResult<()> {
		user::set_password(&self.db, &self.worker, username, password).await
	}
}

// vim: ts=4
