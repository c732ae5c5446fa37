//! Adapter that stores the server's admission policy: settings, the listing
//! server whitelist, IP bans, and registered user accounts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::net::IpAddr;

use crate::prelude::*;

/// A typed server setting with its fallback value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKey {
	pub name: &'static str,
	pub default: &'static str,
}

impl ConfigKey {
	/// Only announce sessions to listing servers on the whitelist
	pub const ANNOUNCE_WHITELIST: ConfigKey =
		ConfigKey { name: "announceWhitelist", default: "false" };
	/// Allow users without a registered account to log in
	pub const ALLOW_GUESTS: ConfigKey = ConfigKey { name: "allowGuests", default: "true" };

	pub const fn new(name: &'static str, default: &'static str) -> Self {
		Self { name, default }
	}
}

/// Interpret a stored setting as a boolean
pub fn parse_config_bool(value: &str) -> bool {
	matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// A stored IP ban
///
/// Serialized form matches the admin listing: `{id, ip, subnet, expires, comment, added}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
	pub id: i64,
	pub ip: IpAddr,
	/// Prefix length as stored; 0 means the single address
	pub subnet: u8,
	pub expires: Timestamp,
	pub comment: Box<str>,
	pub added: Timestamp,
}

impl BanEntry {
	/// A ban is active iff its expiration is strictly after `now`
	pub fn is_active(&self, now: Timestamp) -> bool {
		self.expires > now
	}

	pub fn matches(&self, addr: &IpAddr) -> bool {
		crate::address::is_in_subnet(addr, &self.ip, self.subnet)
	}
}

/// Data for a new ban
#[derive(Debug, Clone)]
pub struct NewBan<'a> {
	pub ip: IpAddr,
	pub subnet: u8,
	pub expires: Timestamp,
	pub comment: &'a str,
}

/// A registered user account, without its credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
	pub username: Box<str>,
	pub locked: bool,
	pub flags: Box<[Box<str>]>,
}

/// Data for creating a user account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
	pub username: &'a str,
	pub password: &'a str,
	pub locked: bool,
	pub flags: &'a [&'a str],
}

/// Result of a login attempt against the account table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
	Ok { flags: Box<[Box<str>]> },
	BadPassword,
	Locked,
	NotFound,
}

#[async_trait]
pub trait PolicyAdapter: Debug + Send + Sync {
	// Settings
	//**********
	/// Read a setting; `Ok(None)` if the key was never set
	async fn get_setting(&self, key: &str) -> PlResult<Option<Box<str>>>;

	/// Insert or replace a setting
	async fn set_setting(&self, key: &str, value: &str) -> PlResult<()>;

	/// Read a boolean setting, falling back to the key's default
	async fn get_config_bool(&self, key: ConfigKey) -> PlResult<bool> {
		let value = self.get_setting(key.name).await?;
		Ok(parse_config_bool(value.as_deref().unwrap_or(key.default)))
	}

	// Listing server whitelist
	//**************************
	/// Whether a session may be announced at `url`. Never errors: storage
	/// faults deny.
	async fn is_url_whitelisted(&self, url: &str) -> bool;

	async fn add_listing_server(&self, pattern: &str) -> PlResult<()>;
	async fn list_listing_servers(&self) -> PlResult<Vec<Box<str>>>;
	/// Returns true iff a pattern was removed
	async fn remove_listing_server(&self, pattern: &str) -> PlResult<bool>;

	// IP bans
	//*********
	/// Whether `addr` is covered by a ban active at `now`. Never errors:
	/// storage faults deny (report banned).
	async fn is_ip_banned(&self, addr: &IpAddr, now: Timestamp) -> bool;

	/// All bans (active and expired) in insertion order
	async fn list_bans(&self) -> PlResult<Vec<BanEntry>>;

	/// Insert a ban, or return the existing one with the same (ip, subnet) unchanged
	async fn add_ban(&self, ban: NewBan<'_>, now: Timestamp) -> PlResult<BanEntry>;

	/// Returns true iff a row was removed
	async fn delete_ban(&self, id: i64) -> PlResult<bool>;

	/// Delete bans that expired at or before `now`, returning the number removed
	async fn purge_expired_bans(&self, now: Timestamp) -> PlResult<u64>;

	// Users
	//*******
	async fn authenticate(&self, username: &str, password: &str) -> PlResult<AuthOutcome>;

	async fn read_user(&self, username: &str) -> PlResult<UserAccount>;
	async fn create_user(&self, user: NewUser<'_>) -> PlResult<()>;
	async fn set_user_locked(&self, username: &str, locked: bool) -> PlResult<()>;
	async fn set_user_password(&self, username: &str, password: &str) -> PlResult<()>;
}


// vim: ts=4
