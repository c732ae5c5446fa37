//! Common types used throughout the Palisade server.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::prelude::*;

/// Text layout of timestamps in the database: fixed width, lexically sortable.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `0000-01-01 00:00:00`, the earliest instant with a four-digit year
const DB_MIN_SECS: i64 = -62_167_219_200;
/// `9999-12-31 23:59:59`, the latest instant with a four-digit year
const DB_MAX_SECS: i64 = 253_402_300_799;

// Timestamp //
//***********//
/// Seconds since the Unix epoch, UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		now()
	}

	pub fn add_seconds(&self, secs: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(secs))
	}

	/// Render as `yyyy-MM-dd HH:mm:ss` (UTC).
	///
	/// Instants outside years 0000..=9999 are clamped to the nearest end so
	/// the text stays fixed width and keeps sorting like time.
	pub fn to_db_string(&self) -> String {
		let secs = self.0.clamp(DB_MIN_SECS, DB_MAX_SECS);
		match DateTime::from_timestamp(secs, 0) {
			Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
			None => "9999-12-31 23:59:59".to_string(),
		}
	}

	/// Parse the `yyyy-MM-dd HH:mm:ss` form written by `to_db_string`
	pub fn from_db_str(s: &str) -> PlResult<Timestamp> {
		NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
			.map(|dt| Timestamp(dt.and_utc().timestamp()))
			.map_err(|_| Error::ValidationError(format!("invalid timestamp: {}", s)))
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.to_db_string())
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_str(&self.to_db_string())
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Timestamp::from_db_str(&s).map_err(serde::de::Error::custom)
	}
}

pub fn now() -> Timestamp {
	let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
	Timestamp(i64::try_from(res.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_db_string_format() {
		// 2016-03-01 12:30:05 UTC
		let ts = Timestamp(1_456_835_405);
		assert_eq!(ts.to_db_string(), "2016-03-01 12:30:05");
		assert_eq!(Timestamp::from_db_str("2016-03-01 12:30:05").ok(), Some(ts));
	}

	#[test]
	fn test_db_string_sorts_like_time() {
		let earlier = Timestamp(1_000_000_000).to_db_string();
		let later = Timestamp(1_700_000_000).to_db_string();
		assert!(earlier < later);
	}

	#[test]
	fn test_out_of_range_years_are_clamped() {
		// Year 10001 and year -1
		let far = Timestamp(253_434_000_000);
		let ancient = Timestamp(-62_200_000_000);
		assert_eq!(far.to_db_string(), "9999-12-31 23:59:59");
		assert_eq!(ancient.to_db_string(), "0000-01-01 00:00:00");
		assert_eq!(Timestamp(i64::MAX).to_db_string(), "9999-12-31 23:59:59");
		assert_eq!(Timestamp(i64::MIN).to_db_string(), "0000-01-01 00:00:00");

		let now = Timestamp(4_102_444_800).to_db_string(); // 2100-01-01
		assert!(far.to_db_string() > now);
		assert!(ancient.to_db_string() < now);
		assert_eq!(Timestamp::from_db_str(&far.to_db_string()).ok(), Some(Timestamp(253_402_300_799)));
	}

	#[test]
	fn test_invalid_db_string() {
		assert!(Timestamp::from_db_str("yesterday").is_err());
		assert!(Timestamp::from_db_str("2016-13-01 00:00:00").is_err());
	}

	#[test]
	fn test_serialize_as_text() {
		let json = serde_json::to_string(&Timestamp(0)).unwrap();
		assert_eq!(json, "\"1970-01-01 00:00:00\"");
	}
}

// vim: ts=4
