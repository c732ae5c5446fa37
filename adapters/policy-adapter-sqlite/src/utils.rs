//! Utility functions for database operations

use sqlx::sqlite::SqliteRow;

use palisade_types::prelude::*;

/// Parse a comma-separated string into a boxed array of boxed strings
pub(crate) fn parse_str_list(s: &str) -> Box<[Box<str>]> {
	s.split(',')
		.map(|s| s.trim().to_owned().into_boxed_str())
		.filter(|s| !s.is_empty())
		.collect::<Vec<_>>()
		.into_boxed_slice()
}

/// Join flag tokens for storage, rejecting tokens that would not survive a split
pub(crate) fn join_str_list(items: &[&str]) -> PlResult<String> {
	for item in items {
		if item.is_empty() || item.contains(',') || item.trim() != *item {
			return Err(Error::ValidationError(format!("Invalid flag: {:?}", item)));
		}
	}
	Ok(items.join(","))
}

/// Log database errors
pub(crate) fn inspect(err: &sqlx::Error) {
	warn!("DB: {:#?}", err);
}

/// Map a query result to a value using a closure
pub(crate) fn map_res<T, F>(row: Result<SqliteRow, sqlx::Error>, f: F) -> PlResult<T>
where
	F: FnOnce(&SqliteRow) -> PlResult<T>,
{
	match row {
		Ok(ref row) => f(row),
		Err(sqlx::Error::RowNotFound) => Err(Error::NotFound),
		Err(err) => {
			inspect(&err);
			Err(Error::DbError)
		}
	}
}

/// Read a column, logging and mapping decode failures
pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> PlResult<T>
where
	T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
	use sqlx::Row;
	row.try_get(name).inspect_err(inspect).map_err(|_| Error::DbError)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_str_list() {
		let expected: Vec<Box<str>> = vec!["mod".into(), "op".into(), "host".into()];
		assert_eq!(parse_str_list("mod, op,,host").to_vec(), expected);
		assert!(parse_str_list("").is_empty());
	}

	#[test]
	fn test_join_str_list() {
		assert_eq!(join_str_list(&["mod", "host"]).ok().as_deref(), Some("mod,host"));
		assert_eq!(join_str_list(&[]).ok().as_deref(), Some(""));
		assert!(join_str_list(&["a,b"]).is_err());
		assert!(join_str_list(&[""]).is_err());
	}
}

// vim: ts=4
