//! Password hashing on the worker pool

use palisade_types::{prelude::*, worker::WorkerPool};

const BCRYPT_COST: u32 = 10;

fn generate_password_hash_sync(password: Box<str>) -> PlResult<Box<str>> {
	let hash = bcrypt::hash(password.as_ref(), BCRYPT_COST)
		.map_err(|err| Error::Internal(format!("bcrypt: {}", err)))?;

	Ok(hash.into())
}

pub(crate) async fn generate_password_hash(
	worker: &WorkerPool,
	password: Box<str>,
) -> PlResult<Box<str>> {
	worker.try_run_immed(move || generate_password_hash_sync(password)).await
}

/// Stored values that are not bcrypt hashes never verify
fn check_password_sync(password: Box<str>, password_hash: Box<str>) -> PlResult<()> {
	let res = bcrypt::verify(password.as_ref(), &password_hash).map_err(|err| {
		warn!("Unverifiable password hash: {}", err);
		Error::PermissionDenied
	})?;
	if !res { Err(Error::PermissionDenied) } else { Ok(()) }
}

/// `Ok(())` iff `password` matches `password_hash`
pub(crate) async fn check_password(
	worker: &WorkerPool,
	password: Box<str>,
	password_hash: Box<str>,
) -> PlResult<()> {
	worker
		.try_run_immed(move || check_password_sync(password, password_hash))
		.await
		.map_err(|_| Error::PermissionDenied)
}


// vim: ts=4
