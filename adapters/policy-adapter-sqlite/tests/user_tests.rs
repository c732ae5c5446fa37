//! User Account Tests
//!
//! 1. Login outcomes (ok, bad password, locked, unknown)
//! 2. Account administration
//! 3. Timing of unknown accounts versus wrong passwords

#[cfg(test)]
mod tests {
	use palisade_policy_adapter_sqlite::PolicyAdapterSqlite;
	use palisade_types::policy_adapter::{AuthOutcome, NewUser, PolicyAdapter};
	use palisade_types::prelude::*;
	use palisade_types::worker::WorkerPool;
	use std::sync::Arc;
	use std::time::Instant;
	use tempfile::TempDir;

	async fn create_test_adapter() -> PlResult<(PolicyAdapterSqlite, TempDir)> {
		let tmp_dir = TempDir::new().unwrap();
		let worker = Arc::new(WorkerPool::new(1));
		let adapter = PolicyAdapterSqlite::new(worker, tmp_dir.path().join("policy.db")).await?;
		Ok((adapter, tmp_dir))
	}

	async fn create_user(
		adapter: &PolicyAdapterSqlite,
		username: &str,
		password: &str,
		locked: bool,
		flags: &[&str],
	) {
		adapter
			.create_user(NewUser { username, password, locked, flags })
			.await
			.expect("Failed to create user");
	}

	#[tokio::test]
	async fn test_login_ok_returns_flags() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		create_user(&adapter, "alice", "correct horse", false, &["mod", "host"]).await;

		let outcome = adapter.authenticate("alice", "correct horse").await.unwrap();
		let AuthOutcome::Ok { flags } = outcome else {
			panic!("expected Ok, got {:?}", outcome);
		};
		assert_eq!(flags.iter().map(AsRef::as_ref).collect::<Vec<&str>>(), ["mod", "host"]);
	}

	#[tokio::test]
	async fn test_login_bad_password() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		create_user(&adapter, "alice", "correct horse", false, &[]).await;

		assert_eq!(adapter.authenticate("alice", "battery staple").await.unwrap(), AuthOutcome::BadPassword);
		assert_eq!(adapter.authenticate("alice", "").await.unwrap(), AuthOutcome::BadPassword);
	}

	#[tokio::test]
	async fn test_locked_regardless_of_password() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		create_user(&adapter, "mallory", "pw", true, &["mod"]).await;

		assert_eq!(adapter.authenticate("mallory", "pw").await.unwrap(), AuthOutcome::Locked);
		assert_eq!(adapter.authenticate("mallory", "wrong").await.unwrap(), AuthOutcome::Locked);

		adapter.set_user_locked("mallory", false).await.unwrap();
		assert!(matches!(adapter.authenticate("mallory", "pw").await.unwrap(), AuthOutcome::Ok { .. }));
	}

	#[tokio::test]
	async fn test_unknown_user() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		assert_eq!(adapter.authenticate("nobody", "pw").await.unwrap(), AuthOutcome::NotFound);
		assert!(matches!(adapter.read_user("nobody").await, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn test_unknown_user_costs_a_hash() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		create_user(&adapter, "alice", "pw", false, &[]).await;

		// Warm up
		let _ = adapter.authenticate("alice", "nope").await;

		let start = Instant::now();
		adapter.authenticate("alice", "nope").await.unwrap();
		let wrong_password = start.elapsed();

		let start = Instant::now();
		adapter.authenticate("nobody", "nope").await.unwrap();
		let unknown = start.elapsed();

		// Both paths run one bcrypt verification; skipping it would be orders of magnitude faster
		assert!(
			unknown * 10 > wrong_password,
			"unknown={:?} wrong_password={:?}",
			unknown,
			wrong_password
		);
	}

	#[tokio::test]
	async fn test_password_is_stored_hashed() {
		let tmp_dir = TempDir::new().unwrap();
		let path = tmp_dir.path().join("policy.db");
		let adapter = PolicyAdapterSqlite::new(Arc::new(WorkerPool::new(1)), &path).await.unwrap();
		create_user(&adapter, "alice", "plain-secret", false, &[]).await;
		adapter.close().await;

		let db = sqlx::SqlitePool::connect(&format!("sqlite://{}", path.display())).await.unwrap();
		let stored: String = sqlx::query_scalar("SELECT password FROM users WHERE username = 'alice'")
			.fetch_one(&db)
			.await
			.unwrap();
		assert_ne!(stored, "plain-secret");
		assert!(stored.starts_with("$2"));
	}

	#[tokio::test]
	async fn test_user_admin() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		create_user(&adapter, "bob", "old", false, &["mod"]).await;

		let user = adapter.read_user("bob").await.unwrap();
		assert!(!user.locked);
		assert!(user.flags.iter().any(|flag| flag.as_ref() == "mod"));

		let dup = adapter
			.create_user(NewUser { username: "bob", password: "x", locked: false, flags: &[] })
			.await;
		assert!(matches!(dup, Err(Error::ValidationError(_))));

		adapter.set_user_password("bob", "new").await.unwrap();
		assert_eq!(adapter.authenticate("bob", "old").await.unwrap(), AuthOutcome::BadPassword);
		assert!(matches!(adapter.authenticate("bob", "new").await.unwrap(), AuthOutcome::Ok { .. }));

		assert!(matches!(adapter.set_user_locked("nobody", true).await, Err(Error::NotFound)));
		assert!(matches!(adapter.set_user_password("nobody", "x").await, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn test_invalid_flags_rejected() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let res = adapter
			.create_user(NewUser { username: "carol", password: "x", locked: false, flags: &["a,b"] })
			.await;
		assert!(matches!(res, Err(Error::ValidationError(_))));
		assert!(matches!(adapter.read_user("carol").await, Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn test_storage_fault_is_an_error() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		adapter.close().await;
		assert!(matches!(adapter.authenticate("alice", "pw").await, Err(Error::DbError)));
	}
}

// vim: ts=4
