//! IP Ban Tests
//!
//! 1. Subnet matching for IPv4 and IPv6
//! 2. Subnet 0 as an exact-address ban
//! 3. Expiration
//! 4. Idempotent inserts
//! 5. Deletion and purging
//! 6. Storage faults deny
//! 7. Far-future expirations
//! 8. Unreadable rows

#[cfg(test)]
mod tests {
	use palisade_policy_adapter_sqlite::PolicyAdapterSqlite;
	use palisade_types::policy_adapter::{NewBan, PolicyAdapter};
	use palisade_types::prelude::*;
	use palisade_types::worker::WorkerPool;
	use std::net::IpAddr;
	use std::sync::Arc;
	use tempfile::TempDir;

	const DAY: i64 = 86400;

	async fn create_test_adapter() -> PlResult<(PolicyAdapterSqlite, TempDir)> {
		let tmp_dir = TempDir::new().unwrap();
		let worker = Arc::new(WorkerPool::new(1));
		let adapter = PolicyAdapterSqlite::new(worker, tmp_dir.path().join("policy.db")).await?;
		Ok((adapter, tmp_dir))
	}

	fn ip(s: &str) -> IpAddr {
		s.parse().unwrap()
	}

	fn new_ban<'a>(addr: &str, subnet: u8, expires: Timestamp, comment: &'a str) -> NewBan<'a> {
		NewBan { ip: ip(addr), subnet, expires, comment }
	}

	#[tokio::test]
	async fn test_subnet_ban_matches_neighbours() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		adapter
			.add_ban(new_ban("203.0.113.5", 24, now.add_seconds(365 * DAY), "spam"), now)
			.await
			.expect("Failed to add ban");

		assert!(adapter.is_ip_banned(&ip("203.0.113.9"), now).await);
		assert!(adapter.is_ip_banned(&ip("203.0.113.5"), now).await);
		assert!(!adapter.is_ip_banned(&ip("203.0.114.1"), now).await);
		// IPv4-mapped form of a banned address
		assert!(adapter.is_ip_banned(&ip("::ffff:203.0.113.200"), now).await);
	}

	#[tokio::test]
	async fn test_ipv6_ban() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		adapter
			.add_ban(new_ban("2001:db8:1::", 48, now.add_seconds(DAY), ""), now)
			.await
			.expect("Failed to add ban");

		assert!(adapter.is_ip_banned(&ip("2001:db8:1:ffff::1"), now).await);
		assert!(!adapter.is_ip_banned(&ip("2001:db8:2::1"), now).await);
		assert!(!adapter.is_ip_banned(&ip("203.0.113.5"), now).await);
	}

	#[tokio::test]
	async fn test_subnet_zero_is_exact_match() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		adapter
			.add_ban(new_ban("198.51.100.7", 0, now.add_seconds(DAY), ""), now)
			.await
			.expect("Failed to add ban");

		assert!(adapter.is_ip_banned(&ip("198.51.100.7"), now).await);
		assert!(!adapter.is_ip_banned(&ip("198.51.100.8"), now).await);
		assert!(!adapter.is_ip_banned(&ip("10.0.0.1"), now).await);
	}

	#[tokio::test]
	async fn test_expired_ban_never_matches() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		adapter
			.add_ban(new_ban("192.0.2.1", 32, now.add_seconds(-60), "old"), now.add_seconds(-DAY))
			.await
			.expect("Failed to add ban");

		assert!(!adapter.is_ip_banned(&ip("192.0.2.1"), now).await);

		// Expiry is exclusive
		let expires = now.add_seconds(60);
		adapter
			.add_ban(new_ban("192.0.2.2", 32, expires, ""), now)
			.await
			.expect("Failed to add ban");
		assert!(adapter.is_ip_banned(&ip("192.0.2.2"), now).await);
		assert!(!adapter.is_ip_banned(&ip("192.0.2.2"), expires).await);
	}

	#[tokio::test]
	async fn test_far_future_ban_stays_active() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		// Year 10001
		adapter
			.add_ban(new_ban("192.0.2.50", 32, Timestamp(253_434_000_000), "forever"), now)
			.await
			.expect("Failed to add ban");
		adapter
			.add_ban(new_ban("192.0.2.51", 32, now.add_seconds(i64::MAX), ""), now)
			.await
			.expect("Failed to add ban");

		assert!(adapter.is_ip_banned(&ip("192.0.2.50"), now).await);
		assert!(adapter.is_ip_banned(&ip("192.0.2.51"), now).await);
		assert_eq!(adapter.purge_expired_bans(now).await.unwrap(), 0);

		let bans = adapter.list_bans().await.unwrap();
		assert_eq!(bans.len(), 2);
		assert!(bans.iter().all(|ban| ban.expires == Timestamp(253_402_300_799)));
	}

	#[tokio::test]
	async fn test_unreadable_ban_rows_are_skipped() {
		let tmp_dir = TempDir::new().unwrap();
		let path = tmp_dir.path().join("policy.db");
		let worker = Arc::new(WorkerPool::new(1));
		let now = Timestamp::now();

		// Rows written by another tool: a bad address and a bad expiration
		{
			let adapter = PolicyAdapterSqlite::new(worker.clone(), &path).await.unwrap();
			adapter.close().await;
			let db = sqlx::SqlitePool::connect(&format!("sqlite://{}", path.display())).await.unwrap();
			sqlx::query(
				"INSERT INTO ipbans (ip, subnet, expires, comment, added) VALUES \
				('not-an-ip', 24, '2999-01-01 00:00:00', 'bad ip', '2020-01-01 00:00:00'), \
				('203.0.113.9', 32, 'someday', 'bad expiry', '2020-01-01 00:00:00')",
			)
			.execute(&db)
			.await
			.unwrap();
			db.close().await;
		}

		let adapter = PolicyAdapterSqlite::new(worker, &path).await.unwrap();
		let good = adapter
			.add_ban(new_ban("198.51.100.1", 32, now.add_seconds(DAY), "good"), now)
			.await
			.expect("Failed to add ban");

		let bans = adapter.list_bans().await.expect("Listing should skip unreadable rows");
		assert_eq!(bans.len(), 1);
		assert_eq!(bans[0].id, good.id);
		assert!(adapter.is_ip_banned(&ip("198.51.100.1"), now).await);

		// Re-banning the address of an unreadable row replaces it
		let fixed = adapter
			.add_ban(new_ban("203.0.113.9", 32, now.add_seconds(DAY), "fixed"), now)
			.await
			.expect("Unreadable duplicate should not block a new ban");
		assert_eq!(fixed.comment.as_ref(), "fixed");
		let bans = adapter.list_bans().await.unwrap();
		assert_eq!(bans.len(), 2);
		assert!(bans.iter().any(|ban| ban.id == fixed.id && ban.comment.as_ref() == "fixed"));

		assert!(adapter.delete_ban(good.id).await.unwrap());
		assert!(!adapter.is_ip_banned(&ip("198.51.100.1"), now).await);
		assert_eq!(adapter.list_bans().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_add_ban_is_idempotent() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		let first = adapter
			.add_ban(new_ban("203.0.113.5", 24, now.add_seconds(DAY), "first"), now)
			.await
			.expect("Failed to add ban");
		let second = adapter
			.add_ban(new_ban("203.0.113.5", 24, now.add_seconds(7 * DAY), "second"), now)
			.await
			.expect("Failed to add ban");

		assert_eq!(first, second, "existing entry should be returned unchanged");
		assert_eq!(second.comment.as_ref(), "first");

		let bans = adapter.list_bans().await.expect("Failed to list bans");
		assert_eq!(bans.len(), 1);
		assert_eq!(bans[0].id, first.id);
		assert_eq!(bans[0].added, now);
	}

	#[tokio::test]
	async fn test_add_ban_rejects_oversized_subnet() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		let res = adapter.add_ban(new_ban("203.0.113.5", 33, now.add_seconds(DAY), ""), now).await;
		assert!(matches!(res, Err(Error::ValidationError(_))));
		assert!(adapter.list_bans().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_delete_and_purge() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		let now = Timestamp::now();

		let live = adapter
			.add_ban(new_ban("203.0.113.1", 32, now.add_seconds(DAY), ""), now)
			.await
			.unwrap();
		adapter.add_ban(new_ban("203.0.113.2", 32, now.add_seconds(-1), ""), now).await.unwrap();
		adapter.add_ban(new_ban("203.0.113.3", 32, now, ""), now).await.unwrap();

		assert_eq!(adapter.purge_expired_bans(now).await.unwrap(), 2);
		let bans = adapter.list_bans().await.unwrap();
		assert_eq!(bans.len(), 1);
		assert_eq!(bans[0].id, live.id);

		assert!(adapter.delete_ban(live.id).await.unwrap());
		assert!(!adapter.delete_ban(live.id).await.unwrap());
		assert!(!adapter.is_ip_banned(&ip("203.0.113.1"), now).await);
	}

	#[tokio::test]
	async fn test_storage_fault_denies() {
		let (adapter, _tmp) = create_test_adapter().await.expect("Failed to create adapter");
		adapter.close().await;

		assert!(adapter.is_ip_banned(&ip("192.0.2.1"), Timestamp::now()).await);
		assert!(matches!(adapter.list_bans().await, Err(Error::DbError)));
	}

	#[tokio::test]
	async fn test_bans_survive_reopen() {
		let tmp_dir = TempDir::new().unwrap();
		let path = tmp_dir.path().join("nested").join("policy.db");
		let worker = Arc::new(WorkerPool::new(1));
		let now = Timestamp::now();

		{
			let adapter = PolicyAdapterSqlite::new(worker.clone(), &path).await.unwrap();
			adapter
				.add_ban(new_ban("203.0.113.5", 24, now.add_seconds(DAY), "kept"), now)
				.await
				.unwrap();
			adapter.close().await;
		}

		let adapter = PolicyAdapterSqlite::new(worker, &path).await.expect("Reopen failed");
		assert!(adapter.is_ip_banned(&ip("203.0.113.77"), now).await);
		assert_eq!(adapter.list_bans().await.unwrap()[0].comment.as_ref(), "kept");
	}
}

// vim: ts=4
