//! App builder - configures and runs a session server

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::gate::AdmissionGate;
use crate::policy_adapter::PolicyAdapter;
use crate::prelude::*;
use crate::server::{ServerEvent, SessionServer};
use crate::worker::WorkerPool;

#[cfg(unix)]
use crate::reactor::MioSelector;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-level options. Runtime policy lives in the store's settings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOpts {
	pub listen: Box<str>,
	pub db_path: PathBuf,
	pub max_connections: usize,
	pub wait_timeout: Duration,
	pub workers: usize,
	/// How often expired bans are deleted; `None` keeps them
	pub ban_purge_interval: Option<Duration>,
}

impl Default for ServerOpts {
	fn default() -> Self {
		Self {
			listen: "0.0.0.0:27750".into(),
			db_path: PathBuf::from("./data/palisade.db"),
			max_connections: 1024,
			wait_timeout: Duration::from_millis(500),
			workers: 2,
			ban_purge_interval: Some(Duration::from_secs(3600)),
		}
	}
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> PlResult<T> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::ConfigError(format!("{}: invalid value {:?}", name, value)))
}

impl ServerOpts {
	/// Read `PALISADE_*` environment variables over the defaults
	pub fn from_env() -> PlResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> PlResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut opts = Self::default();
		if let Some(listen) = lookup("PALISADE_LISTEN") {
			if listen.trim().is_empty() {
				return Err(Error::ConfigError("PALISADE_LISTEN: empty address".into()));
			}
			opts.listen = listen.trim().into();
		}
		if let Some(db) = lookup("PALISADE_DB") {
			opts.db_path = PathBuf::from(db);
		}
		if let Some(value) = lookup("PALISADE_MAX_CONNECTIONS") {
			opts.max_connections = parse_var("PALISADE_MAX_CONNECTIONS", &value)?;
			if opts.max_connections == 0 {
				return Err(Error::ConfigError("PALISADE_MAX_CONNECTIONS: must be at least 1".into()));
			}
		}
		if let Some(value) = lookup("PALISADE_WAIT_MS") {
			opts.wait_timeout = Duration::from_millis(parse_var("PALISADE_WAIT_MS", &value)?);
		}
		if let Some(value) = lookup("PALISADE_WORKERS") {
			opts.workers = parse_var("PALISADE_WORKERS", &value)?;
			if opts.workers == 0 {
				return Err(Error::ConfigError("PALISADE_WORKERS: must be at least 1".into()));
			}
		}
		if let Some(value) = lookup("PALISADE_BAN_PURGE_SECS") {
			let secs: u64 = parse_var("PALISADE_BAN_PURGE_SECS", &value)?;
			opts.ban_purge_interval = (secs > 0).then(|| Duration::from_secs(secs));
		}
		Ok(opts)
	}
}

/// Install the `fmt` subscriber with a `RUST_LOG` filter. Later calls are no-ops.
pub fn init_tracing() {
	let _ignore = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.try_init();
}

pub struct ServerBuilder {
	opts: ServerOpts,
	worker: Option<Arc<WorkerPool>>,
	policy_adapter: Option<Arc<dyn PolicyAdapter>>,
}

impl ServerBuilder {
	pub fn new() -> Self {
		init_tracing();
		Self::with_opts(ServerOpts::default())
	}

	pub fn with_opts(opts: ServerOpts) -> Self {
		ServerBuilder { opts, worker: None, policy_adapter: None }
	}

	// Opts
	pub fn listen(&mut self, listen: impl Into<Box<str>>) -> &mut Self {
		self.opts.listen = listen.into();
		self
	}

	pub fn max_connections(&mut self, max_connections: usize) -> &mut Self {
		self.opts.max_connections = max_connections;
		self
	}

	pub fn wait_timeout(&mut self, wait_timeout: Duration) -> &mut Self {
		self.opts.wait_timeout = wait_timeout;
		self
	}

	pub fn ban_purge_interval(&mut self, interval: Option<Duration>) -> &mut Self {
		self.opts.ban_purge_interval = interval;
		self
	}

	pub fn opts(&self) -> &ServerOpts {
		&self.opts
	}

	// Adapters
	pub fn worker(&mut self, worker: Arc<WorkerPool>) -> &mut Self {
		self.worker = Some(worker);
		self
	}

	pub fn policy_adapter(&mut self, policy_adapter: Arc<dyn PolicyAdapter>) -> &mut Self {
		self.policy_adapter = Some(policy_adapter);
		self
	}

	/// The configured worker pool, creating one of `opts.workers` threads if unset
	pub fn worker_pool(&mut self) -> Arc<WorkerPool> {
		let workers = self.opts.workers;
		self.worker.get_or_insert_with(|| Arc::new(WorkerPool::new(workers))).clone()
	}

	fn gate(&self, rt: Handle) -> PlResult<AdmissionGate> {
		let Some(policy_adapter) = self.policy_adapter.clone() else {
			error!("FATAL: No policy adapter configured");
			return Err(Error::Internal("No policy adapter configured".to_string()));
		};
		Ok(AdmissionGate::new(policy_adapter, rt))
	}

	/// Bind the listener and build the server context without running it
	#[cfg(unix)]
	pub fn build(&self, rt: Handle) -> PlResult<SessionServer<MioSelector>> {
		let gate = self.gate(rt)?;
		SessionServer::bind(&self.opts.listen, gate, self.opts.max_connections)
	}

	/// Serve until `stop` is set.
	///
	/// The reactor loop runs on a blocking thread; store queries it issues are
	/// driven by the current runtime.
	#[cfg(unix)]
	pub async fn run<H>(self, stop: Arc<AtomicBool>, handler: H) -> PlResult<()>
	where
		H: FnMut(&mut SessionServer<MioSelector>, ServerEvent) -> PlResult<()> + Send + 'static,
	{
		info!("Palisade V{}", VERSION);

		let mut server = self.build(Handle::current())?;
		let purge = self
			.opts
			.ban_purge_interval
			.map(|interval| tokio::spawn(purge_bans(server.gate().store().clone(), interval, stop.clone())));

		let wait_timeout = self.opts.wait_timeout;
		let loop_stop = stop.clone();
		let res = tokio::task::spawn_blocking(move || server.serve(&loop_stop, wait_timeout, handler))
			.await
			.map_err(|err| Error::Internal(format!("server loop panicked: {}", err)));

		stop.store(true, Ordering::Relaxed);
		if let Some(purge) = purge {
			purge.abort();
		}
		res?
	}
}

impl Default for ServerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Periodically delete expired bans
async fn purge_bans(store: Arc<dyn PolicyAdapter>, interval: Duration, stop: Arc<AtomicBool>) {
	let mut ticker = tokio::time::interval(interval);
	while !stop.load(Ordering::Relaxed) {
		ticker.tick().await;
		match store.purge_expired_bans(Timestamp::now()).await {
			Ok(0) => {}
			Ok(n) => info!("Purged {} expired bans", n),
			Err(err) => warn!("Ban purge failed: {}", err),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> =
			vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
		move |name| vars.get(name).cloned()
	}

	#[test]
	fn test_defaults_without_env() {
		let opts = ServerOpts::from_lookup(lookup(&[])).unwrap();
		assert_eq!(opts, ServerOpts::default());
	}

	#[test]
	fn test_env_overrides() {
		let opts = ServerOpts::from_lookup(lookup(&[
			("PALISADE_LISTEN", "127.0.0.1:9000"),
			("PALISADE_DB", "/var/lib/palisade/policy.db"),
			("PALISADE_MAX_CONNECTIONS", "16"),
			("PALISADE_WAIT_MS", "250"),
			("PALISADE_WORKERS", "4"),
			("PALISADE_BAN_PURGE_SECS", "0"),
		]))
		.unwrap();
		assert_eq!(opts.listen.as_ref(), "127.0.0.1:9000");
		assert_eq!(opts.db_path, PathBuf::from("/var/lib/palisade/policy.db"));
		assert_eq!(opts.max_connections, 16);
		assert_eq!(opts.wait_timeout, Duration::from_millis(250));
		assert_eq!(opts.workers, 4);
		assert_eq!(opts.ban_purge_interval, None);
	}

	#[test]
	fn test_invalid_values_are_config_errors() {
		for (name, value) in [
			("PALISADE_MAX_CONNECTIONS", "lots"),
			("PALISADE_MAX_CONNECTIONS", "0"),
			("PALISADE_WAIT_MS", "-5"),
			("PALISADE_WORKERS", "0"),
			("PALISADE_LISTEN", "  "),
		] {
			let res = ServerOpts::from_lookup(lookup(&[(name, value)]));
			assert!(matches!(res, Err(Error::ConfigError(_))), "{}={:?} should be rejected", name, value);
		}
	}

	#[test]
	fn test_build_requires_policy_adapter() {
		let rt = tokio::runtime::Runtime::new().unwrap();
		let builder = ServerBuilder::with_opts(ServerOpts::default());
		assert!(matches!(builder.gate(rt.handle().clone()), Err(Error::Internal(_))));
	}
}

// vim: ts=4
