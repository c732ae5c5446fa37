//! Palisade session server
//!
//! Configuration comes from `PALISADE_*` environment variables; logging is
//! filtered through `RUST_LOG`. Without a protocol layer attached, admitted
//! connections are read and discarded until the peer hangs up.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use palisade::prelude::*;
use palisade::reactor::Selector;
use palisade::{ServerBuilder, ServerEvent, ServerOpts, SessionServer};
use palisade_policy_adapter_sqlite::PolicyAdapterSqlite;

const READ_BUF_SIZE: usize = 4096;

/// Read a connection until it would block; close it on EOF or error
fn drain_connection<S: Selector>(server: &mut SessionServer<S>, event: ServerEvent) -> PlResult<()> {
	match event {
		ServerEvent::Accepted { fd, peer } => debug!("fd {}: connected from {}", fd, peer),
		ServerEvent::Rejected { peer, reason } => debug!("rejected {}: {:?}", peer, reason),
		ServerEvent::Closed { fd, peer } => debug!("fd {}: {} dropped", fd, peer),
		ServerEvent::Ready { fd, conditions } => {
			if !conditions.is_readable() {
				return Ok(());
			}
			let Some(conn) = server.connection_mut(fd) else {
				return Ok(());
			};
			let mut buf = [0u8; READ_BUF_SIZE];
			loop {
				match conn.stream_mut().read(&mut buf) {
					Ok(0) => {
						server.close(fd);
						break;
					}
					Ok(n) => debug!("fd {}: discarded {} bytes", fd, n),
					Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
					Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
					Err(err) => {
						debug!("fd {}: read failed: {}", fd, err);
						server.close(fd);
						break;
					}
				}
			}
		}
	}
	Ok(())
}

#[tokio::main]
async fn main() -> PlResult<()> {
	palisade::app::init_tracing();

	let opts = ServerOpts::from_env().inspect_err(|err| error!("FATAL: {}", err))?;
	let mut builder = ServerBuilder::with_opts(opts.clone());
	let worker = builder.worker_pool();

	let store = PolicyAdapterSqlite::new(worker, &opts.db_path).await?;
	builder.policy_adapter(Arc::new(store));

	let stop = Arc::new(AtomicBool::new(false));
	{
		let stop = stop.clone();
		tokio::spawn(async move {
			if let Err(err) = tokio::signal::ctrl_c().await {
				error!("Unable to listen for shutdown signal: {}", err);
				return;
			}
			info!("Shutting down");
			stop.store(true, Ordering::Relaxed);
		});
	}

	builder.run(stop, drain_connection).await
}

// vim: ts=4
