//! Worker pool for blocking work (password hashing).
//!
//! Jobs are queued on a `flume` channel and picked up by dedicated threads,
//! so bcrypt never stalls a runtime worker.

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use std::thread;

use crate::prelude::*;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Debug)]
pub struct WorkerPool {
	queue: Sender<Job>,
}

impl WorkerPool {
	/// Start `n_threads` workers (at least one)
	pub fn new(n_threads: usize) -> Self {
		let (queue, rx) = flume::unbounded();

		for i in 0..n_threads.max(1) {
			spawn_worker(format!("palisade-worker-{}", i), rx.clone());
		}

		Self { queue }
	}

	/// Submit a closure → returns a Future for the result
	pub fn run_immed<F, T>(&self, f: F) -> impl Future<Output = PlResult<T>> + use<F, T>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (res_tx, res_rx) = oneshot::channel();

		let job: Job = Box::new(move || {
			let result = f();
			let _ignore = res_tx.send(result);
		});

		if self.queue.send(job).is_err() {
			error!("Failed to send job to worker queue");
		}

		async move {
			res_rx.await.map_err(|_| {
				error!("Worker dropped result channel (task may have panicked)");
				Error::Internal("worker task failed".into())
			})
		}
	}

	/// Like `run_immed`, but flattens `PlResult<PlResult<T>>` into `PlResult<T>`.
	pub fn try_run_immed<F, T>(&self, f: F) -> impl Future<Output = PlResult<T>> + use<F, T>
	where
		F: FnOnce() -> PlResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let fut = self.run_immed(f);
		async move { fut.await? }
	}
}

impl Default for WorkerPool {
	fn default() -> Self {
		Self::new(1)
	}
}

fn spawn_worker(name: String, rx: Receiver<Job>) {
	let res = thread::Builder::new().name(name).spawn(move || {
		// Ends once every sender is gone: the pool was dropped
		while let Ok(job) = rx.recv() {
			run_job(job);
		}
	});
	if let Err(err) = res {
		error!("Failed to spawn worker thread: {}", err);
	}
}

fn run_job(job: Job) {
	if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
		error!("Worker thread caught panic: {:?}", e);
	}
}


// vim: ts=4
