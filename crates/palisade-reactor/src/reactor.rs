//! Reactor: registration table plus one platform selector

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::error::ReactorError;
use crate::interest::{ConditionSet, Interest, PlatformEvents};
use crate::selector::{Descriptor, Selector, Token};
use crate::slot::SlotTable;

/// Upper bound on the pause between retries of a transient wait failure
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(5);

/// Resource exhaustion and busy conditions clear up on their own; anything
/// else (bad handle, bad parameter) is a programming error.
fn is_transient(err: &io::Error) -> bool {
	matches!(
		err.kind(),
		io::ErrorKind::Interrupted
			| io::ErrorKind::WouldBlock
			| io::ErrorKind::OutOfMemory
			| io::ErrorKind::ResourceBusy
			| io::ErrorKind::NetworkDown
	)
}

pub struct Reactor<S: Selector> {
	selector: S,
	slots: SlotTable,
	ready: VecDeque<(Token, PlatformEvents)>,
	scratch: Vec<(Token, PlatformEvents)>,
}

impl<S: Selector> Reactor<S> {
	pub fn new(selector: S, capacity: usize) -> Self {
		let slots = SlotTable::new(capacity);
		debug!("reactor created with {} slots", slots.capacity());
		Reactor { selector, slots, ready: VecDeque::new(), scratch: Vec::new() }
	}

	pub fn capacity(&self) -> usize {
		self.slots.capacity()
	}

	/// Number of registered descriptors
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	pub fn is_registered(&self, fd: Descriptor) -> bool {
		self.slots.lookup(fd).is_some()
	}

	pub fn interest(&self, fd: Descriptor) -> Option<Interest> {
		let id = self.slots.lookup(fd)?;
		self.slots.resolve(id.token()).map(|r| r.interest)
	}

	pub fn selector(&self) -> &S {
		&self.selector
	}

	/// Start watching `fd`. Fails if the table is full or `fd` already has a slot.
	pub fn register(&mut self, fd: Descriptor, interest: Interest) -> Result<(), ReactorError> {
		let id = self.slots.insert(fd, interest)?;
		if let Err(err) = self.selector.attach(fd, id.token(), interest.expand()) {
			warn!("register fd={} failed: {}", fd, err);
			// Give the slot back; the descriptor never became watched
			let _ = self.slots.remove(fd);
			return Err(ReactorError::Platform(err));
		}
		debug!("registered fd={} interest={:?} slot={}", fd, interest, id.index());
		Ok(())
	}

	/// Replace the interest of a registered descriptor, keeping its slot
	pub fn modify(&mut self, fd: Descriptor, interest: Interest) -> Result<(), ReactorError> {
		let id = self.slots.lookup(fd).ok_or(ReactorError::NotRegistered)?;
		self.selector.reattach(fd, id.token(), interest.expand()).map_err(|err| {
			warn!("modify fd={} failed: {}", fd, err);
			ReactorError::Platform(err)
		})?;
		if let Some(reg) = self.slots.get_mut(fd) {
			reg.interest = interest;
		}
		Ok(())
	}

	/// Stop watching `fd` and free its slot
	pub fn deregister(&mut self, fd: Descriptor) -> Result<(), ReactorError> {
		let (id, _) = self.slots.remove(fd)?;
		if let Err(err) = self.selector.detach(fd) {
			// The descriptor may already be closed; the slot is released either way
			warn!("detach fd={} failed: {}", fd, err);
		}
		let token = id.token();
		self.ready.retain(|(t, _)| *t != token);
		debug!("deregistered fd={} slot={}", fd, id.index());
		Ok(())
	}

	/// Block until something is ready or `timeout` elapses (`None` waits forever).
	///
	/// Returns the number of ready descriptors, 0 on timeout. Transient
	/// platform failures are retried within the remaining time budget; any
	/// other failure is returned as `WaitFailed`. Readiness left undrained from
	/// the previous batch is discarded.
	pub fn wait(&mut self, timeout: Option<Duration>) -> Result<usize, ReactorError> {
		self.ready.clear();
		self.scratch.clear();
		let deadline = timeout.map(|t| Instant::now() + t);

		loop {
			let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
			match self.selector.select(remaining, &mut self.scratch) {
				Ok(()) => break,
				Err(err) if is_transient(&err) => {
					self.scratch.clear();
					if remaining.is_some_and(|r| r.is_zero()) {
						debug!("wait: transient failure at deadline: {}", err);
						return Ok(0);
					}
					debug!("wait: retrying after transient failure: {}", err);
					if err.kind() != io::ErrorKind::Interrupted {
						let pause = remaining.map_or(TRANSIENT_BACKOFF, |r| r.min(TRANSIENT_BACKOFF));
						std::thread::sleep(pause);
					}
				}
				Err(err) => {
					error!("wait failed: {} (os error {:?})", err, err.raw_os_error());
					return Err(ReactorError::WaitFailed(err));
				}
			}
		}

		for (token, events) in self.scratch.drain(..) {
			// Reports for released or reused slots are dropped
			if self.slots.resolve(token).is_some() && !events.is_empty() {
				match self.ready.iter_mut().find(|(t, _)| *t == token) {
					Some((_, merged)) => *merged |= events,
					None => self.ready.push_back((token, events)),
				}
			}
		}
		Ok(self.ready.len())
	}

	/// Take the next ready descriptor from the current batch
	pub fn next_ready(&mut self) -> Option<(Descriptor, ConditionSet)> {
		while let Some((token, events)) = self.ready.pop_front() {
			if let Some(reg) = self.slots.resolve(token) {
				return Some((reg.descriptor, events.normalize()));
			}
		}
		None
	}

	/// Conditions pending for `fd` in the current batch.
	///
	/// Empty when nothing is pending or `fd` is not registered (readiness may
	/// race with deregistration).
	pub fn readiness(&self, fd: Descriptor) -> ConditionSet {
		let Some(id) = self.slots.lookup(fd) else {
			return ConditionSet::NONE;
		};
		let token = id.token();
		self.ready
			.iter()
			.filter(|(t, _)| *t == token)
			.fold(ConditionSet::NONE, |acc, (_, events)| acc | events.normalize())
	}
}

impl<S: Selector> std::fmt::Debug for Reactor<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Reactor")
			.field("registered", &self.slots.len())
			.field("capacity", &self.slots.capacity())
			.field("pending", &self.ready.len())
			.finish_non_exhaustive()
	}
}


// vim: ts=4
