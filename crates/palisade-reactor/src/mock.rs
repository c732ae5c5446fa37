//! In-memory selector for exercising the reactor without sockets.
//!
//! Tests fire raw platform sub-conditions (accept, connect, close) and
//! inject wait failures through a [`MockHandle`] shared with the selector.
//! `select` never sleeps: with nothing queued it behaves like an elapsed
//! timeout.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::interest::PlatformEvents;
use crate::selector::{Descriptor, Selector, Token};

#[derive(Debug, Default)]
struct MockState {
	attached: HashMap<Descriptor, (Token, PlatformEvents)>,
	fired: VecDeque<(Descriptor, PlatformEvents)>,
	failures: VecDeque<io::Error>,
	attach_failures: VecDeque<io::Error>,
	select_calls: usize,
	last_timeout: Option<Option<Duration>>,
}

#[derive(Debug, Default)]
pub struct MockSelector {
	state: Arc<Mutex<MockState>>,
}

/// Test-side view of a [`MockSelector`]
#[derive(Debug, Clone)]
pub struct MockHandle {
	state: Arc<Mutex<MockState>>,
}

impl MockSelector {
	pub fn new() -> (Self, MockHandle) {
		let state = Arc::new(Mutex::new(MockState::default()));
		(MockSelector { state: state.clone() }, MockHandle { state })
	}
}

impl MockHandle {
	/// Queue raw sub-conditions on a descriptor for the next `select`
	pub fn fire(&self, fd: Descriptor, events: PlatformEvents) {
		self.state.lock().fired.push_back((fd, events));
	}

	/// Make the next `select` call fail with `err`
	pub fn fail_next_select(&self, err: io::Error) {
		self.state.lock().failures.push_back(err);
	}

	/// Make the next `attach` or `reattach` call fail with `err`
	pub fn fail_next_attach(&self, err: io::Error) {
		self.state.lock().attach_failures.push_back(err);
	}

	pub fn is_attached(&self, fd: Descriptor) -> bool {
		self.state.lock().attached.contains_key(&fd)
	}

	/// Platform events currently watched for `fd`
	pub fn watched(&self, fd: Descriptor) -> Option<PlatformEvents> {
		self.state.lock().attached.get(&fd).map(|(_, events)| *events)
	}

	pub fn attached_count(&self) -> usize {
		self.state.lock().attached.len()
	}

	pub fn select_calls(&self) -> usize {
		self.state.lock().select_calls
	}

	/// Timeout passed to the most recent `select`
	pub fn last_timeout(&self) -> Option<Option<Duration>> {
		self.state.lock().last_timeout
	}
}

impl Selector for MockSelector {
	fn attach(&mut self, fd: Descriptor, token: Token, events: PlatformEvents) -> io::Result<()> {
		let mut state = self.state.lock();
		if let Some(err) = state.attach_failures.pop_front() {
			return Err(err);
		}
		if state.attached.contains_key(&fd) {
			return Err(io::Error::new(io::ErrorKind::AlreadyExists, "descriptor already attached"));
		}
		state.attached.insert(fd, (token, events));
		Ok(())
	}

	fn reattach(
		&mut self,
		fd: Descriptor,
		token: Token,
		events: PlatformEvents,
	) -> io::Result<()> {
		let mut state = self.state.lock();
		if let Some(err) = state.attach_failures.pop_front() {
			return Err(err);
		}
		match state.attached.get_mut(&fd) {
			Some(entry) => {
				*entry = (token, events);
				Ok(())
			}
			None => Err(io::Error::new(io::ErrorKind::NotFound, "descriptor not attached")),
		}
	}

	fn detach(&mut self, fd: Descriptor) -> io::Result<()> {
		let mut state = self.state.lock();
		state.fired.retain(|(f, _)| *f != fd);
		match state.attached.remove(&fd) {
			Some(_) => Ok(()),
			None => Err(io::Error::new(io::ErrorKind::NotFound, "descriptor not attached")),
		}
	}

	fn select(
		&mut self,
		timeout: Option<Duration>,
		ready: &mut Vec<(Token, PlatformEvents)>,
	) -> io::Result<()> {
		let mut state = self.state.lock();
		state.select_calls += 1;
		state.last_timeout = Some(timeout);
		if let Some(err) = state.failures.pop_front() {
			return Err(err);
		}

		let fired: Vec<_> = state.fired.drain(..).collect();
		for (fd, events) in fired {
			let Some((token, watched)) = state.attached.get(&fd).copied() else {
				continue;
			};
			// Close and error are reported whether or not they were asked for
			let delivered =
				events.intersection(watched | PlatformEvents::CLOSE | PlatformEvents::ERROR);
			if !delivered.is_empty() {
				ready.push((token, delivered));
			}
		}
		Ok(())
	}
}

// vim: ts=4
