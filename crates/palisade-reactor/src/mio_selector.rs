//! `mio` backed selector (epoll on Linux, kqueue on the BSDs and macOS)

use std::io;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Poll};
use tracing::{debug, trace};

use crate::interest::PlatformEvents;
use crate::selector::{Descriptor, Selector, Token};

const DEFAULT_EVENT_CAPACITY: usize = 256;

pub struct MioSelector {
	poll: Poll,
	events: Events,
}

impl MioSelector {
	pub fn new() -> io::Result<Self> {
		Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
	}

	/// `capacity` bounds how many readiness reports one `select` can return
	pub fn with_event_capacity(capacity: usize) -> io::Result<Self> {
		Ok(MioSelector { poll: Poll::new()?, events: Events::with_capacity(capacity.max(1)) })
	}
}

impl std::fmt::Debug for MioSelector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MioSelector").field("event_capacity", &self.events.capacity()).finish()
	}
}

/// epoll and kqueue have no separate accept/connect conditions: a pending
/// accept is plain readability and a finished connect is writability.
fn to_mio_interest(events: PlatformEvents) -> mio::Interest {
	let readable = events.intersects(PlatformEvents::READ | PlatformEvents::ACCEPT);
	let writable = events.intersects(PlatformEvents::WRITE);
	match (readable, writable) {
		(true, true) => mio::Interest::READABLE | mio::Interest::WRITABLE,
		(false, true) => mio::Interest::WRITABLE,
		// Close and error are always reported; readable is the cheapest carrier
		_ => mio::Interest::READABLE,
	}
}

fn from_mio_event(event: &mio::event::Event) -> PlatformEvents {
	let mut events = PlatformEvents::NONE;
	if event.is_readable() {
		events |= PlatformEvents::READ;
	}
	if event.is_writable() {
		events |= PlatformEvents::WRITE;
	}
	if event.is_read_closed() || event.is_write_closed() {
		events |= PlatformEvents::CLOSE;
	}
	if event.is_error() {
		events |= PlatformEvents::ERROR;
	}
	events
}

impl Selector for MioSelector {
	fn attach(&mut self, fd: Descriptor, token: Token, events: PlatformEvents) -> io::Result<()> {
		debug!("attach fd={} token={:?} events={:?}", fd, token, events);
		self.poll.registry().register(&mut SourceFd(&fd), mio::Token(token.0), to_mio_interest(events))
	}

	fn reattach(
		&mut self,
		fd: Descriptor,
		token: Token,
		events: PlatformEvents,
	) -> io::Result<()> {
		debug!("reattach fd={} token={:?} events={:?}", fd, token, events);
		self.poll.registry().reregister(
			&mut SourceFd(&fd),
			mio::Token(token.0),
			to_mio_interest(events),
		)
	}

	fn detach(&mut self, fd: Descriptor) -> io::Result<()> {
		debug!("detach fd={}", fd);
		self.poll.registry().deregister(&mut SourceFd(&fd))
	}

	fn select(
		&mut self,
		timeout: Option<Duration>,
		ready: &mut Vec<(Token, PlatformEvents)>,
	) -> io::Result<()> {
		self.poll.poll(&mut self.events, timeout)?;
		for event in &self.events {
			let events = from_mio_event(event);
			trace!("ready token={:?} events={:?}", event.token(), events);
			if !events.is_empty() {
				ready.push((Token(event.token().0), events));
			}
		}
		Ok(())
	}
}


// vim: ts=4
