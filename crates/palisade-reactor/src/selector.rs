//! Platform selector interface
//!
//! A selector owns the platform readiness handles. It is told which
//! descriptor to watch under which token, and reports ready tokens together
//! with the raw platform sub-conditions that fired. Every backend (epoll,
//! kqueue, poll tables, completion ports, or the in-memory mock) implements
//! this one trait, so the reactor's observable behavior does not depend on
//! the platform.

use std::io;
use std::time::Duration;

use crate::interest::PlatformEvents;

/// OS-level socket handle
#[cfg(unix)]
pub type Descriptor = std::os::fd::RawFd;
#[cfg(windows)]
pub type Descriptor = std::os::windows::io::RawSocket;

/// Opaque key a selector hands back with each readiness report.
///
/// Encodes a slot index and that slot's generation, so a report for a slot
/// that has since been released or reused can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token(pub usize);

pub trait Selector {
	/// Start watching `fd` for `events`, reporting under `token`
	fn attach(&mut self, fd: Descriptor, token: Token, events: PlatformEvents) -> io::Result<()>;

	/// Replace the watched events of an attached descriptor
	fn reattach(&mut self, fd: Descriptor, token: Token, events: PlatformEvents)
	-> io::Result<()>;

	/// Stop watching `fd` and release its platform handle
	fn detach(&mut self, fd: Descriptor) -> io::Result<()>;

	/// Block until something is ready or the timeout elapses (`None` waits
	/// forever). Ready reports are appended to `ready`; a timeout appends
	/// nothing and returns `Ok`.
	fn select(
		&mut self,
		timeout: Option<Duration>,
		ready: &mut Vec<(Token, PlatformEvents)>,
	) -> io::Result<()>;
}

impl<S: Selector + ?Sized> Selector for Box<S> {
	fn attach(&mut self, fd: Descriptor, token: Token, events: PlatformEvents) -> io::Result<()> {
		(**self).attach(fd, token, events)
	}

	fn reattach(
		&mut self,
		fd: Descriptor,
		token: Token,
		events: PlatformEvents,
	) -> io::Result<()> {
		(**self).reattach(fd, token, events)
	}

	fn detach(&mut self, fd: Descriptor) -> io::Result<()> {
		(**self).detach(fd)
	}

	fn select(
		&mut self,
		timeout: Option<Duration>,
		ready: &mut Vec<(Token, PlatformEvents)>,
	) -> io::Result<()> {
		(**self).select(timeout, ready)
	}
}

// vim: ts=4
