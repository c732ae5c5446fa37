//! Session server context: one listener, the reactor, the admission gate, and
//! the accepted connections.
//!
//! The context is built explicitly and owned by the thread that drives it;
//! there is no process-wide instance. Each [`SessionServer::poll_events`] call
//! runs one reactor iteration and turns readiness into [`ServerEvent`]s for
//! the protocol layer. The mio backend is edge-triggered, so handlers must
//! drain a readable connection until it would block.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::gate::{Admission, AdmissionGate};
use crate::prelude::*;
use crate::reactor::{ConditionSet, Descriptor, Interest, Reactor, ReactorError, Selector};

#[cfg(unix)]
use crate::reactor::MioSelector;

#[cfg(unix)]
fn descriptor_of<T: std::os::fd::AsRawFd>(socket: &T) -> Descriptor {
	socket.as_raw_fd()
}

#[cfg(windows)]
fn descriptor_of<T: std::os::windows::io::AsRawSocket>(socket: &T) -> Descriptor {
	socket.as_raw_socket()
}

fn map_reactor_err(err: ReactorError) -> Error {
	match err {
		ReactorError::NotRegistered => Error::NotFound,
		err => Error::Io(err.into()),
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
	Banned,
	/// Every connection slot is taken
	Full,
	/// The connection could not be registered with the reactor
	Failed,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ServerEvent {
	Accepted { fd: Descriptor, peer: SocketAddr },
	Rejected { peer: SocketAddr, reason: RejectReason },
	Ready { fd: Descriptor, conditions: ConditionSet },
	/// Closed by the server after a socket error
	Closed { fd: Descriptor, peer: SocketAddr },
}

#[derive(Debug)]
pub struct Connection {
	stream: TcpStream,
	peer: SocketAddr,
}

impl Connection {
	pub fn stream(&self) -> &TcpStream {
		&self.stream
	}

	pub fn stream_mut(&mut self) -> &mut TcpStream {
		&mut self.stream
	}

	pub fn peer(&self) -> SocketAddr {
		self.peer
	}
}

#[derive(Debug)]
pub struct SessionServer<S: Selector> {
	reactor: Reactor<S>,
	listener: TcpListener,
	listener_fd: Descriptor,
	gate: AdmissionGate,
	connections: HashMap<Descriptor, Connection>,
}

#[cfg(unix)]
impl SessionServer<MioSelector> {
	/// Bind `addr` and serve at most `max_connections` peers at a time
	pub fn bind(addr: &str, gate: AdmissionGate, max_connections: usize) -> PlResult<Self> {
		let listener = TcpListener::bind(addr).inspect_err(|err| error!("Unable to bind {}: {}", addr, err))?;
		Self::with_selector(MioSelector::new()?, listener, gate, max_connections)
	}
}

impl<S: Selector> SessionServer<S> {
	/// Wrap an already bound listener. One reactor slot is reserved for it.
	pub fn with_selector(
		selector: S,
		listener: TcpListener,
		gate: AdmissionGate,
		max_connections: usize,
	) -> PlResult<Self> {
		listener.set_nonblocking(true)?;
		let listener_fd = descriptor_of(&listener);
		let mut reactor = Reactor::new(selector, max_connections.saturating_add(1));
		reactor.register(listener_fd, Interest::READABLE).map_err(map_reactor_err)?;

		if let Ok(addr) = listener.local_addr() {
			info!("Listening on {} (max {} connections)", addr, reactor.capacity() - 1);
		}
		Ok(Self { reactor, listener, listener_fd, gate, connections: HashMap::new() })
	}

	pub fn local_addr(&self) -> PlResult<SocketAddr> {
		Ok(self.listener.local_addr()?)
	}

	pub fn gate(&self) -> &AdmissionGate {
		&self.gate
	}

	pub fn reactor(&self) -> &Reactor<S> {
		&self.reactor
	}

	pub fn connection_count(&self) -> usize {
		self.connections.len()
	}

	pub fn connection(&self, fd: Descriptor) -> Option<&Connection> {
		self.connections.get(&fd)
	}

	pub fn connection_mut(&mut self, fd: Descriptor) -> Option<&mut Connection> {
		self.connections.get_mut(&fd)
	}

	/// Change which readiness a connection is watched for
	pub fn set_interest(&mut self, fd: Descriptor, interest: Interest) -> PlResult<()> {
		if !self.connections.contains_key(&fd) {
			return Err(Error::NotFound);
		}
		self.reactor.modify(fd, interest).map_err(map_reactor_err)
	}

	/// Run one reactor iteration
	pub fn poll_events(&mut self, timeout: Option<Duration>) -> PlResult<Vec<ServerEvent>> {
		let mut events = Vec::new();
		self.reactor.wait(timeout).map_err(map_reactor_err)?;

		while let Some((fd, conditions)) = self.reactor.next_ready() {
			if fd == self.listener_fd {
				self.accept_pending(&mut events);
			} else if conditions.is_error() {
				if let Some(peer) = self.close(fd) {
					debug!("Connection from {} failed", peer);
					events.push(ServerEvent::Closed { fd, peer });
				}
			} else if self.connections.contains_key(&fd) {
				events.push(ServerEvent::Ready { fd, conditions });
			}
		}
		Ok(events)
	}

	fn accept_pending(&mut self, events: &mut Vec<ServerEvent>) {
		let admissions = match self.gate.accept_pending(&self.listener) {
			Ok(admissions) => admissions,
			Err(err) => {
				warn!("accept failed: {}", err);
				return;
			}
		};

		for admission in admissions {
			match admission {
				Admission::Refused(peer) => {
					events.push(ServerEvent::Rejected { peer, reason: RejectReason::Banned });
				}
				Admission::Admitted(stream, peer) => {
					let fd = descriptor_of(&stream);
					match self.reactor.register(fd, Interest::READABLE) {
						Ok(()) => {
							debug!("Accepted connection from {} (fd {})", peer, fd);
							self.connections.insert(fd, Connection { stream, peer });
							events.push(ServerEvent::Accepted { fd, peer });
						}
						Err(err) => {
							let reason = if let ReactorError::CapacityExceeded { .. } = err {
								RejectReason::Full
							} else {
								RejectReason::Failed
							};
							warn!("Dropping connection from {}: {}", peer, err);
							let _ignore = stream.shutdown(Shutdown::Both);
							events.push(ServerEvent::Rejected { peer, reason });
						}
					}
				}
			}
		}
	}

	/// Deregister and shut down a connection, returning its peer address
	pub fn close(&mut self, fd: Descriptor) -> Option<SocketAddr> {
		let conn = self.connections.remove(&fd)?;
		if let Err(err) = self.reactor.deregister(fd) {
			warn!("deregister of fd {} failed: {}", fd, err);
		}
		if let Err(err) = conn.stream.shutdown(Shutdown::Both) {
			// Already gone when the peer reset the connection
			if err.kind() != io::ErrorKind::NotConnected {
				debug!("shutdown of fd {} failed: {}", fd, err);
			}
		}
		debug!("Closed connection from {} (fd {})", conn.peer, fd);
		Some(conn.peer)
	}

	/// Close every connection and stop watching the listener
	pub fn shutdown(&mut self) {
		let fds: Vec<Descriptor> = self.connections.keys().copied().collect();
		for fd in fds {
			self.close(fd);
		}
		if self.reactor.is_registered(self.listener_fd) {
			if let Err(err) = self.reactor.deregister(self.listener_fd) {
				warn!("deregister of listener failed: {}", err);
			}
		}
		info!("Session server stopped");
	}

	/// Poll until `stop` is set, passing every event to `handler`.
	///
	/// A handler error stops the loop and is returned after shutdown.
	pub fn serve<H>(&mut self, stop: &AtomicBool, timeout: Duration, mut handler: H) -> PlResult<()>
	where
		H: FnMut(&mut Self, ServerEvent) -> PlResult<()>,
	{
		let res = self.run_until(stop, timeout, &mut handler);
		if let Err(err) = &res {
			error!("Session server loop failed: {}", err);
		}
		self.shutdown();
		res
	}

	fn run_until<H>(&mut self, stop: &AtomicBool, timeout: Duration, handler: &mut H) -> PlResult<()>
	where
		H: FnMut(&mut Self, ServerEvent) -> PlResult<()>,
	{
		while !stop.load(Ordering::Relaxed) {
			for event in self.poll_events(Some(timeout))? {
				handler(self, event)?;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_reactor_errors_map_to_store_errors() {
		assert!(matches!(map_reactor_err(ReactorError::NotRegistered), Error::NotFound));
		let err = map_reactor_err(ReactorError::CapacityExceeded { capacity: 3 });
		assert!(matches!(err, Error::Io(_)));
	}
}

// vim: ts=4
