//! Admission decisions for peers, logins, and session announcements.
//!
//! The gate is the only path from the connection loop to the policy store.
//! Each question has an async form for callers already on the runtime and a
//! blocking form for the reactor thread, which must not be a runtime worker.
//! Storage faults always resolve to the denying answer.

use std::io;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};

use tokio::runtime::Handle;

use crate::policy_adapter::{AuthOutcome, ConfigKey, PolicyAdapter};
use crate::prelude::*;

/// Why a login was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
	BadPassword,
	Locked,
	/// No such account and guest logins are disabled
	NoGuests,
	/// The policy store could not answer
	Unavailable,
}

/// What the protocol layer should answer to a login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginDecision {
	/// Registered account, with its feature flags
	Registered { flags: Box<[Box<str>]> },
	/// Unregistered name, admitted without flags
	Guest,
	Rejected(LoginRejection),
}

impl LoginDecision {
	pub fn is_accepted(&self) -> bool {
		!matches!(self, LoginDecision::Rejected(_))
	}
}

/// Outcome of finalizing one pending connection
#[derive(Debug)]
pub enum Admission {
	Admitted(TcpStream, SocketAddr),
	/// The connection was accepted and closed again
	Refused(SocketAddr),
}

#[derive(Clone)]
pub struct AdmissionGate {
	store: Arc<dyn PolicyAdapter>,
	rt: Handle,
}

impl std::fmt::Debug for AdmissionGate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdmissionGate").field("store", &self.store).finish_non_exhaustive()
	}
}

impl AdmissionGate {
	/// `rt` drives store queries issued from the blocking methods
	pub fn new(store: Arc<dyn PolicyAdapter>, rt: Handle) -> Self {
		Self { store, rt }
	}

	pub fn store(&self) -> &Arc<dyn PolicyAdapter> {
		&self.store
	}

	// Peers
	//*******
	pub async fn admit_peer(&self, peer: &IpAddr) -> bool {
		let banned = self.store.is_ip_banned(peer, Timestamp::now()).await;
		if banned {
			info!("Refusing banned peer {}", peer);
		}
		!banned
	}

	/// Blocking form of [`Self::admit_peer`]
	pub fn check_peer(&self, peer: &IpAddr) -> bool {
		self.rt.block_on(self.admit_peer(peer))
	}

	/// Accept every pending connection on a nonblocking listener.
	///
	/// Banned peers are accepted and shut down at once so the OS never holds
	/// a half-open backlog entry for them. Admitted streams are switched to
	/// nonblocking mode.
	pub fn accept_pending(&self, listener: &TcpListener) -> io::Result<Vec<Admission>> {
		let mut admissions = Vec::new();
		loop {
			let (stream, peer) = match listener.accept() {
				Ok(conn) => conn,
				Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
				Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
				Err(err) if err.kind() == io::ErrorKind::ConnectionAborted => {
					debug!("Pending connection aborted before accept");
					continue;
				}
				Err(err) => {
					if admissions.is_empty() {
						return Err(err);
					}
					warn!("accept failed after {} connections: {}", admissions.len(), err);
					break;
				}
			};

			if self.check_peer(&peer.ip()) {
				if let Err(err) = stream.set_nonblocking(true) {
					warn!("Dropping connection from {}: {}", peer, err);
					refuse(&stream);
					continue;
				}
				admissions.push(Admission::Admitted(stream, peer));
			} else {
				refuse(&stream);
				admissions.push(Admission::Refused(peer));
			}
		}
		Ok(admissions)
	}

	// Logins
	//********
	pub async fn authorize_login(&self, username: &str, password: &str) -> LoginDecision {
		let outcome = match self.store.authenticate(username, password).await {
			Ok(outcome) => outcome,
			Err(err) => {
				warn!("Login check for {:?} failed: {}", username, err);
				return LoginDecision::Rejected(LoginRejection::Unavailable);
			}
		};

		match outcome {
			AuthOutcome::Ok { flags } => {
				info!("User {:?} logged in (flags: {:?})", username, flags);
				LoginDecision::Registered { flags }
			}
			AuthOutcome::BadPassword => {
				info!("Bad password for user {:?}", username);
				LoginDecision::Rejected(LoginRejection::BadPassword)
			}
			AuthOutcome::Locked => {
				info!("Locked user {:?} tried to log in", username);
				LoginDecision::Rejected(LoginRejection::Locked)
			}
			AuthOutcome::NotFound => match self.store.get_config_bool(ConfigKey::ALLOW_GUESTS).await {
				Ok(true) => LoginDecision::Guest,
				Ok(false) => LoginDecision::Rejected(LoginRejection::NoGuests),
				Err(err) => {
					warn!("Guest policy lookup failed: {}", err);
					LoginDecision::Rejected(LoginRejection::Unavailable)
				}
			},
		}
	}

	/// Blocking form of [`Self::authorize_login`]
	pub fn check_login(&self, username: &str, password: &str) -> LoginDecision {
		self.rt.block_on(self.authorize_login(username, password))
	}

	// Announcements
	//***************
	pub async fn authorize_announcement(&self, url: &str) -> bool {
		let allowed = self.store.is_url_whitelisted(url).await;
		if !allowed {
			info!("Announcement to {} not allowed", url);
		}
		allowed
	}

	/// Blocking form of [`Self::authorize_announcement`]
	pub fn check_announcement(&self, url: &str) -> bool {
		self.rt.block_on(self.authorize_announcement(url))
	}
}

fn refuse(stream: &TcpStream) {
	if let Err(err) = stream.shutdown(Shutdown::Both) {
		debug!("shutdown of refused connection failed: {}", err);
	}
}

// vim: ts=4
