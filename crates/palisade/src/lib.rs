//! Palisade is the connection-admission layer of a collaborative session
//! server.
//!
//! # Pieces
//!
//! - [`reactor`]: fixed-capacity socket readiness multiplexer
//! - [`policy_adapter`]: storage trait for bans, the listing server
//!   whitelist, and user accounts
//! - [`gate::AdmissionGate`]: asks the policy store whether a peer, a login,
//!   or an announcement may proceed
//! - [`server::SessionServer`]: the application context that ties a listener,
//!   the reactor, and the gate together
//! - [`app::ServerBuilder`]: configures and runs a server

pub use palisade_reactor as reactor;
pub use palisade_types::address;
pub use palisade_types::error;
pub use palisade_types::policy_adapter;
pub use palisade_types::types;
pub use palisade_types::worker;

pub mod app;
pub mod gate;
pub mod prelude;
pub mod server;

pub use app::{ServerBuilder, ServerOpts};
pub use gate::{AdmissionGate, LoginDecision, LoginRejection};
pub use server::{RejectReason, ServerEvent, SessionServer};

// vim: ts=4
