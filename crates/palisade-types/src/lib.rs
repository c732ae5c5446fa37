//! Shared types, adapter traits, and core utilities for the Palisade server.
//!
//! This crate holds the types shared between the admission layer and the
//! storage adapters, so adapter crates can compile independently of the
//! server crate.

pub mod address;
pub mod error;
pub mod policy_adapter;
pub mod prelude;
pub mod types;
pub mod worker;

// vim: ts=4
