pub use palisade_types::prelude::*;

pub use std::sync::Arc;

// vim: ts=4
