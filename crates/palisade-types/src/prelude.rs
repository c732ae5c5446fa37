pub use crate::error::{Error, PlResult};
pub use crate::types::Timestamp;

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
