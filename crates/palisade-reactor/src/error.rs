//! Reactor error types

use std::io;

#[derive(Debug)]
pub enum ReactorError {
	/// The slot table is at capacity
	CapacityExceeded { capacity: usize },
	/// The descriptor already has a slot; use `modify`
	AlreadyRegistered,
	/// The descriptor has no slot
	NotRegistered,
	/// The platform rejected a registration change
	Platform(io::Error),
	/// Waiting failed with a non-transient platform error
	WaitFailed(io::Error),
}

impl std::fmt::Display for ReactorError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ReactorError::CapacityExceeded { capacity } => {
				write!(f, "Registration table full ({} slots)", capacity)
			}
			ReactorError::AlreadyRegistered => write!(f, "Descriptor already registered"),
			ReactorError::NotRegistered => write!(f, "Descriptor not registered"),
			ReactorError::Platform(err) => write!(f, "Platform error: {}", err),
			ReactorError::WaitFailed(err) => write!(f, "Wait failed: {}", err),
		}
	}
}

impl std::error::Error for ReactorError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			ReactorError::Platform(err) | ReactorError::WaitFailed(err) => Some(err),
			_ => None,
		}
	}
}

impl From<ReactorError> for io::Error {
	fn from(err: ReactorError) -> Self {
		match err {
			ReactorError::Platform(err) | ReactorError::WaitFailed(err) => err,
			ReactorError::CapacityExceeded { .. } => io::Error::new(io::ErrorKind::OutOfMemory, err),
			ReactorError::AlreadyRegistered => io::Error::new(io::ErrorKind::AlreadyExists, err),
			ReactorError::NotRegistered => io::Error::new(io::ErrorKind::NotFound, err),
		}
	}
}

// vim: ts=4
