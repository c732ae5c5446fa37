//! Socket readiness reactor.
//!
//! A [`Reactor`] keeps a fixed-capacity table of registered descriptors and
//! reports which of them became readable, writable, closed, or errored. The
//! platform mechanism sits behind the [`Selector`] trait; platform-specific
//! sub-conditions (accept pending, connect completed, peer closed) are folded
//! into the normalized [`ConditionSet`] before callers see them.
//!
//! A reactor is driven by one thread: `wait` and `next_ready` must be called
//! from the owning thread, and registration changes from other threads need
//! external synchronization.

pub mod error;
pub mod interest;
pub mod mock;
pub mod reactor;
pub mod selector;
pub mod slot;

#[cfg(unix)]
pub mod mio_selector;

pub use error::ReactorError;
pub use interest::{ConditionSet, Interest, PlatformEvents};
pub use reactor::Reactor;
pub use selector::{Descriptor, Selector, Token};

#[cfg(unix)]
pub use mio_selector::MioSelector;

// vim: ts=4
