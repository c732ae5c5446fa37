//! Interest masks, platform sub-conditions, and the normalized condition set

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// What a caller wants to hear about. Never empty.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interest(u8);

impl Interest {
	pub const READABLE: Interest = Interest(0b01);
	pub const WRITABLE: Interest = Interest(0b10);
	pub const BOTH: Interest = Interest(0b11);

	pub fn is_readable(self) -> bool {
		self.0 & Self::READABLE.0 != 0
	}

	pub fn is_writable(self) -> bool {
		self.0 & Self::WRITABLE.0 != 0
	}

	/// The platform sub-conditions to watch for this interest.
	///
	/// Readable also watches for pending accepts; either direction watches
	/// for connect completion and peer close.
	pub fn expand(self) -> PlatformEvents {
		let mut events = PlatformEvents::NONE;
		if self.is_readable() {
			events |= PlatformEvents::READ | PlatformEvents::ACCEPT;
		}
		if self.is_writable() {
			events |= PlatformEvents::WRITE;
		}
		events | PlatformEvents::CONNECT | PlatformEvents::CLOSE
	}
}

impl BitOr for Interest {
	type Output = Interest;

	fn bitor(self, rhs: Interest) -> Interest {
		Interest(self.0 | rhs.0)
	}
}

impl fmt::Debug for Interest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self.is_readable(), self.is_writable()) {
			(true, true) => write!(f, "READABLE | WRITABLE"),
			(true, false) => write!(f, "READABLE"),
			(false, true) => write!(f, "WRITABLE"),
			(false, false) => write!(f, "(empty)"),
		}
	}
}

macro_rules! flag_set {
	($name:ident, $repr:ty, { $($flag:ident = $bit:expr),+ $(,)? }) => {
		#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
		pub struct $name($repr);

		impl $name {
			pub const NONE: $name = $name(0);
			$(pub const $flag: $name = $name($bit);)+

			pub fn is_empty(self) -> bool {
				self.0 == 0
			}

			pub fn contains(self, other: $name) -> bool {
				other.0 != 0 && self.0 & other.0 == other.0
			}

			pub fn intersects(self, other: $name) -> bool {
				self.0 & other.0 != 0
			}

			pub fn intersection(self, other: $name) -> $name {
				$name(self.0 & other.0)
			}
		}

		impl BitOr for $name {
			type Output = $name;

			fn bitor(self, rhs: $name) -> $name {
				$name(self.0 | rhs.0)
			}
		}

		impl BitOrAssign for $name {
			fn bitor_assign(&mut self, rhs: $name) {
				self.0 |= rhs.0;
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				let names: Vec<&str> = [$((stringify!($flag), $name::$flag)),+]
					.into_iter()
					.filter(|(_, flag)| self.contains(*flag))
					.map(|(name, _)| name)
					.collect();
				if names.is_empty() {
					write!(f, "(empty)")
				} else {
					write!(f, "{}", names.join(" | "))
				}
			}
		}
	};
}

flag_set!(PlatformEvents, u8, {
	READ = 0b00_0001,
	WRITE = 0b00_0010,
	ACCEPT = 0b00_0100,
	CONNECT = 0b00_1000,
	CLOSE = 0b01_0000,
	ERROR = 0b10_0000,
});

flag_set!(ConditionSet, u8, {
	READABLE = 0b0001,
	WRITABLE = 0b0010,
	CLOSED = 0b0100,
	ERROR = 0b1000,
});

impl PlatformEvents {
	/// Collapse platform sub-conditions into what callers act on.
	///
	/// A pending accept reads as Readable. Connect completion and peer close
	/// read as both Readable and Writable, so the next read or write reports
	/// the outcome (a zero-byte read means closed).
	pub fn normalize(self) -> ConditionSet {
		let mut set = ConditionSet::NONE;
		if self.intersects(PlatformEvents::READ | PlatformEvents::ACCEPT) {
			set |= ConditionSet::READABLE;
		}
		if self.intersects(PlatformEvents::WRITE) {
			set |= ConditionSet::WRITABLE;
		}
		if self.intersects(PlatformEvents::CONNECT) {
			set |= ConditionSet::READABLE | ConditionSet::WRITABLE;
		}
		if self.intersects(PlatformEvents::CLOSE) {
			set |= ConditionSet::READABLE | ConditionSet::WRITABLE | ConditionSet::CLOSED;
		}
		if self.intersects(PlatformEvents::ERROR) {
			set |= ConditionSet::ERROR;
		}
		set
	}
}

impl ConditionSet {
	pub fn is_readable(self) -> bool {
		self.contains(ConditionSet::READABLE)
	}

	pub fn is_writable(self) -> bool {
		self.contains(ConditionSet::WRITABLE)
	}

	pub fn is_closed(self) -> bool {
		self.contains(ConditionSet::CLOSED)
	}

	pub fn is_error(self) -> bool {
		self.contains(ConditionSet::ERROR)
	}
}


// vim: ts=4
