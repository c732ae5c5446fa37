//! Fixed-capacity registration table.
//!
//! Slots live in an arena addressed by a generational index. The
//! descriptor → slot index and the slot → descriptor entries are updated
//! together, so the mapping stays a bijection: a slot is either free or bound
//! to exactly one descriptor, and a descriptor holds at most one slot.
//! Releasing a slot bumps its generation, which invalidates every token
//! handed out for the previous occupant.

use std::collections::HashMap;

use crate::error::ReactorError;
use crate::interest::Interest;
use crate::selector::{Descriptor, Token};

const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: usize = usize::MAX >> INDEX_BITS;

/// Largest capacity a table can be created with
pub const MAX_CAPACITY: usize = INDEX_MASK + 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId {
	index: usize,
	generation: usize,
}

impl SlotId {
	pub fn index(self) -> usize {
		self.index
	}

	pub fn generation(self) -> usize {
		self.generation
	}

	pub fn token(self) -> Token {
		Token((self.generation << INDEX_BITS) | self.index)
	}

	pub fn from_token(token: Token) -> Self {
		SlotId { index: token.0 & INDEX_MASK, generation: (token.0 >> INDEX_BITS) & GENERATION_MASK }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registration {
	pub descriptor: Descriptor,
	pub interest: Interest,
}

#[derive(Debug)]
struct Slot {
	generation: usize,
	entry: Option<Registration>,
}

#[derive(Debug)]
pub struct SlotTable {
	slots: Vec<Slot>,
	free: Vec<usize>,
	by_descriptor: HashMap<Descriptor, SlotId>,
	capacity: usize,
}

impl SlotTable {
	/// Capacity is clamped to `1..=MAX_CAPACITY`
	pub fn new(capacity: usize) -> Self {
		let capacity = capacity.clamp(1, MAX_CAPACITY);
		SlotTable {
			slots: Vec::new(),
			free: Vec::new(),
			by_descriptor: HashMap::new(),
			capacity,
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn len(&self) -> usize {
		self.by_descriptor.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_descriptor.is_empty()
	}

	pub fn is_full(&self) -> bool {
		self.len() >= self.capacity
	}

	pub fn lookup(&self, fd: Descriptor) -> Option<SlotId> {
		self.by_descriptor.get(&fd).copied()
	}

	/// Bind a free slot to `fd`
	pub fn insert(&mut self, fd: Descriptor, interest: Interest) -> Result<SlotId, ReactorError> {
		if self.by_descriptor.contains_key(&fd) {
			return Err(ReactorError::AlreadyRegistered);
		}

		let index = if let Some(index) = self.free.pop() {
			index
		} else if self.slots.len() < self.capacity {
			self.slots.push(Slot { generation: 0, entry: None });
			self.slots.len() - 1
		} else {
			return Err(ReactorError::CapacityExceeded { capacity: self.capacity });
		};

		let slot = &mut self.slots[index];
		slot.entry = Some(Registration { descriptor: fd, interest });
		let id = SlotId { index, generation: slot.generation };
		self.by_descriptor.insert(fd, id);
		Ok(id)
	}

	/// Release the slot bound to `fd`
	pub fn remove(&mut self, fd: Descriptor) -> Result<(SlotId, Registration), ReactorError> {
		let id = self.by_descriptor.remove(&fd).ok_or(ReactorError::NotRegistered)?;
		let slot = &mut self.slots[id.index];
		let entry = slot.entry.take().ok_or(ReactorError::NotRegistered)?;
		slot.generation = (slot.generation + 1) & GENERATION_MASK;
		self.free.push(id.index);
		Ok((id, entry))
	}

	pub fn get_mut(&mut self, fd: Descriptor) -> Option<&mut Registration> {
		let id = self.lookup(fd)?;
		self.slots.get_mut(id.index)?.entry.as_mut()
	}

	/// The registration a token was issued for, if that registration is still live
	pub fn resolve(&self, token: Token) -> Option<&Registration> {
		let id = SlotId::from_token(token);
		let slot = self.slots.get(id.index)?;
		if slot.generation != id.generation {
			return None;
		}
		slot.entry.as_ref()
	}

	/// Number of slots that can still be bound
	pub fn available(&self) -> usize {
		self.capacity - self.len()
	}

	#[cfg(test)]
	fn is_bijection(&self) -> bool {
		let bound = self.slots.iter().filter(|s| s.entry.is_some()).count();
		bound == self.by_descriptor.len()
			&& self.by_descriptor.iter().all(|(fd, id)| {
				self.slots
					.get(id.index)
					.is_some_and(|s| s.generation == id.generation && s.entry.map(|e| e.descriptor) == Some(*fd))
			})
	}
}


// vim: ts=4
