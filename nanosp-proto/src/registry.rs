//! Process-wide socket handle table.
//!
//! Fixed-size arena indexed by handle. Each slot carries a generation that
//! is bumped when the slot is released, so a handle of a closed socket
//! never matches a later socket that reuses the slot.

use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use nanosp_core::error::{Result, SpError};

/// Maximum number of simultaneously open sockets.
pub const MAX_SOCKETS: usize = 512;

/// Opaque socket identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketHandle {
    index: u32,
    generation: u32,
}

impl SocketHandle {
    /// Pack into one integer for foreign callers.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    occupied: bool,
}

struct Arena {
    slots: Vec<Slot>,
    /// Released slots, reused lowest first
    free: Vec<u32>,
}

impl Arena {
    fn new() -> Self {
        Self {
            slots: Vec::with_capacity(MAX_SOCKETS),
            free: Vec::new(),
        }
    }

    fn allocate(&mut self) -> Result<SocketHandle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < MAX_SOCKETS => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
            None => return Err(SpError::ResourceExhausted("socket table is full")),
        };
        let slot = &mut self.slots[index as usize];
        slot.occupied = true;
        Ok(SocketHandle {
            index,
            generation: slot.generation,
        })
    }

    fn slot_of(&mut self, handle: SocketHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index())
            .filter(|s| s.occupied && s.generation == handle.generation)
    }

    fn release(&mut self, handle: SocketHandle) -> Result<()> {
        let slot = self
            .slot_of(handle)
            .ok_or(SpError::InvalidState("stale socket handle"))?;
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        Ok(())
    }
}

static ARENA: Lazy<Mutex<Arena>> = Lazy::new(|| Mutex::new(Arena::new()));

/// Reserve a slot. Fails `ResourceExhausted` once [`MAX_SOCKETS`] are open.
pub(crate) fn allocate() -> Result<SocketHandle> {
    ARENA.lock().allocate()
}

/// Free a slot. Releasing a stale handle fails `InvalidState`.
pub(crate) fn release(handle: SocketHandle) -> Result<()> {
    ARENA.lock().release(handle)
}

/// Whether `handle` names an open socket.
pub fn is_live(handle: SocketHandle) -> bool {
    ARENA.lock().slot_of(handle).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_invalidates_old_handle() {
        let mut arena = Arena::new();
        let first = arena.allocate().unwrap();
        arena.release(first).unwrap();

        let second = arena.allocate().unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(arena.slot_of(first).is_none());
        assert!(arena.release(first).is_err());
        assert!(arena.release(second).is_ok());
    }

    #[test]
    fn test_capacity() {
        let mut arena = Arena::new();
        let handles: Vec<_> = (0..MAX_SOCKETS).map(|_| arena.allocate().unwrap()).collect();
        let err = arena.allocate().unwrap_err();
        assert!(matches!(err, SpError::ResourceExhausted(_)));

        arena.release(handles[7]).unwrap();
        assert_eq!(arena.allocate().unwrap().index(), 7);
    }

    #[test]
    fn test_raw_round_trip() {
        let handle = SocketHandle {
            index: 3,
            generation: 9,
        };
        assert_eq!(SocketHandle::from_raw(handle.as_raw()), handle);
    }
}
