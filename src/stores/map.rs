//! # Arena Hash Table
//!
//! An open-addressed hash table whose slot array lives inside the arena.
//! This is the shared backbone of the sparse node store, the way store, and
//! the relation store.
//!
//! ## Slot Layout
//!
//! All fields are little-endian, like every structure resident in the
//! mapped region.
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  ---------------------------------
//! 0       8     state: 0 = empty, 1 = occupied
//! 8       8     key: Raw id bits
//! 16      8     value: One 64-bit word
//! ```
//!
//! The value word is either a [`Handle`] offset (way and relation stores)
//! or a packed [`LatpLon`] (sparse node store). Keeping the slot concrete
//! sidesteps layout questions a generic zerocopy slot would raise; the
//! typed view is restored by the [`ArenaKey`] / [`ArenaValue`] traits.
//!
//! ## Probing and Growth
//!
//! Linear probing over a power-of-two capacity, grown by rehash into a
//! fresh slab at 7/8 load. The store never deletes, so there are no
//! tombstones and probe chains only terminate on empty slots. The old slab
//! is abandoned in place — bump-allocated space is reclaimed only at
//! teardown, exactly like the rest of the arena.
//!
//! ## Retry Discipline
//!
//! `insert` performs its only fallible allocation (the rehash slab) before
//! touching any live slot, so an `OutOfSpace` unwinds with no observable
//! state change and the façade's retry loop can safely re-run it.
//!
//! ## Position Independence
//!
//! The `ArenaMap` value itself holds just the offset of its header; every
//! operation re-resolves slots through the arena, so a remap between
//! operations is harmless.

use std::marker::PhantomData;

use eyre::Result;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::arena::Arena;
use crate::types::{Handle, LatpLon};

const SLOT_EMPTY: u64 = 0;
const SLOT_FULL: u64 = 1;

const INITIAL_CAPACITY: u64 = 16;

/// Keys are 64-bit OSM ids; signed pseudo-ids are stored as raw bits.
pub(crate) trait ArenaKey: Copy + Eq {
    fn to_raw(self) -> u64;
}

impl ArenaKey for u64 {
    fn to_raw(self) -> u64 {
        self
    }
}

impl ArenaKey for i64 {
    fn to_raw(self) -> u64 {
        self as u64
    }
}

/// Values must round-trip through one 64-bit slot word.
pub(crate) trait ArenaValue: Copy {
    fn to_word(self) -> u64;
    fn from_word(word: u64) -> Self;
}

impl ArenaValue for Handle {
    fn to_word(self) -> u64 {
        self.offset()
    }

    fn from_word(word: u64) -> Self {
        Handle::from_offset(word)
    }
}

impl ArenaValue for LatpLon {
    fn to_word(self) -> u64 {
        ((self.lon() as u32 as u64) << 32) | (self.latp() as u32 as u64)
    }

    fn from_word(word: u64) -> Self {
        LatpLon::new(word as u32 as i32, (word >> 32) as u32 as i32)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct MapHeader {
    slots: U64,
    capacity: U64,
    len: U64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct Slot {
    state: U64,
    key: U64,
    value: U64,
}

const EMPTY_SLOT: Slot = Slot {
    state: U64::new(SLOT_EMPTY),
    key: U64::new(0),
    value: U64::new(0),
};

#[derive(Debug)]
pub(crate) struct ArenaMap<K, V> {
    root: Handle,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for ArenaMap<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for ArenaMap<K, V> {}

impl<K: ArenaKey, V: ArenaValue> ArenaMap<K, V> {
    pub fn create(arena: &mut Arena) -> Result<Self> {
        let root = arena.alloc(std::mem::size_of::<MapHeader>())?;
        let slots = alloc_slots(arena, INITIAL_CAPACITY)?;
        *arena.get_mut::<MapHeader>(root)? = MapHeader {
            slots: U64::new(slots.offset()),
            capacity: U64::new(INITIAL_CAPACITY),
            len: U64::new(0),
        };
        Ok(Self::open(root))
    }

    pub fn open(root: Handle) -> Self {
        Self {
            root,
            _marker: PhantomData,
        }
    }

    pub fn root(&self) -> Handle {
        self.root
    }

    /// Pre-sizes the table for `n` entries so bulk load does not rehash.
    pub fn reserve(&self, arena: &mut Arena, n: u64) -> Result<()> {
        let header = *arena.get::<MapHeader>(self.root)?;
        let needed = capacity_for(n);
        if needed > header.capacity.get() {
            self.rehash_into(arena, needed)?;
        }
        Ok(())
    }

    /// Inserts or overwrites. Most recent value wins.
    pub fn insert(&self, arena: &mut Arena, key: K, value: V) -> Result<()> {
        let mut header = *arena.get::<MapHeader>(self.root)?;
        if (header.len.get() + 1) * 8 > header.capacity.get() * 7 {
            self.rehash_into(arena, header.capacity.get() * 2)?;
            header = *arena.get::<MapHeader>(self.root)?;
        }

        let capacity = header.capacity.get() as usize;
        let slots_handle = Handle::from_offset(header.slots.get());
        let raw_key = key.to_raw();

        let (index, vacant) = {
            let slots = arena.slice::<Slot>(slots_handle, capacity)?;
            probe(slots, raw_key)
        };

        let slots = arena.slice_mut::<Slot>(slots_handle, capacity)?;
        slots[index] = Slot {
            state: U64::new(SLOT_FULL),
            key: U64::new(raw_key),
            value: U64::new(value.to_word()),
        };

        if vacant {
            let header = arena.get_mut::<MapHeader>(self.root)?;
            header.len = U64::new(header.len.get() + 1);
        }
        Ok(())
    }

    pub fn get(&self, arena: &Arena, key: K) -> Result<Option<V>> {
        let header = *arena.get::<MapHeader>(self.root)?;
        let slots = arena.slice::<Slot>(
            Handle::from_offset(header.slots.get()),
            header.capacity.get() as usize,
        )?;
        let (index, vacant) = probe(slots, key.to_raw());
        if vacant {
            Ok(None)
        } else {
            Ok(Some(V::from_word(slots[index].value.get())))
        }
    }

    pub fn contains_key(&self, arena: &Arena, key: K) -> Result<bool> {
        Ok(self.get(arena, key)?.is_some())
    }

    pub fn len(&self, arena: &Arena) -> Result<u64> {
        Ok(arena.get::<MapHeader>(self.root)?.len.get())
    }

    /// Empties the table in place; capacity is retained.
    pub fn clear(&self, arena: &mut Arena) -> Result<()> {
        let header = *arena.get::<MapHeader>(self.root)?;
        let slots = arena.slice_mut::<Slot>(
            Handle::from_offset(header.slots.get()),
            header.capacity.get() as usize,
        )?;
        slots.fill(EMPTY_SLOT);
        arena.get_mut::<MapHeader>(self.root)?.len = U64::new(0);
        Ok(())
    }

    fn rehash_into(&self, arena: &mut Arena, new_capacity: u64) -> Result<()> {
        let header = *arena.get::<MapHeader>(self.root)?;

        // The only fallible step; nothing visible has changed if it throws.
        let new_slots = alloc_slots(arena, new_capacity)?;

        let occupied: Vec<(u64, u64)> = {
            let old = arena.slice::<Slot>(
                Handle::from_offset(header.slots.get()),
                header.capacity.get() as usize,
            )?;
            old.iter()
                .filter(|slot| slot.state.get() == SLOT_FULL)
                .map(|slot| (slot.key.get(), slot.value.get()))
                .collect()
        };

        let new = arena.slice_mut::<Slot>(new_slots, new_capacity as usize)?;
        let mask = new_capacity as usize - 1;
        for (key, value) in occupied {
            let mut index = bucket(key, new_capacity);
            while new[index].state.get() == SLOT_FULL {
                index = (index + 1) & mask;
            }
            new[index] = Slot {
                state: U64::new(SLOT_FULL),
                key: U64::new(key),
                value: U64::new(value),
            };
        }

        let header = arena.get_mut::<MapHeader>(self.root)?;
        header.slots = U64::new(new_slots.offset());
        header.capacity = U64::new(new_capacity);
        Ok(())
    }
}

fn alloc_slots(arena: &mut Arena, capacity: u64) -> Result<Handle> {
    // Fresh arena space is zeroed, which is exactly the all-empty slot state.
    Ok(arena.alloc(capacity as usize * std::mem::size_of::<Slot>())?)
}

/// First matching or first empty slot for `raw_key`. Returns the index and
/// whether it is vacant. Capacity is a power of two and load is capped at
/// 7/8, so an empty slot always terminates the probe.
fn probe(slots: &[Slot], raw_key: u64) -> (usize, bool) {
    let mask = slots.len() - 1;
    let mut index = bucket(raw_key, slots.len() as u64);
    loop {
        let slot = &slots[index];
        if slot.state.get() == SLOT_EMPTY {
            return (index, true);
        }
        if slot.key.get() == raw_key {
            return (index, false);
        }
        index = (index + 1) & mask;
    }
}

/// Fibonacci hashing; the high bits of the product index the table.
fn bucket(raw_key: u64, capacity: u64) -> usize {
    let hash = raw_key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (hash >> (64 - capacity.trailing_zeros())) as usize
}

/// Smallest power-of-two capacity that keeps `n` entries under 7/8 load.
fn capacity_for(n: u64) -> u64 {
    let mut capacity = INITIAL_CAPACITY;
    while n * 8 > capacity * 7 {
        capacity *= 2;
    }
    capacity
}
