//! # Node Stores
//!
//! Maps OSM node id → [`LatpLon`]. Two physical layouts satisfy the same
//! contract (`reserve`, `insert`, `lookup`, `contains`, `len`, `clear`);
//! the variant is chosen when the store is built and never changes.
//!
//! ## Compact
//!
//! A contiguous arena slab of `LatpLon`, indexed directly by node id. The
//! default, suited to the dense renumbered id space of a filtered extract.
//! Ids at or beyond the reservation fail with `NodeOutOfRange`; slots
//! inside the reservation that were never written read as the zero
//! `LatpLon` — the store does not distinguish "absent" from "(0, 0)".
//!
//! ## Sparse
//!
//! An open-addressed [`ArenaMap`] keyed by node id, suited to full-planet
//! id spaces. Missing ids fail with `NodeNotFound`; insertion is add-only
//! with most-recent-wins overwrite semantics.
//!
//! The [`Nodes`] enum is the construction-time selector between the two
//! layouts; the choice is fixed for the lifetime of the store.

use eyre::Result;
use tracing::info;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::map::ArenaMap;
use crate::arena::{Arena, RootId};
use crate::types::{Handle, LatpLon, NodeId, StoreError};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct CompactHeader {
    slab: U64,
    reserved: U64,
}

/// Dense node store: one `LatpLon` slot per id below the reservation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompactNodes {
    root: Handle,
}

impl CompactNodes {
    pub fn create(arena: &mut Arena) -> Result<Self> {
        let root = arena.alloc(std::mem::size_of::<CompactHeader>())?;
        arena.set_root(RootId::Nodes, root);
        Ok(Self { root })
    }

    /// Sizes the slab for `count` nodes. Replaces any previous reservation;
    /// fresh arena space starts zeroed, so all slots read as (0, 0).
    pub fn reserve(&self, arena: &mut Arena, count: u64) -> Result<()> {
        info!(nodes = count, "resizing compact node store");
        let slab = arena.alloc(count as usize * std::mem::size_of::<LatpLon>())?;
        let header = arena.get_mut::<CompactHeader>(self.root)?;
        header.slab = U64::new(slab.offset());
        header.reserved = U64::new(count);
        Ok(())
    }

    pub fn insert(&self, arena: &mut Arena, id: NodeId, coord: LatpLon) -> Result<()> {
        let header = *arena.get::<CompactHeader>(self.root)?;
        let reserved = header.reserved.get();
        if id >= reserved {
            return Err(StoreError::NodeOutOfRange { id, reserved }.into());
        }
        let slab = arena.slice_mut::<LatpLon>(
            Handle::from_offset(header.slab.get()),
            reserved as usize,
        )?;
        slab[id as usize] = coord;
        Ok(())
    }

    pub fn lookup(&self, arena: &Arena, id: NodeId) -> Result<LatpLon> {
        let header = *arena.get::<CompactHeader>(self.root)?;
        let reserved = header.reserved.get();
        if id >= reserved {
            return Err(StoreError::NodeOutOfRange { id, reserved }.into());
        }
        let slab = arena.slice::<LatpLon>(
            Handle::from_offset(header.slab.get()),
            reserved as usize,
        )?;
        Ok(slab[id as usize])
    }

    pub fn contains(&self, arena: &Arena, id: NodeId) -> Result<bool> {
        Ok(id < arena.get::<CompactHeader>(self.root)?.reserved.get())
    }

    pub fn len(&self, arena: &Arena) -> Result<u64> {
        Ok(arena.get::<CompactHeader>(self.root)?.reserved.get())
    }

    /// Zeroes the slab in place; the reservation is retained.
    pub fn clear(&self, arena: &mut Arena) -> Result<()> {
        let header = *arena.get::<CompactHeader>(self.root)?;
        let reserved = header.reserved.get();
        if reserved == 0 {
            return Ok(());
        }
        let slab = arena.slice_mut::<LatpLon>(
            Handle::from_offset(header.slab.get()),
            reserved as usize,
        )?;
        slab.fill(LatpLon::default());
        Ok(())
    }
}

/// Hash-map node store for sparse id spaces.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SparseNodes {
    map: ArenaMap<NodeId, LatpLon>,
}

impl SparseNodes {
    pub fn create(arena: &mut Arena) -> Result<Self> {
        let map = ArenaMap::create(arena)?;
        arena.set_root(RootId::Nodes, map.root());
        Ok(Self { map })
    }

    pub fn reserve(&self, arena: &mut Arena, count: u64) -> Result<()> {
        self.map.reserve(arena, count)
    }

    pub fn insert(&self, arena: &mut Arena, id: NodeId, coord: LatpLon) -> Result<()> {
        self.map.insert(arena, id, coord)
    }

    pub fn lookup(&self, arena: &Arena, id: NodeId) -> Result<LatpLon> {
        self.map
            .get(arena, id)?
            .ok_or_else(|| StoreError::NodeNotFound { id }.into())
    }

    pub fn contains(&self, arena: &Arena, id: NodeId) -> Result<bool> {
        self.map.contains_key(arena, id)
    }

    pub fn len(&self, arena: &Arena) -> Result<u64> {
        self.map.len(arena)
    }

    pub fn clear(&self, arena: &mut Arena) -> Result<()> {
        self.map.clear(arena)
    }
}

/// Construction-time choice of node store layout.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Nodes {
    Compact(CompactNodes),
    Sparse(SparseNodes),
}

impl Nodes {
    pub fn reserve(&self, arena: &mut Arena, count: u64) -> Result<()> {
        match self {
            Nodes::Compact(store) => store.reserve(arena, count),
            Nodes::Sparse(store) => store.reserve(arena, count),
        }
    }

    pub fn insert(&self, arena: &mut Arena, id: NodeId, coord: LatpLon) -> Result<()> {
        match self {
            Nodes::Compact(store) => store.insert(arena, id, coord),
            Nodes::Sparse(store) => store.insert(arena, id, coord),
        }
    }

    pub fn lookup(&self, arena: &Arena, id: NodeId) -> Result<LatpLon> {
        match self {
            Nodes::Compact(store) => store.lookup(arena, id),
            Nodes::Sparse(store) => store.lookup(arena, id),
        }
    }

    pub fn contains(&self, arena: &Arena, id: NodeId) -> Result<bool> {
        match self {
            Nodes::Compact(store) => store.contains(arena, id),
            Nodes::Sparse(store) => store.contains(arena, id),
        }
    }

    pub fn len(&self, arena: &Arena) -> Result<u64> {
        match self {
            Nodes::Compact(store) => store.len(arena),
            Nodes::Sparse(store) => store.len(arena),
        }
    }

    pub fn clear(&self, arena: &mut Arena) -> Result<()> {
        match self {
            Nodes::Compact(store) => store.clear(arena),
            Nodes::Sparse(store) => store.clear(arena),
        }
    }
}
