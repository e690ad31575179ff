//! # Way Store
//!
//! Maps OSM way id → ordered node-id sequence. The index is an
//! [`ArenaMap`] from id to record handle; each sequence lives out-of-line
//! in its own arena record so the handle a caller receives keeps pointing
//! at the same bytes across table rehashes and arena growth.
//!
//! ## Record Layout
//!
//! Little-endian throughout, like every structure in the mapped region.
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  --------------------------
//! 0       8     len: Number of node ids
//! 8       8*N   node ids
//! ```
//!
//! Insert-once semantics: re-inserting an id repoints the index at a fresh
//! record and is not part of the contract.

use eyre::Result;
use zerocopy::little_endian::U64;

use super::map::ArenaMap;
use crate::arena::{Arena, RootId};
use crate::types::{Handle, NodeId, NodeIdLe, StoreError, WayId};

#[derive(Debug, Clone, Copy)]
pub(crate) struct WayStore {
    map: ArenaMap<WayId, Handle>,
}

impl WayStore {
    pub fn create(arena: &mut Arena) -> Result<Self> {
        let map = ArenaMap::create(arena)?;
        arena.set_root(RootId::Ways, map.root());
        Ok(Self { map })
    }

    pub fn reserve(&self, arena: &mut Arena, count: u64) -> Result<()> {
        self.map.reserve(arena, count)
    }

    /// Copies `nodes` into a fresh arena record and indexes it under `id`.
    /// Returns the record handle, valid for the lifetime of the store.
    pub fn insert(&self, arena: &mut Arena, id: WayId, nodes: &[NodeId]) -> Result<Handle> {
        let record = write_node_record(arena, nodes)?;
        self.map.insert(arena, id, record)?;
        Ok(record)
    }

    /// Decoded node-id sequence of the way stored under `id`.
    pub fn lookup(&self, arena: &Arena, id: WayId) -> Result<Vec<NodeId>> {
        let record = self
            .map
            .get(arena, id)?
            .ok_or(StoreError::WayNotFound { id })?;
        Ok(nodes_at(arena, record)?.iter().map(|id| id.get()).collect())
    }

    pub fn contains(&self, arena: &Arena, id: WayId) -> Result<bool> {
        self.map.contains_key(arena, id)
    }

    pub fn len(&self, arena: &Arena) -> Result<u64> {
        self.map.len(arena)
    }

    pub fn clear(&self, arena: &mut Arena) -> Result<()> {
        self.map.clear(arena)
    }
}

pub(crate) fn write_node_record(arena: &mut Arena, nodes: &[NodeId]) -> Result<Handle> {
    let record = arena.alloc(8 + 8 * nodes.len())?;
    arena.slice_mut::<U64>(record, 1)?[0] = U64::new(nodes.len() as u64);
    if !nodes.is_empty() {
        let out = arena.slice_mut::<NodeIdLe>(record.byte_add(8), nodes.len())?;
        for (slot, &id) in out.iter_mut().zip(nodes) {
            *slot = NodeIdLe::new(id);
        }
    }
    Ok(record)
}

/// Node-id view of the record behind a way handle.
pub(crate) fn nodes_at(arena: &Arena, record: Handle) -> Result<&[NodeIdLe]> {
    let len = arena.slice::<U64>(record, 1)?[0].get() as usize;
    if len == 0 {
        return Ok(&[]);
    }
    arena.slice::<NodeIdLe>(record.byte_add(8), len)
}
