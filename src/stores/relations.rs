//! # Relation Store
//!
//! Maps a multipolygon relation's pseudo way id → its outer and inner
//! way-id lists. Like the way store, the index is an [`ArenaMap`] from id
//! to record handle with the lists out-of-line in one arena record.
//!
//! ## Record Layout
//!
//! Little-endian throughout, like every structure in the mapped region.
//!
//! ```text
//! Offset        Size  Description
//! ------------  ----  -------------------------
//! 0             8     outer_len
//! 8             8     inner_len
//! 16            8*N   outer way ids
//! 16 + 8*N      8*M   inner way ids
//! ```
//!
//! `insert_front` is named for the insertion convention: relations are
//! synthesized with decreasing pseudo-ids. The store itself neither
//! enforces ordering nor deduplicates; callers provide uniqueness.

use eyre::Result;
use zerocopy::little_endian::U64;

use super::map::ArenaMap;
use crate::arena::{Arena, RootId};
use crate::types::{Handle, StoreError, WayId, WayIdLe};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RelationStore {
    map: ArenaMap<WayId, Handle>,
}

impl RelationStore {
    pub fn create(arena: &mut Arena) -> Result<Self> {
        let map = ArenaMap::create(arena)?;
        arena.set_root(RootId::Relations, map.root());
        Ok(Self { map })
    }

    /// Copies both way-id lists into a fresh record and indexes it under
    /// `id`. Returns the record handle.
    pub fn insert_front(
        &self,
        arena: &mut Arena,
        id: WayId,
        outer: &[WayId],
        inner: &[WayId],
    ) -> Result<Handle> {
        let record = arena.alloc(16 + 8 * (outer.len() + inner.len()))?;

        let lens = arena.slice_mut::<U64>(record, 2)?;
        lens[0] = U64::new(outer.len() as u64);
        lens[1] = U64::new(inner.len() as u64);
        write_way_ids(arena, record.byte_add(16), outer)?;
        write_way_ids(arena, record.byte_add(16 + 8 * outer.len() as u64), inner)?;

        self.map.insert(arena, id, record)?;
        Ok(record)
    }

    /// Decoded `(outer, inner)` way-id lists for the relation stored under
    /// `id`.
    pub fn lookup(&self, arena: &Arena, id: WayId) -> Result<(Vec<WayId>, Vec<WayId>)> {
        let record = self
            .map
            .get(arena, id)?
            .ok_or(StoreError::RelationNotFound { id })?;
        let (outer, inner) = entry_at(arena, record)?;
        Ok((decode_way_ids(outer), decode_way_ids(inner)))
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

/// `(outer, inner)` way-id views of the record behind a relation handle.
pub(crate) fn entry_at(arena: &Arena, record: Handle) -> Result<(&[WayIdLe], &[WayIdLe])> {
    let lens = arena.slice::<U64>(record, 2)?;
    let (outer_len, inner_len) = (lens[0].get() as usize, lens[1].get() as usize);
    let outer = if outer_len == 0 {
        &[]
    } else {
        arena.slice::<WayIdLe>(record.byte_add(16), outer_len)?
    };
    let inner = if inner_len == 0 {
        &[]
    } else {
        arena.slice::<WayIdLe>(record.byte_add(16 + 8 * outer_len as u64), inner_len)?
    };
    Ok((outer, inner))
}

pub(crate) fn decode_way_ids(ids: &[WayIdLe]) -> Vec<WayId> {
    ids.iter().map(|id| id.get()).collect()
}

fn write_way_ids(arena: &mut Arena, at: Handle, ids: &[WayId]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let out = arena.slice_mut::<WayIdLe>(at, ids.len())?;
    for (slot, &id) in out.iter_mut().zip(ids) {
        *slot = WayIdLe::new(id);
    }
    Ok(())
}
