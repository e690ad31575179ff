//! # Store Builder
//!
//! Fluent configuration for opening an [`OsmStore`]. Settings are chained
//! before `open()` creates the backing file and lays out the stores.
//!
//! ## Configuration Options
//!
//! | Option         | Default         | Description                            |
//! |----------------|-----------------|----------------------------------------|
//! | path           | required        | Location of the scratch backing file   |
//! | initial_size   | 1 024 000 000 B | Initial arena size, doubled as needed  |
//! | node store     | compact         | `compact_nodes(n)` or `sparse_nodes()` |
//! | reserve_ways   | 0               | Pre-size the way table                 |
//!
//! The compact node store is the right default for filtered extracts with
//! renumbered, dense node ids; `compact_nodes(n)` is also the reservation,
//! so ids must stay below `n`. Full-planet loads keeping the raw sparse id
//! space should use `sparse_nodes()` instead.
//!
//! Construction-time reservations run inside the same grow-and-retry loop
//! as regular inserts, so an `initial_size` smaller than the reservations
//! simply grows the arena during `open()`.

use std::path::{Path, PathBuf};

use eyre::Result;

use super::OsmStore;
use crate::arena::{with_grow_retry, Arena, RootId, DEFAULT_ARENA_SIZE};
use crate::stores::{CompactNodes, GeneratedStore, Nodes, RelationStore, SparseNodes, WayStore};

#[derive(Debug, Clone, Copy)]
enum NodeMode {
    Compact,
    Sparse,
}

/// Builder for configuring and opening an [`OsmStore`].
#[derive(Debug)]
pub struct OsmStoreBuilder {
    path: Option<PathBuf>,
    initial_size: u64,
    node_mode: NodeMode,
    reserved_nodes: u64,
    reserved_ways: u64,
}

impl Default for OsmStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OsmStoreBuilder {
    pub fn new() -> Self {
        Self {
            path: None,
            initial_size: DEFAULT_ARENA_SIZE,
            node_mode: NodeMode::Compact,
            reserved_nodes: 0,
            reserved_ways: 0,
        }
    }

    /// Location of the scratch backing file. A stale file at this path is
    /// replaced, and the file is removed again when the store is dropped.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Initial arena size in bytes. The arena doubles whenever an
    /// allocation does not fit, so this is a starting point, not a limit.
    pub fn initial_size(mut self, bytes: u64) -> Self {
        self.initial_size = bytes;
        self
    }

    /// Dense node store with slots for ids `0..reserved`.
    pub fn compact_nodes(mut self, reserved: u64) -> Self {
        self.node_mode = NodeMode::Compact;
        self.reserved_nodes = reserved;
        self
    }

    /// Hash-map node store for sparse id spaces.
    pub fn sparse_nodes(mut self) -> Self {
        self.node_mode = NodeMode::Sparse;
        self
    }

    /// Pre-sizes the way table for the expected number of ways.
    pub fn reserve_ways(mut self, count: u64) -> Self {
        self.reserved_ways = count;
        self
    }

    pub fn open(self) -> Result<OsmStore> {
        let path = self
            .path
            .ok_or_else(|| eyre::eyre!("osm store requires a backing file path"))?;

        let mut arena = Arena::create(&path, self.initial_size)?;

        let nodes = match self.node_mode {
            NodeMode::Compact => {
                let store = with_grow_retry(&mut arena, CompactNodes::create)?;
                with_grow_retry(&mut arena, |a| store.reserve(a, self.reserved_nodes))?;
                Nodes::Compact(store)
            }
            NodeMode::Sparse => {
                let store = with_grow_retry(&mut arena, SparseNodes::create)?;
                if self.reserved_nodes > 0 {
                    with_grow_retry(&mut arena, |a| store.reserve(a, self.reserved_nodes))?;
                }
                Nodes::Sparse(store)
            }
        };

        let ways = with_grow_retry(&mut arena, WayStore::create)?;
        if self.reserved_ways > 0 {
            with_grow_retry(&mut arena, |a| ways.reserve(a, self.reserved_ways))?;
        }

        let relations = with_grow_retry(&mut arena, RelationStore::create)?;
        let osm_generated =
            with_grow_retry(&mut arena, |a| GeneratedStore::create(a, RootId::OsmGenerated))?;
        let shp_generated =
            with_grow_retry(&mut arena, |a| GeneratedStore::create(a, RootId::ShpGenerated))?;

        Ok(OsmStore {
            arena,
            nodes,
            ways,
            relations,
            osm_generated,
            shp_generated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_one_gigabyte_and_compact_nodes() {
        let builder = OsmStoreBuilder::new();
        assert_eq!(builder.initial_size, 1_024_000_000);
        assert!(matches!(builder.node_mode, NodeMode::Compact));
        assert_eq!(builder.reserved_nodes, 0);
        assert_eq!(builder.reserved_ways, 0);
    }

    #[test]
    fn open_without_a_path_is_an_error() {
        let err = OsmStoreBuilder::new().open().unwrap_err();
        assert!(err.to_string().contains("path"));
    }
}
