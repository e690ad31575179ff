//! # osmstore - OSM Entity Store and Geometry Assembler
//!
//! osmstore is the in-process data backbone of a vector-tile generator: it
//! ingests an OpenStreetMap extract — nodes, ways, and multipolygon
//! relations — holds the entire dataset in a growable memory-mapped arena,
//! and reconstructs concrete geometries from raw OSM references on demand.
//!
//! ## Quick Start
//!
//! ```ignore
//! use osmstore::OsmStore;
//!
//! let mut store = OsmStore::builder()
//!     .path("./osm.store")
//!     .compact_nodes(80_000_000)
//!     .reserve_ways(10_000_000)
//!     .open()?;
//!
//! // Ingestion (from the PBF parser):
//! store.insert_node(1, 510_000_000, -1_000_000)?;
//! let way = store.insert_way(100, &[1, 2, 3, 4, 1])?;
//!
//! // Assembly (from the tile workers):
//! let polygon = store.way_as_polygon(way)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------+
//! |            Façade (OsmStore)               |
//! |  ingestion API · assembly API · retry loop |
//! +----------------------+---------------------+
//! |    Entity Stores     |  Geometry Assembly  |
//! |  nodes/ways/relations|  stitching, winding |
//! |  generated geometries|  containment        |
//! +----------------------+---------------------+
//! |       Arena (bump alloc, handles,          |
//! |            named roots)                    |
//! +--------------------------------------------+
//! |     Memory-Mapped Backing File             |
//! |     (grow by doubling + remap)             |
//! +--------------------------------------------+
//! ```
//!
//! ## Design Points
//!
//! - **One scratch file**: every entity and derived geometry lives in a
//!   single memory-mapped file, created fresh at startup and removed on
//!   drop. There is no durable format.
//! - **Offsets, not pointers**: the arena doubles and remaps when full, so
//!   the only long-lived references are [`Handle`] offsets, re-resolved on
//!   each dereference. Growth never invalidates a handle.
//! - **Grow-and-retry**: mutations are pre-commit idempotent and run in a
//!   loop that catches allocation failure, doubles the file, and retries.
//! - **Bulk load once, read many**: mutation requires `&mut self`; after
//!   loading, any number of threads may read and assemble concurrently.
//!
//! ## Module Overview
//!
//! - [`arena`]: memory-mapped backing file, bump allocation, handles
//! - `stores`: node / way / relation stores and generated geometries
//! - `geometry`: ring stitching and multipolygon assembly
//! - `store`: the [`OsmStore`] façade and its builder

pub mod arena;
mod geometry;
mod store;
mod stores;
mod types;

pub use store::{OsmStore, OsmStoreBuilder};
pub use stores::GeneratedKind;
pub use types::{Handle, LatpLon, NodeId, StoreError, WayId};
