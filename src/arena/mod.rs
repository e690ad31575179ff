//! # Arena Module
//!
//! A growable memory-mapped arena that holds every OSM entity and derived
//! geometry in the store. All data lives in one scratch file, mapped into
//! the process address space and extended by doubling whenever an
//! allocation fails.
//!
//! ## Architecture Overview
//!
//! ```text
//! +--------------------------------------------------+
//! |  ArenaHeader (128 B): magic, capacity, cursor,   |
//! |  named container roots                           |
//! +--------------------------------------------------+
//! |  Bump-allocated records: node slabs, hash table  |
//! |  slots, way/relation records, geometry records   |
//! |  ... grows toward capacity ...                   |
//! +--------------------------------------------------+
//! ```
//!
//! ## Safety Model
//!
//! Growing remaps the file, which invalidates every reference into the old
//! mapping. Instead of runtime schemes (hazard pointers, epochs, refcounts)
//! the arena relies on the borrow checker: `grow()` takes `&mut self`, so a
//! live `&[u8]` into the mapping is a compile error at the grow site. The
//! only references that cross a grow are [`Handle`](crate::Handle) offsets,
//! re-resolved against the current base on every dereference.
//!
//! ## Resize-Retry Protocol
//!
//! Mutations that may allocate run under [`with_grow_retry`]: attempt the
//! operation, and on `OutOfSpace` double the file, remap, and retry. The
//! stores keep their arena state reachable from a root-registry offset, so
//! nothing needs rebinding after a remap. Failures other than `OutOfSpace`
//! propagate unchanged.
//!
//! ## Module Organization
//!
//! - `mmap`: the mapped backing file (`MappedFile`)
//! - `alloc`: bump allocation, handles, roots (`Arena`)

mod alloc;
mod mmap;

pub use alloc::{Arena, ARENA_HEADER_SIZE, ARENA_MAGIC, CURRENT_VERSION, DEFAULT_ARENA_SIZE};
pub use mmap::MappedFile;

pub(crate) use alloc::{with_grow_retry, RootId};
