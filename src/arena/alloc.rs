//! # Arena Allocation
//!
//! A bump allocator over the mapped backing file, plus the position-
//! independent machinery the entity stores are built on: handles, typed
//! dereference, and the named-root registry.
//!
//! ## Header Layout
//!
//! The first 128 bytes of the mapping hold the arena header:
//!
//! ```text
//! Offset  Size  Description
//! ------  ----  -----------------------------------------
//! 0       16    magic bytes
//! 16      4     version
//! 20      4     root_count
//! 24      8     capacity: Mapped size in bytes
//! 32      8     used: Bump cursor (next free offset)
//! 40      72    roots: One anchor offset per RootId (0 = unset)
//! 112     16    reserved
//! ```
//!
//! The in-memory `Arena` struct is authoritative; the header is mirrored
//! into the mapping after every mutation so the file is inspectable. The
//! file is scratch and never re-read on startup, so the mirror is purely
//! diagnostic.
//!
//! ## Allocation Discipline
//!
//! - Allocations are 8-byte aligned and never freed individually; the
//!   whole region is discarded at teardown.
//! - The file is extended with `set_len`, so untouched regions read as
//!   zeros and every fresh allocation starts zeroed.
//! - `alloc` fails with [`StoreError::OutOfSpace`] when the cursor would
//!   pass capacity. Callers run inside [`with_grow_retry`], which doubles
//!   the file and retries; any other error propagates.
//!
//! ## Roots
//!
//! boost's `managed_mapped_file` lets containers be re-found by string name
//! after a remap. Here the set of containers is closed, so the registry is
//! a fixed table indexed by [`RootId`]: each store records the offset of
//! its anchor struct once and re-resolves everything else from there.

use std::path::Path;

use eyre::{ensure, Result};
use tracing::info;
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::mmap::MappedFile;
use crate::types::{Handle, StoreError};

pub const ARENA_MAGIC: &[u8; 16] = b"osmstore arena\x00\x00";
pub const CURRENT_VERSION: u32 = 1;
pub const ARENA_HEADER_SIZE: usize = 128;

/// Default initial arena size: 1 GB, grown by doubling as needed.
pub const DEFAULT_ARENA_SIZE: u64 = 1_024_000_000;

/// Anchors of the named sub-containers inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootId {
    Nodes = 0,
    Ways = 1,
    Relations = 2,
    OsmGenerated = 3,
    ShpGenerated = 4,
}

pub(crate) const ROOT_COUNT: usize = 5;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct ArenaHeader {
    magic: [u8; 16],
    version: U32,
    root_count: U32,
    capacity: U64,
    used: U64,
    roots: [U64; 9],
    reserved: [u8; 16],
}

const _: () = assert!(std::mem::size_of::<ArenaHeader>() == ARENA_HEADER_SIZE);

#[derive(Debug)]
pub struct Arena {
    file: MappedFile,
    used: u64,
    roots: [u64; ROOT_COUNT],
}

impl Arena {
    pub fn create<P: AsRef<Path>>(path: P, initial_size: u64) -> Result<Self> {
        ensure!(
            initial_size as usize > ARENA_HEADER_SIZE,
            "initial arena size {} cannot fit the arena header",
            initial_size
        );

        let file = MappedFile::create(path, initial_size)?;
        let mut arena = Self {
            file,
            used: ARENA_HEADER_SIZE as u64,
            roots: [0; ROOT_COUNT],
        };
        arena.sync_header();
        Ok(arena)
    }

    /// Doubles the mapped region. Offsets issued before the call remain
    /// valid; references do not (enforced by `&mut self`).
    pub fn grow(&mut self) -> Result<()> {
        let new_size = self.capacity() * 2;
        info!(
            new_size_mb = new_size / 1_000_000,
            "resizing osm store arena"
        );
        self.file.grow(new_size)?;
        self.sync_header();
        Ok(())
    }

    pub fn capacity(&self) -> u64 {
        self.file.size()
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Bump-allocates `len` bytes, 8-byte aligned. The returned region is
    /// zeroed (fresh file space is never reused).
    pub(crate) fn alloc(&mut self, len: usize) -> Result<Handle, StoreError> {
        let offset = align_up(self.used, 8);
        let end = offset
            .checked_add(len as u64)
            .ok_or(StoreError::OutOfSpace { requested: len })?;
        if end > self.capacity() {
            return Err(StoreError::OutOfSpace { requested: len });
        }
        self.used = end;
        self.sync_header();
        Ok(Handle::from_offset(offset))
    }

    pub(crate) fn root(&self, id: RootId) -> Option<Handle> {
        let offset = self.roots[id as usize];
        (offset != 0).then(|| Handle::from_offset(offset))
    }

    pub(crate) fn set_root(&mut self, id: RootId, handle: Handle) {
        self.roots[id as usize] = handle.offset();
        self.sync_header();
    }

    pub(crate) fn bytes(&self, handle: Handle, len: usize) -> Result<&[u8]> {
        let (start, end) = self.check_range(handle, len)?;
        Ok(&self.file.bytes()[start..end])
    }

    pub(crate) fn bytes_mut(&mut self, handle: Handle, len: usize) -> Result<&mut [u8]> {
        let (start, end) = self.check_range(handle, len)?;
        Ok(&mut self.file.bytes_mut()[start..end])
    }

    pub(crate) fn get<T>(&self, handle: Handle) -> Result<&T>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let bytes = self.bytes(handle, std::mem::size_of::<T>())?;
        T::ref_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to read arena value at {:?}: {:?}", handle, e))
    }

    pub(crate) fn get_mut<T>(&mut self, handle: Handle) -> Result<&mut T>
    where
        T: FromBytes + IntoBytes + KnownLayout + Immutable,
    {
        let bytes = self.bytes_mut(handle, std::mem::size_of::<T>())?;
        T::mut_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to read arena value at {:?}: {:?}", handle, e))
    }

    pub(crate) fn slice<T>(&self, handle: Handle, count: usize) -> Result<&[T]>
    where
        T: FromBytes + KnownLayout + Immutable,
    {
        let bytes = self.bytes(handle, count * std::mem::size_of::<T>())?;
        <[T]>::ref_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to read arena slice at {:?}: {:?}", handle, e))
    }

    pub(crate) fn slice_mut<T>(&mut self, handle: Handle, count: usize) -> Result<&mut [T]>
    where
        T: FromBytes + IntoBytes + KnownLayout + Immutable,
    {
        let bytes = self.bytes_mut(handle, count * std::mem::size_of::<T>())?;
        <[T]>::mut_from_bytes(bytes)
            .map_err(|e| eyre::eyre!("failed to read arena slice at {:?}: {:?}", handle, e))
    }

    fn check_range(&self, handle: Handle, len: usize) -> Result<(usize, usize)> {
        let start = handle.offset();
        let end = start
            .checked_add(len as u64)
            .ok_or_else(|| eyre::eyre!("arena range overflow at {:?}", handle))?;
        ensure!(
            start >= ARENA_HEADER_SIZE as u64 && end <= self.used,
            "handle {:?} with length {} is outside the allocated arena (used={})",
            handle,
            len,
            self.used
        );
        Ok((start as usize, end as usize))
    }

    fn sync_header(&mut self) {
        let mut roots = [U64::new(0); 9];
        for (slot, &offset) in roots.iter_mut().zip(self.roots.iter()) {
            *slot = U64::new(offset);
        }
        let header = ArenaHeader {
            magic: *ARENA_MAGIC,
            version: U32::new(CURRENT_VERSION),
            root_count: U32::new(ROOT_COUNT as u32),
            capacity: U64::new(self.file.size()),
            used: U64::new(self.used),
            roots,
            reserved: [0u8; 16],
        };
        self.file.bytes_mut()[..ARENA_HEADER_SIZE].copy_from_slice(header.as_bytes());
    }
}

/// Runs `op` against the arena, doubling the mapped region and retrying on
/// [`StoreError::OutOfSpace`]. Any other failure propagates.
///
/// Operations run under this loop must be pre-commit idempotent: every
/// fallible allocation happens before the first observable state change, so
/// a retried attempt starts from the same visible state. Space claimed by
/// an aborted attempt is simply never referenced again.
pub(crate) fn with_grow_retry<T, F>(arena: &mut Arena, mut op: F) -> Result<T>
where
    F: FnMut(&mut Arena) -> Result<T>,
{
    loop {
        match op(arena) {
            Ok(value) => return Ok(value),
            Err(report) => match report.downcast_ref::<StoreError>() {
                Some(StoreError::OutOfSpace { .. }) => arena.grow()?,
                _ => return Err(report),
            },
        }
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    (offset + align - 1) & !(align - 1)
}
