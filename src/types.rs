//! # Core Types
//!
//! Identifiers, coordinates, handles, and the typed error values shared by
//! every layer of the store.
//!
//! ## Identifiers
//!
//! - [`NodeId`]: 64-bit unsigned OSM node id. In the compact node store it
//!   doubles as a dense array index and must stay below the reservation.
//! - [`WayId`]: 64-bit signed id. Positive values are real OSM ways;
//!   negative values are pseudo-ids synthesized for multipolygon relations.
//!
//! Inside the mapped region ids are stored as the little-endian wrappers
//! [`NodeIdLe`] / [`WayIdLe`], matching the endianness contract every
//! on-arena structure follows; the plain aliases are the in-memory form.
//!
//! ## Coordinates
//!
//! [`LatpLon`] stores a Mercator-projected latitude (`latp`) and a longitude,
//! both as integers in units of 10⁻⁷ degrees. Projection to planar `(x, y)`
//! divides by 10⁷, with `lon` on the x axis and `latp` on the y axis. The
//! pair lives directly in the mapped node slab, so its fields are
//! little-endian `I32`s behind plain-integer accessors.
//!
//! ## Handles
//!
//! A [`Handle`] is a byte offset from the arena base. Offsets survive the
//! detach/extend/remap cycle that raw pointers do not, so handles are the
//! only long-lived reference callers may hold across inserts.
//!
//! ## Errors
//!
//! [`StoreError`] carries the typed failures callers can match on, following
//! the hand-implemented `Display` + `Error` style used elsewhere in the
//! codebase. `OutOfSpace` is internal: the façade's grow-and-retry loop
//! intercepts it and it never reaches the public API.

use geo::Coord;
use zerocopy::little_endian::{I32, I64, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub type NodeId = u64;
pub type WayId = i64;

/// Latp/lon pair in 10⁻⁷-degree integer units.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct LatpLon {
    latp: I32,
    lon: I32,
}

impl LatpLon {
    pub fn new(latp: i32, lon: i32) -> Self {
        Self {
            latp: I32::new(latp),
            lon: I32::new(lon),
        }
    }

    pub fn latp(self) -> i32 {
        self.latp.get()
    }

    pub fn lon(self) -> i32 {
        self.lon.get()
    }

    /// Projects to planar coordinates: `x = lon / 1e7`, `y = latp / 1e7`.
    pub fn to_xy(self) -> Coord<f64> {
        Coord {
            x: self.lon.get() as f64 / 10_000_000.0,
            y: self.latp.get() as f64 / 10_000_000.0,
        }
    }
}

impl Default for LatpLon {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Little-endian node id as stored in way records.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub(crate) struct NodeIdLe(U64);

impl NodeIdLe {
    pub fn new(id: NodeId) -> Self {
        Self(U64::new(id))
    }

    pub fn get(self) -> NodeId {
        self.0.get()
    }
}

/// Little-endian way id as stored in relation records.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub(crate) struct WayIdLe(I64);

impl WayIdLe {
    pub fn new(id: WayId) -> Self {
        Self(I64::new(id))
    }

    pub fn get(self) -> WayId {
        self.0.get()
    }
}

/// Opaque arena-relative reference to a stored value.
///
/// Handles are byte offsets from the arena base, so they remain valid across
/// arena growth. They are only meaningful for the store that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn from_offset(offset: u64) -> Self {
        Self(offset)
    }

    pub(crate) fn offset(self) -> u64 {
        self.0
    }

    /// Handle `delta` bytes past this one. Used to address the body of a
    /// length-prefixed record.
    pub(crate) fn byte_add(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The arena bump allocator is exhausted. Intercepted by the façade's
    /// grow-and-retry loop; never surfaced to callers.
    OutOfSpace { requested: usize },
    /// Compact node store: the id lies beyond the reservation.
    NodeOutOfRange { id: NodeId, reserved: u64 },
    /// Sparse node store: the id was never inserted.
    NodeNotFound { id: NodeId },
    WayNotFound { id: WayId },
    RelationNotFound { id: WayId },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::OutOfSpace { requested } => {
                write!(f, "arena out of space: {} bytes requested", requested)
            }
            StoreError::NodeOutOfRange { id, reserved } => {
                write!(
                    f,
                    "node {} out of range: reservation holds {} nodes",
                    id, reserved
                )
            }
            StoreError::NodeNotFound { id } => write!(f, "could not find node {}", id),
            StoreError::WayNotFound { id } => write!(f, "could not find way {}", id),
            StoreError::RelationNotFound { id } => write!(f, "could not find relation {}", id),
        }
    }
}

impl std::error::Error for StoreError {}
