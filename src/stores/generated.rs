//! # Generated Geometry Stores
//!
//! Append-only storage for derived geometries — points, linestrings, and
//! multipolygons — materialized during tile generation. Two independent
//! instances exist side by side: one for OSM-derived output and one for
//! shapefile-derived output.
//!
//! ## Record Layouts
//!
//! Every field is one little-endian 64-bit word; coordinates are stored as
//! raw `f64` bits. Handles address the first word of a record.
//!
//! ```text
//! point:         [x][y]
//! linestring:    [len][x, y × len]
//! multipolygon:  [polys] then per polygon:
//!                [rings][ring len × rings][x, y per ring point]
//!                (ring 0 is the outer ring, the rest are inners)
//! ```
//!
//! ## Handle Stability
//!
//! Records are bump-allocated and never move, so a handle stays valid
//! across unrelated appends and across arena growth. A contiguous vector
//! could not offer this; a deque of segments could, at the cost of a
//! second level of indirection the offset records avoid.
//!
//! Appends allocate exactly once before writing anything, keeping them
//! safe to re-run under the grow-and-retry loop.

use eyre::Result;
use geo::{Coord, LineString, MultiPolygon, Polygon};
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::arena::{Arena, RootId};
use crate::types::Handle;

/// Which of the two generated-geometry stores to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKind {
    Osm,
    Shp,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct GenHeader {
    points: U64,
    linestrings: U64,
    multi_polygons: U64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GeneratedStore {
    root: Handle,
}

impl GeneratedStore {
    pub fn create(arena: &mut Arena, root_id: RootId) -> Result<Self> {
        let root = arena.alloc(std::mem::size_of::<GenHeader>())?;
        arena.set_root(root_id, root);
        Ok(Self { root })
    }

    pub fn store_point(&self, arena: &mut Arena, point: Coord<f64>) -> Result<Handle> {
        let record = arena.alloc(16)?;
        let words = arena.slice_mut::<U64>(record, 2)?;
        words[0] = U64::new(point.x.to_bits());
        words[1] = U64::new(point.y.to_bits());
        let header = arena.get_mut::<GenHeader>(self.root)?;
        header.points = U64::new(header.points.get() + 1);
        Ok(record)
    }

    pub fn store_linestring(&self, arena: &mut Arena, line: &LineString<f64>) -> Result<Handle> {
        let points = &line.0;
        let record = arena.alloc(8 * (1 + 2 * points.len()))?;
        let words = arena.slice_mut::<U64>(record, 1 + 2 * points.len())?;
        words[0] = U64::new(points.len() as u64);
        for (chunk, point) in words[1..].chunks_exact_mut(2).zip(points) {
            chunk[0] = U64::new(point.x.to_bits());
            chunk[1] = U64::new(point.y.to_bits());
        }
        let header = arena.get_mut::<GenHeader>(self.root)?;
        header.linestrings = U64::new(header.linestrings.get() + 1);
        Ok(record)
    }

    pub fn store_multi_polygon(
        &self,
        arena: &mut Arena,
        multi_polygon: &MultiPolygon<f64>,
    ) -> Result<Handle> {
        let words_needed = multi_polygon_words(multi_polygon);
        let record = arena.alloc(8 * words_needed)?;
        let words = arena.slice_mut::<U64>(record, words_needed)?;

        let mut cursor = 0;
        words[cursor] = U64::new(multi_polygon.0.len() as u64);
        cursor += 1;
        for polygon in &multi_polygon.0 {
            let rings = 1 + polygon.interiors().len();
            words[cursor] = U64::new(rings as u64);
            cursor += 1;
            for ring in polygon_rings(polygon) {
                words[cursor] = U64::new(ring.0.len() as u64);
                cursor += 1;
            }
            for ring in polygon_rings(polygon) {
                for point in &ring.0 {
                    words[cursor] = U64::new(point.x.to_bits());
                    words[cursor + 1] = U64::new(point.y.to_bits());
                    cursor += 2;
                }
            }
        }

        let header = arena.get_mut::<GenHeader>(self.root)?;
        header.multi_polygons = U64::new(header.multi_polygons.get() + 1);
        Ok(record)
    }

    /// `(points, linestrings, multipolygons)` appended so far.
    pub fn counts(&self, arena: &Arena) -> Result<(u64, u64, u64)> {
        let header = arena.get::<GenHeader>(self.root)?;
        Ok((
            header.points.get(),
            header.linestrings.get(),
            header.multi_polygons.get(),
        ))
    }
}

pub(crate) fn point_at(arena: &Arena, record: Handle) -> Result<Coord<f64>> {
    let words = arena.slice::<U64>(record, 2)?;
    Ok(Coord {
        x: f64::from_bits(words[0].get()),
        y: f64::from_bits(words[1].get()),
    })
}

pub(crate) fn linestring_at(arena: &Arena, record: Handle) -> Result<LineString<f64>> {
    let len = arena.slice::<U64>(record, 1)?[0].get() as usize;
    let words = arena.slice::<U64>(record.byte_add(8), 2 * len)?;
    Ok(LineString::new(decode_coords(words)))
}

pub(crate) fn multi_polygon_at(arena: &Arena, record: Handle) -> Result<MultiPolygon<f64>> {
    let poly_count = arena.slice::<U64>(record, 1)?[0].get() as usize;
    let mut offset = 8u64;
    let mut polygons = Vec::with_capacity(poly_count);

    for _ in 0..poly_count {
        let rings = arena.slice::<U64>(record.byte_add(offset), 1)?[0].get() as usize;
        offset += 8;
        let ring_lens: Vec<usize> = arena
            .slice::<U64>(record.byte_add(offset), rings)?
            .iter()
            .map(|len| len.get() as usize)
            .collect();
        offset += 8 * rings as u64;

        let mut decoded = Vec::with_capacity(rings);
        for len in ring_lens {
            let words = arena.slice::<U64>(record.byte_add(offset), 2 * len)?;
            decoded.push(LineString::new(decode_coords(words)));
            offset += 16 * len as u64;
        }

        let mut rings_iter = decoded.into_iter();
        let exterior = rings_iter.next().unwrap_or_else(|| LineString::new(vec![]));
        polygons.push(Polygon::new(exterior, rings_iter.collect()));
    }

    Ok(MultiPolygon::new(polygons))
}

fn decode_coords(words: &[U64]) -> Vec<Coord<f64>> {
    words
        .chunks_exact(2)
        .map(|pair| Coord {
            x: f64::from_bits(pair[0].get()),
            y: f64::from_bits(pair[1].get()),
        })
        .collect()
}

fn polygon_rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
}

fn multi_polygon_words(multi_polygon: &MultiPolygon<f64>) -> usize {
    let mut words = 1;
    for polygon in &multi_polygon.0 {
        let rings = 1 + polygon.interiors().len();
        words += 1 + rings;
        words += 2 * polygon_rings(polygon).map(|ring| ring.0.len()).sum::<usize>();
    }
    words
}
