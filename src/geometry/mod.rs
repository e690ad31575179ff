//! # Geometry Assembly
//!
//! Turns stored OSM references into concrete `geo` geometries: node-id
//! sequences into linestrings and polygons, and stitched ring sets into
//! validated multipolygons.
//!
//! ## Pipeline
//!
//! ```text
//! way ids ──lookup──> node ids ──stitch──> rings ──project──> LineStrings
//!                                                     │
//!                          inner-in-outer containment ▼
//!                                               Polygons ──orient──> MultiPolygon
//! ```
//!
//! Winding follows the geometry library's convention (`Direction::Default`:
//! exteriors counter-clockwise, interiors clockwise). Inner rings are
//! attached to every outer ring that geometrically contains them; with
//! topologically ambiguous data an inner can therefore appear under more
//! than one outer. The containment test runs against the bare outer ring,
//! before any interiors are attached.

pub(crate) mod assemble;

use geo::orient::{Direction, Orient};
use geo::{Contains, LineString, MultiPolygon, Polygon};

pub(crate) use assemble::stitch_rings;

/// Builds the final multipolygon from projected outer and inner rings.
pub(crate) fn build_multi_polygon(
    outer_rings: Vec<LineString<f64>>,
    inner_rings: Vec<LineString<f64>>,
) -> MultiPolygon<f64> {
    let mut polygons = Vec::with_capacity(outer_rings.len());
    for outer in outer_rings {
        let probe = Polygon::new(outer, vec![]);
        let matched: Vec<LineString<f64>> = inner_rings
            .iter()
            .filter(|ring| probe.contains(*ring))
            .cloned()
            .collect();
        let (exterior, _) = probe.into_inner();
        polygons.push(Polygon::new(exterior, matched));
    }
    MultiPolygon::new(polygons).orient(Direction::Default)
}
