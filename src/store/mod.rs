//! # OSM Store Façade
//!
//! [`OsmStore`] is the top-level object: it owns the arena and every store
//! inside it, and exposes the ingestion and assembly APIs the surrounding
//! tile generator uses.
//!
//! ## Data Flow
//!
//! ```text
//! PBF parser ──insert_node/way/relation──> OsmStore ──┐
//!                                                     │ arena
//! tile workers <──linestrings/polygons/multipolygons──┘
//! ```
//!
//! Every mutating operation runs inside the grow-and-retry loop: an
//! allocation failure doubles the backing file, remaps it, and re-runs the
//! operation. Reads never allocate and are not wrapped.
//!
//! ## Concurrency
//!
//! Bulk ingestion is single-writer by construction: mutation takes
//! `&mut self`, so the borrow checker serializes it. Once loading is done
//! and no further mutation occurs, `&self` reads (lookups and assembly)
//! are safe from any number of threads — no resize can happen and the
//! mapped data is immutable from then on.
//!
//! ## Handles
//!
//! `insert_way`, `insert_relation`, and the `store_*` appends return
//! [`Handle`]s: arena offsets that stay valid across growth and are the
//! only reference callers may keep between operations.

mod builder;

pub use builder::OsmStoreBuilder;

use eyre::Result;
use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use tracing::info;

use crate::arena::{with_grow_retry, Arena};
use crate::geometry::{build_multi_polygon, stitch_rings};
use crate::stores::{
    decode_way_ids, entry_at, linestring_at, multi_polygon_at, nodes_at, point_at, GeneratedKind,
    GeneratedStore, Nodes, RelationStore, WayStore,
};
use crate::types::{Handle, LatpLon, NodeId, WayId};

/// In-process store for OSM nodes, ways, and multipolygon relations, with
/// geometry assembly on top. See the [module docs](self) for the data flow
/// and concurrency model.
#[derive(Debug)]
pub struct OsmStore {
    pub(crate) arena: Arena,
    pub(crate) nodes: Nodes,
    pub(crate) ways: WayStore,
    pub(crate) relations: RelationStore,
    pub(crate) osm_generated: GeneratedStore,
    pub(crate) shp_generated: GeneratedStore,
}

impl OsmStore {
    pub fn builder() -> OsmStoreBuilder {
        OsmStoreBuilder::new()
    }

    // ---- ingestion ----------------------------------------------------

    pub fn insert_node(&mut self, id: NodeId, latp: i32, lon: i32) -> Result<()> {
        let nodes = self.nodes;
        with_grow_retry(&mut self.arena, |arena| {
            nodes.insert(arena, id, LatpLon::new(latp, lon))
        })
    }

    /// Stores the node sequence of a way and returns a handle to it.
    pub fn insert_way(&mut self, id: WayId, node_ids: &[NodeId]) -> Result<Handle> {
        let ways = self.ways;
        with_grow_retry(&mut self.arena, |arena| ways.insert(arena, id, node_ids))
    }

    /// Stores a multipolygon relation's outer and inner way-id lists and
    /// returns a handle to the pair.
    pub fn insert_relation(
        &mut self,
        id: WayId,
        outer: &[WayId],
        inner: &[WayId],
    ) -> Result<Handle> {
        let relations = self.relations;
        with_grow_retry(&mut self.arena, |arena| {
            relations.insert_front(arena, id, outer, inner)
        })
    }

    // ---- lookups ------------------------------------------------------

    pub fn lookup_node(&self, id: NodeId) -> Result<LatpLon> {
        self.nodes.lookup(&self.arena, id)
    }

    pub fn contains_node(&self, id: NodeId) -> Result<bool> {
        self.nodes.contains(&self.arena, id)
    }

    pub fn node_count(&self) -> Result<u64> {
        self.nodes.len(&self.arena)
    }

    /// Node-id sequence of the way stored under `id`.
    pub fn way_nodes(&self, id: WayId) -> Result<Vec<NodeId>> {
        self.ways.lookup(&self.arena, id)
    }

    pub fn contains_way(&self, id: WayId) -> Result<bool> {
        self.ways.contains(&self.arena, id)
    }

    pub fn way_count(&self) -> Result<u64> {
        self.ways.len(&self.arena)
    }

    /// `(outer, inner)` way-id lists of the relation stored under `id`.
    pub fn relation_ways(&self, id: WayId) -> Result<(Vec<WayId>, Vec<WayId>)> {
        self.relations.lookup(&self.arena, id)
    }

    pub fn contains_relation(&self, id: WayId) -> Result<bool> {
        self.relations.contains(&self.arena, id)
    }

    pub fn relation_count(&self) -> Result<u64> {
        self.relations.len(&self.arena)
    }

    // ---- geometry assembly --------------------------------------------

    /// Resolves a way handle into a projected linestring, one point per
    /// stored node id, in order.
    pub fn way_as_linestring(&self, way: Handle) -> Result<LineString<f64>> {
        let node_ids = decode_node_ids(&self.arena, way)?;
        Ok(LineString::new(self.projected_points(&node_ids)?))
    }

    /// Resolves a way handle into a polygon with corrected winding. The
    /// caller is responsible for supplying a closed way; an open sequence
    /// is closed implicitly and may self-intersect.
    pub fn way_as_polygon(&self, way: Handle) -> Result<Polygon<f64>> {
        let node_ids = decode_node_ids(&self.arena, way)?;
        let exterior = LineString::new(self.projected_points(&node_ids)?);
        Ok(Polygon::new(exterior, vec![]).orient(Direction::Default))
    }

    pub fn way_is_closed(&self, way: Handle) -> Result<bool> {
        let node_ids = nodes_at(&self.arena, way)?;
        Ok(node_ids.is_empty() || node_ids.first() == node_ids.last())
    }

    /// Assembles the multipolygon for a stored relation: stitches its way
    /// fragments into rings, attaches inner rings to the outer rings that
    /// contain them, and canonicalizes winding.
    pub fn relation_as_multipolygon(&self, relation: Handle) -> Result<MultiPolygon<f64>> {
        let (outer, inner) = entry_at(&self.arena, relation)?;
        let (outer, inner) = (decode_way_ids(outer), decode_way_ids(inner));
        self.multipolygon_from_ways(&outer, &inner)
    }

    /// Multipolygon assembly from explicit outer and inner way-id lists.
    /// Dangling way references surface here as `WayNotFound`.
    pub fn multipolygon_from_ways(
        &self,
        outer: &[WayId],
        inner: &[WayId],
    ) -> Result<MultiPolygon<f64>> {
        if outer.is_empty() {
            return Ok(MultiPolygon::new(vec![]));
        }
        let outer_rings = self.stitched_rings(outer)?;
        let inner_rings = self.stitched_rings(inner)?;
        Ok(build_multi_polygon(outer_rings, inner_rings))
    }

    /// Outer ring of the first polygon of the assembled relation, as a
    /// linestring. Using a relation as a linestring is not meaningful for
    /// tiles, but scripted styles may ask for it.
    pub fn relation_as_linestring(&self, relation: Handle) -> Result<LineString<f64>> {
        let multi = self.relation_as_multipolygon(relation)?;
        Ok(multi
            .0
            .first()
            .map(|polygon| polygon.exterior().clone())
            .unwrap_or_else(|| LineString::new(vec![])))
    }

    // ---- generated geometries ------------------------------------------

    pub fn store_point(&mut self, kind: GeneratedKind, point: Coord<f64>) -> Result<Handle> {
        let store = self.generated(kind);
        with_grow_retry(&mut self.arena, |arena| store.store_point(arena, point))
    }

    pub fn store_linestring(
        &mut self,
        kind: GeneratedKind,
        line: &LineString<f64>,
    ) -> Result<Handle> {
        let store = self.generated(kind);
        with_grow_retry(&mut self.arena, |arena| store.store_linestring(arena, line))
    }

    pub fn store_multi_polygon(
        &mut self,
        kind: GeneratedKind,
        multi_polygon: &MultiPolygon<f64>,
    ) -> Result<Handle> {
        let store = self.generated(kind);
        with_grow_retry(&mut self.arena, |arena| {
            store.store_multi_polygon(arena, multi_polygon)
        })
    }

    pub fn retrieve_point(&self, handle: Handle) -> Result<Coord<f64>> {
        point_at(&self.arena, handle)
    }

    pub fn retrieve_linestring(&self, handle: Handle) -> Result<LineString<f64>> {
        linestring_at(&self.arena, handle)
    }

    pub fn retrieve_multi_polygon(&self, handle: Handle) -> Result<MultiPolygon<f64>> {
        multi_polygon_at(&self.arena, handle)
    }

    // ---- maintenance ---------------------------------------------------

    /// Empties the node, way, and relation stores in place. Arena capacity
    /// and reservations are retained for the next load.
    pub fn clear(&mut self) -> Result<()> {
        let (nodes, ways, relations) = (self.nodes, self.ways, self.relations);
        nodes.clear(&mut self.arena)?;
        ways.clear(&mut self.arena)?;
        relations.clear(&mut self.arena)?;
        Ok(())
    }

    /// Currently allocated arena capacity in bytes.
    pub fn memory_size(&self) -> u64 {
        self.arena.capacity()
    }

    /// Logs stored entity and generated geometry counts.
    pub fn report_size(&self) -> Result<()> {
        info!(
            nodes = self.node_count()?,
            ways = self.way_count()?,
            relations = self.relation_count()?,
            "stored entities"
        );
        let (points, linestrings, multi_polygons) = self.osm_generated.counts(&self.arena)?;
        info!(points, linestrings, multi_polygons, "generated osm geometries");
        let (points, linestrings, multi_polygons) = self.shp_generated.counts(&self.arena)?;
        info!(points, linestrings, multi_polygons, "generated shp geometries");
        Ok(())
    }

    // ---- helpers -------------------------------------------------------

    fn generated(&self, kind: GeneratedKind) -> GeneratedStore {
        match kind {
            GeneratedKind::Osm => self.osm_generated,
            GeneratedKind::Shp => self.shp_generated,
        }
    }

    fn projected_points(&self, node_ids: &[NodeId]) -> Result<Vec<Coord<f64>>> {
        node_ids
            .iter()
            .map(|&id| Ok(self.nodes.lookup(&self.arena, id)?.to_xy()))
            .collect()
    }

    /// Resolves and stitches one way-id list into projected rings.
    fn stitched_rings(&self, way_ids: &[WayId]) -> Result<Vec<LineString<f64>>> {
        let resolved = way_ids
            .iter()
            .map(|&id| Ok((id, self.ways.lookup(&self.arena, id)?)))
            .collect::<Result<Vec<(WayId, Vec<NodeId>)>>>()?;
        let borrowed: Vec<(WayId, &[NodeId])> = resolved
            .iter()
            .map(|(id, nodes)| (*id, nodes.as_slice()))
            .collect();
        stitch_rings(&borrowed)
            .into_iter()
            .map(|chain| Ok(LineString::new(self.projected_points(&chain)?)))
            .collect()
    }
}

/// Decoded node-id sequence behind a way handle.
fn decode_node_ids(arena: &Arena, way: Handle) -> Result<Vec<NodeId>> {
    Ok(nodes_at(arena, way)?.iter().map(|id| id.get()).collect())
}
