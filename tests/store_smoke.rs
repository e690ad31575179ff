//! # Store Smoke Test
//!
//! This test file serves as the source of truth for store correctness.
//! It covers the real-life scenarios of a tile-generation run:
//!
//! - Ingestion: nodes, ways, relations, with both node store layouts
//! - Geometry assembly: linestrings, polygons, multipolygon stitching
//! - Ring stitching edge cases: reversed fragments, fragmented rings,
//!   inner-ring containment
//! - Arena growth under load and handle stability across growth
//! - Error surfacing: out-of-range and not-found ids
//! - Lifecycle: clear semantics and backing-file removal
//!
//! If any test fails after making changes, it indicates a regression.
//! Do NOT modify expected values to make tests pass - fix the underlying
//! issue.

use geo::winding_order::{Winding, WindingOrder};
use geo::{Contains, Coord, LineString};
use osmstore::{GeneratedKind, OsmStore, StoreError};
use tempfile::tempdir;

const MB: u64 = 1 << 20;

/// Small compact-node store for geometry tests. Node ids map onto a simple
/// integer grid: coordinate values are degrees × 10⁷.
fn create_test_store(reserved_nodes: u64) -> (OsmStore, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let store = OsmStore::builder()
        .path(dir.path().join("osm.store"))
        .initial_size(4 * MB)
        .compact_nodes(reserved_nodes)
        .open()
        .unwrap();
    (store, dir)
}

fn grid_coord(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

/// Inserts a node whose projected position is `(x, y)` in degrees.
fn insert_grid_node(store: &mut OsmStore, id: u64, x: i32, y: i32) {
    store
        .insert_node(id, y * 10_000_000, x * 10_000_000)
        .unwrap();
}

mod ingestion {
    use super::*;

    #[test]
    fn nodes_roundtrip_through_the_compact_store() {
        let (mut store, _dir) = create_test_store(100);

        store.insert_node(1, 510_000_000, -1_250_000).unwrap();
        let ll = store.lookup_node(1).unwrap();
        assert_eq!((ll.latp(), ll.lon()), (510_000_000, -1_250_000));
        assert!(store.contains_node(1).unwrap());
    }

    #[test]
    fn later_inserts_do_not_disturb_earlier_nodes() {
        let (mut store, _dir) = create_test_store(1000);

        store.insert_node(1, 11, 12).unwrap();
        for id in 2..1000 {
            store.insert_node(id, id as i32, -(id as i32)).unwrap();
        }
        let ll = store.lookup_node(1).unwrap();
        assert_eq!((ll.latp(), ll.lon()), (11, 12));
    }

    #[test]
    fn way_round_trips_match_node_lookups() {
        let (mut store, _dir) = create_test_store(10);
        for id in 1..=4 {
            insert_grid_node(&mut store, id, id as i32, 2 * id as i32);
        }

        let handle = store.insert_way(500, &[1, 2, 3, 4]).unwrap();
        let line = store.way_as_linestring(handle).unwrap();

        let expected: Vec<Coord<f64>> = [1u64, 2, 3, 4]
            .iter()
            .map(|&id| store.lookup_node(id).unwrap().to_xy())
            .collect();
        assert_eq!(line, LineString::new(expected));
        assert_eq!(store.way_nodes(500).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn relations_store_both_way_lists() {
        let (mut store, _dir) = create_test_store(10);

        store
            .insert_relation(-1, &[200, 201], &[300, 301])
            .unwrap();
        let (outer, inner) = store.relation_ways(-1).unwrap();
        assert_eq!(outer, &[200, 201]);
        assert_eq!(inner, &[300, 301]);
        assert_eq!(store.relation_count().unwrap(), 1);
    }

    #[test]
    fn sparse_store_accepts_planet_scale_ids() {
        let dir = tempdir().unwrap();
        let mut store = OsmStore::builder()
            .path(dir.path().join("osm.store"))
            .initial_size(4 * MB)
            .sparse_nodes()
            .open()
            .unwrap();

        store.insert_node(9_000_000_001, 5, 6).unwrap();
        let ll = store.lookup_node(9_000_000_001).unwrap();
        assert_eq!((ll.latp(), ll.lon()), (5, 6));

        let err = store.lookup_node(9_000_000_002).unwrap_err();
        assert_eq!(
            *err.downcast_ref::<StoreError>().unwrap(),
            StoreError::NodeNotFound { id: 9_000_000_002 }
        );
    }
}

mod geometry_assembly {
    use super::*;

    #[test]
    fn single_closed_way_becomes_a_polygon() {
        let (mut store, _dir) = create_test_store(10);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 10, 0);
        insert_grid_node(&mut store, 3, 10, 10);
        insert_grid_node(&mut store, 4, 0, 10);

        let handle = store.insert_way(100, &[1, 2, 3, 4, 1]).unwrap();
        assert!(store.way_is_closed(handle).unwrap());

        let polygon = store.way_as_polygon(handle).unwrap();
        let expected = LineString::new(vec![
            grid_coord(0.0, 0.0),
            grid_coord(10.0, 0.0),
            grid_coord(10.0, 10.0),
            grid_coord(0.0, 10.0),
            grid_coord(0.0, 0.0),
        ]);
        assert_eq!(polygon.exterior(), &expected);
        assert_eq!(
            polygon.exterior().winding_order(),
            Some(WindingOrder::CounterClockwise)
        );
    }

    #[test]
    fn open_way_is_not_closed() {
        let (mut store, _dir) = create_test_store(10);
        for id in 1..=3 {
            insert_grid_node(&mut store, id, id as i32, 0);
        }
        let handle = store.insert_way(101, &[1, 2, 3]).unwrap();
        assert!(!store.way_is_closed(handle).unwrap());
    }

    #[test]
    fn two_way_outer_stitching() {
        let (mut store, _dir) = create_test_store(10);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 10, 0);
        insert_grid_node(&mut store, 3, 10, 10);
        insert_grid_node(&mut store, 4, 0, 10);

        store.insert_way(200, &[1, 2, 3]).unwrap();
        store.insert_way(201, &[3, 4, 1]).unwrap();
        let relation = store.insert_relation(-1, &[200, 201], &[]).unwrap();

        let multi = store.relation_as_multipolygon(relation).unwrap();
        assert_eq!(multi.0.len(), 1);
        let expected = LineString::new(vec![
            grid_coord(0.0, 0.0),
            grid_coord(10.0, 0.0),
            grid_coord(10.0, 10.0),
            grid_coord(0.0, 10.0),
            grid_coord(0.0, 0.0),
        ]);
        assert_eq!(multi.0[0].exterior(), &expected);
        assert!(multi.0[0].interiors().is_empty());
    }

    #[test]
    fn reversed_fragment_joins_through_its_tail() {
        let (mut store, _dir) = create_test_store(10);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 10, 0);
        insert_grid_node(&mut store, 3, 10, 10);
        insert_grid_node(&mut store, 4, 0, 10);

        store.insert_way(300, &[1, 2, 3]).unwrap();
        store.insert_way(301, &[1, 4, 3]).unwrap();

        let multi = store.multipolygon_from_ways(&[300, 301], &[]).unwrap();
        assert_eq!(multi.0.len(), 1);
        // 301 joins reversed: the ring visits 1, 2, 3, 4 and closes.
        let expected = LineString::new(vec![
            grid_coord(0.0, 0.0),
            grid_coord(10.0, 0.0),
            grid_coord(10.0, 10.0),
            grid_coord(0.0, 10.0),
            grid_coord(0.0, 0.0),
        ]);
        assert_eq!(multi.0[0].exterior(), &expected);
    }

    #[test]
    fn inner_ring_lands_inside_its_outer() {
        let (mut store, _dir) = create_test_store(20);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 100, 0);
        insert_grid_node(&mut store, 3, 100, 100);
        insert_grid_node(&mut store, 4, 0, 100);
        insert_grid_node(&mut store, 5, 25, 25);
        insert_grid_node(&mut store, 6, 75, 25);
        insert_grid_node(&mut store, 7, 75, 75);
        insert_grid_node(&mut store, 8, 25, 75);

        store.insert_way(400, &[1, 2, 3]).unwrap();
        store.insert_way(401, &[3, 4, 1]).unwrap();
        store.insert_way(402, &[5, 6, 7, 8, 5]).unwrap();
        let relation = store.insert_relation(-1, &[400, 401], &[402]).unwrap();

        let multi = store.relation_as_multipolygon(relation).unwrap();
        assert_eq!(multi.0.len(), 1);
        let polygon = &multi.0[0];
        assert_eq!(polygon.interiors().len(), 1);

        let bare_outer = geo::Polygon::new(polygon.exterior().clone(), vec![]);
        assert!(bare_outer.contains(&polygon.interiors()[0]));
        assert_eq!(
            polygon.exterior().winding_order(),
            Some(WindingOrder::CounterClockwise)
        );
        assert_eq!(
            polygon.interiors()[0].winding_order(),
            Some(WindingOrder::Clockwise)
        );
    }

    #[test]
    fn assembly_is_idempotent() {
        let (mut store, _dir) = create_test_store(10);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 10, 0);
        insert_grid_node(&mut store, 3, 10, 10);
        insert_grid_node(&mut store, 4, 0, 10);

        store.insert_way(200, &[1, 2, 3]).unwrap();
        store.insert_way(201, &[3, 4, 1]).unwrap();
        let relation = store.insert_relation(-1, &[200, 201], &[]).unwrap();

        let first = store.relation_as_multipolygon(relation).unwrap();
        let second = store.relation_as_multipolygon(relation).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_outer_list_yields_an_empty_multipolygon() {
        let (mut store, _dir) = create_test_store(10);
        let relation = store.insert_relation(-1, &[], &[]).unwrap();
        let multi = store.relation_as_multipolygon(relation).unwrap();
        assert!(multi.0.is_empty());
    }

    #[test]
    fn dangling_way_reference_surfaces_at_assembly_time() {
        let (mut store, _dir) = create_test_store(10);

        // Insertion does not validate references.
        let relation = store.insert_relation(-1, &[999], &[]).unwrap();

        let err = store.relation_as_multipolygon(relation).unwrap_err();
        assert_eq!(
            *err.downcast_ref::<StoreError>().unwrap(),
            StoreError::WayNotFound { id: 999 }
        );
    }

    #[test]
    fn relation_as_linestring_returns_the_first_outer_ring() {
        let (mut store, _dir) = create_test_store(10);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 10, 0);
        insert_grid_node(&mut store, 3, 10, 10);
        insert_grid_node(&mut store, 4, 0, 10);

        store.insert_way(200, &[1, 2, 3, 4, 1]).unwrap();
        let relation = store.insert_relation(-1, &[200], &[]).unwrap();

        let line = store.relation_as_linestring(relation).unwrap();
        assert_eq!(line.0.len(), 5);
        assert_eq!(line.0.first(), line.0.last());
    }
}

mod generated_geometries {
    use super::*;

    #[test]
    fn osm_and_shp_stores_are_independent() {
        let (mut store, _dir) = create_test_store(10);

        let osm = store
            .store_point(GeneratedKind::Osm, grid_coord(1.0, 2.0))
            .unwrap();
        let shp = store
            .store_point(GeneratedKind::Shp, grid_coord(3.0, 4.0))
            .unwrap();

        assert_eq!(store.retrieve_point(osm).unwrap(), grid_coord(1.0, 2.0));
        assert_eq!(store.retrieve_point(shp).unwrap(), grid_coord(3.0, 4.0));
    }

    #[test]
    fn stored_multipolygon_round_trips_through_its_handle() {
        let (mut store, _dir) = create_test_store(20);
        insert_grid_node(&mut store, 1, 0, 0);
        insert_grid_node(&mut store, 2, 100, 0);
        insert_grid_node(&mut store, 3, 100, 100);
        insert_grid_node(&mut store, 4, 0, 100);
        insert_grid_node(&mut store, 5, 25, 25);
        insert_grid_node(&mut store, 6, 75, 25);
        insert_grid_node(&mut store, 7, 75, 75);
        insert_grid_node(&mut store, 8, 25, 75);

        store.insert_way(400, &[1, 2, 3, 4, 1]).unwrap();
        store.insert_way(402, &[5, 6, 7, 8, 5]).unwrap();
        let multi = store.multipolygon_from_ways(&[400], &[402]).unwrap();

        let handle = store.store_multi_polygon(GeneratedKind::Osm, &multi).unwrap();
        assert_eq!(store.retrieve_multi_polygon(handle).unwrap(), multi);
    }

    #[test]
    fn stored_linestring_round_trips() {
        let (mut store, _dir) = create_test_store(10);

        let line = LineString::new(vec![grid_coord(0.0, 0.0), grid_coord(5.5, -2.25)]);
        let handle = store.store_linestring(GeneratedKind::Shp, &line).unwrap();
        assert_eq!(store.retrieve_linestring(handle).unwrap(), line);
    }
}

mod arena_growth {
    use super::*;

    #[test]
    fn reservation_and_bulk_load_grow_a_small_arena() {
        let dir = tempdir().unwrap();
        let mut store = OsmStore::builder()
            .path(dir.path().join("osm.store"))
            .initial_size(MB)
            .compact_nodes(1_000_000)
            .open()
            .unwrap();

        // The 8 MB reservation alone forces at least one doubling.
        assert!(store.memory_size() > MB);

        for id in 0..1_000_000u64 {
            store.insert_node(id, id as i32, -(id as i32)).unwrap();
        }

        assert_eq!(store.node_count().unwrap(), 1_000_000);
        for id in [0u64, 1, 499_999, 999_999] {
            let ll = store.lookup_node(id).unwrap();
            assert_eq!((ll.latp(), ll.lon()), (id as i32, -(id as i32)));
        }
    }

    #[test]
    fn handles_acquired_before_growth_stay_valid() {
        let dir = tempdir().unwrap();
        let mut store = OsmStore::builder()
            .path(dir.path().join("osm.store"))
            .initial_size(MB)
            .sparse_nodes()
            .open()
            .unwrap();

        let way = store.insert_way(1, &[10, 20, 30, 10]).unwrap();
        let relation = store.insert_relation(-1, &[1], &[]).unwrap();
        let point = store
            .store_point(GeneratedKind::Osm, grid_coord(7.5, -7.5))
            .unwrap();
        let size_before = store.memory_size();

        // Enough sparse inserts to force rehashes and arena doublings.
        for id in 0..200_000u64 {
            store.insert_node(id * 1000, id as i32, id as i32).unwrap();
        }
        assert!(store.memory_size() > size_before);

        assert_eq!(store.way_nodes(1).unwrap(), &[10, 20, 30, 10]);
        assert!(store.way_is_closed(way).unwrap());
        let (outer, inner) = store.relation_ways(-1).unwrap();
        assert_eq!(outer, &[1]);
        assert!(inner.is_empty());
        assert_eq!(store.relation_count().unwrap(), 1);
        assert_eq!(store.retrieve_point(point).unwrap(), grid_coord(7.5, -7.5));
        assert_eq!(
            store.relation_as_multipolygon(relation).unwrap().0.len(),
            1
        );
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn compact_insert_beyond_reservation_fails_without_side_effects() {
        let (mut store, _dir) = create_test_store(100);
        store.insert_node(50, 1, 2).unwrap();

        let err = store.insert_node(200, 3, 4).unwrap_err();
        assert_eq!(
            *err.downcast_ref::<StoreError>().unwrap(),
            StoreError::NodeOutOfRange {
                id: 200,
                reserved: 100
            }
        );
        assert!(err.to_string().contains("200"));

        // Prior state is untouched.
        let ll = store.lookup_node(50).unwrap();
        assert_eq!((ll.latp(), ll.lon()), (1, 2));
        assert_eq!(store.node_count().unwrap(), 100);
    }

    #[test]
    fn compact_lookup_beyond_reservation_fails() {
        let (store, _dir) = create_test_store(100);
        assert!(store.lookup_node(100).is_err());
        assert!(!store.contains_node(100).unwrap());
    }

    #[test]
    fn unwritten_compact_slots_read_as_zero() {
        let (store, _dir) = create_test_store(100);
        let ll = store.lookup_node(42).unwrap();
        assert_eq!((ll.latp(), ll.lon()), (0, 0));
    }

    #[test]
    fn missing_way_lookup_carries_the_id() {
        let (store, _dir) = create_test_store(10);
        let err = store.way_nodes(12345).unwrap_err();
        assert!(err.to_string().contains("12345"));
    }
}

mod lifecycle {
    use super::*;

    #[test]
    fn clear_empties_entity_stores_and_keeps_capacity() {
        let dir = tempdir().unwrap();
        let mut store = OsmStore::builder()
            .path(dir.path().join("osm.store"))
            .initial_size(4 * MB)
            .sparse_nodes()
            .open()
            .unwrap();

        store.insert_node(1, 1, 1).unwrap();
        store.insert_way(2, &[1, 1]).unwrap();
        store.insert_relation(-3, &[2], &[]).unwrap();
        let capacity_before = store.memory_size();

        store.clear().unwrap();

        assert_eq!(store.node_count().unwrap(), 0);
        assert_eq!(store.way_count().unwrap(), 0);
        assert_eq!(store.relation_count().unwrap(), 0);
        assert_eq!(store.memory_size(), capacity_before);

        // The store is reusable after a clear.
        store.insert_node(1, 9, 9).unwrap();
        let ll = store.lookup_node(1).unwrap();
        assert_eq!((ll.latp(), ll.lon()), (9, 9));
    }

    #[test]
    fn backing_file_is_removed_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("osm.store");
        let store = OsmStore::builder()
            .path(&path)
            .initial_size(MB)
            .sparse_nodes()
            .open()
            .unwrap();

        assert!(path.exists());
        drop(store);
        assert!(!path.exists());
    }

    #[test]
    fn builder_requires_a_path() {
        assert!(OsmStore::builder().open().is_err());
    }

    #[test]
    fn report_size_succeeds() {
        let (mut store, _dir) = create_test_store(10);
        store
            .store_point(GeneratedKind::Osm, grid_coord(0.0, 0.0))
            .unwrap();
        store.report_size().unwrap();
    }
}
