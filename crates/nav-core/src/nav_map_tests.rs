//! Map-level scenarios: solving under hazards, hazard placement and area
//! resolution

use std::sync::Arc;
use std::thread;

use glam::Vec3;

use crate::area::{AreaHandle, Direction, NavArea};
use crate::config::NavConfig;
use crate::cost_model::CostContext;
use crate::hazard::{HazardEntry, HazardReason};
use crate::nav_map::NavMap;
use crate::nav_mesh::NavMesh;
use crate::path_graph::PathOutcome;
use crate::status::Status;
use crate::test_mesh_helpers::{create_grid_mesh, create_two_area_mesh, WallTrace, TEST_SOURCE_SIZE};
use crate::trace::CollisionMask;

fn context(config: &NavConfig) -> CostContext<'_> {
    CostContext::new(config, 10).with_randomize(false)
}

fn stacked_mesh() -> NavMesh {
    let mut lower = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 0.0);
    let upper = NavArea::flat(2, [0.0, 0.0], [100.0, 100.0], 200.0);
    lower.add_connection(Direction::North, 2);
    NavMesh::from_areas(TEST_SOURCE_SIZE, vec![lower, upper])
}

#[test]
fn test_impassable_hazard_is_routed_around() {
    let config = NavConfig::new();
    let map = NavMap::new("grid", create_grid_mesh(3, 3, 100.0));
    map.lock()
        .hazards
        .insert(AreaHandle::new(4), HazardReason::Impassable, 0);

    let outcome = map
        .find_path(&context(&config), AreaHandle::new(0), AreaHandle::new(8))
        .unwrap();
    let PathOutcome::Found(path) = outcome else {
        panic!("expected a path, got {:?}", outcome);
    };
    assert_eq!(path.areas.len(), 5);
    assert!(!path.areas.contains(&AreaHandle::new(4)));
}

#[test]
fn test_impassable_hazard_without_alternative_has_no_solution() {
    let config = NavConfig::new();
    let map = NavMap::new("corridor", create_grid_mesh(3, 1, 100.0));
    map.lock()
        .hazards
        .insert(AreaHandle::new(1), HazardReason::Impassable, 0);

    let outcome = map
        .find_path(&context(&config), AreaHandle::new(0), AreaHandle::new(2))
        .unwrap();
    assert_eq!(outcome, PathOutcome::NoSolution { partial: None });
    assert_eq!(outcome.status(), Status::NoSolution);
}

#[test]
fn test_traced_block_survives_resolve() {
    let config = NavConfig::new();
    let map = NavMap::new("two", create_two_area_mesh(false));
    let (a, b) = (AreaHandle::new(0), AreaHandle::new(1));
    map.lock().edges.record_probe((a, b), false, 1000);

    let outcome = map.find_path(&context(&config), a, b).unwrap();
    assert!(matches!(outcome, PathOutcome::NoSolution { .. }), "got {:?}", outcome);
    assert_eq!(map.lock().edges.cached_passability(&(a, b), 10), Some(false));

    let relaxed = context(&config).with_ignore_traces(true);
    let outcome = map.find_path(&relaxed, a, b).unwrap();
    assert!(matches!(outcome, PathOutcome::Found(_)), "got {:?}", outcome);
    assert_eq!(map.lock().edges.cached_passability(&(a, b), 10), Some(false));

    let outcome = map.find_path(&context(&config), a, b).unwrap();
    assert!(matches!(outcome, PathOutcome::NoSolution { .. }), "got {:?}", outcome);

    let later = CostContext::new(&config, 1000).with_randomize(false);
    let outcome = map.find_path(&later, a, b).unwrap();
    assert!(matches!(outcome, PathOutcome::Found(_)), "got {:?}", outcome);
}

#[test]
fn test_solved_edge_is_not_a_trace_verdict() {
    let config = NavConfig::new();
    let map = NavMap::new("two", create_two_area_mesh(false));
    let (a, b) = (AreaHandle::new(0), AreaHandle::new(1));

    let outcome = map.find_path(&context(&config), a, b).unwrap();
    assert!(matches!(outcome, PathOutcome::Found(_)), "got {:?}", outcome);
    assert_eq!(map.lock().edges.cached_passability(&(a, b), 10), None);
}

#[test]
fn test_hazard_severity_raises_cost_monotonically() {
    let config = NavConfig::new();
    let mut costs = Vec::new();

    for reason in [
        None,
        Some(HazardReason::EnemyNormal),
        Some(HazardReason::SentryLow),
        Some(HazardReason::Sentry),
    ] {
        let map = NavMap::new("pair", create_two_area_mesh(true));
        if let Some(reason) = reason {
            map.lock().hazards.insert(AreaHandle::new(1), reason, 0);
        }
        let outcome = map
            .find_path(&context(&config), AreaHandle::new(0), AreaHandle::new(1))
            .unwrap();
        let PathOutcome::Found(path) = outcome else {
            panic!("expected a path");
        };
        costs.push(path.cost);
    }

    assert!(costs.windows(2).all(|w| w[0] < w[1]), "{:?}", costs);
}

#[test]
fn test_expired_hazard_is_ignored() {
    let config = NavConfig::new();
    let map = NavMap::new("corridor", create_grid_mesh(3, 1, 100.0));
    // Expired at tick 5, queried at tick 10
    map.lock()
        .hazards
        .insert(AreaHandle::new(1), HazardReason::Impassable, 5);

    let outcome = map
        .find_path(&context(&config), AreaHandle::new(0), AreaHandle::new(2))
        .unwrap();
    assert!(matches!(outcome, PathOutcome::Found(_)));

    map.purge_expired(10);
    assert!(map.lock().hazards.is_empty());
}

#[test]
fn test_hazard_around_respects_line_of_sight() {
    let map = NavMap::new("corridor", create_grid_mesh(5, 1, 100.0));
    let origin = Vec3::new(50.0, 50.0, 72.0);
    let entry = HazardEntry::new(HazardReason::Sentry, 0);
    let wall = WallTrace::new(250.0);

    let applied =
        map.apply_hazard_around(&origin, 500.0, entry, CollisionMask::SHOT, true, Some(&wall));
    assert_eq!(applied, 2);
    assert!(map.lock().hazards.get(AreaHandle::new(1)).is_some());
    assert!(map.lock().hazards.get(AreaHandle::new(2)).is_none());

    let applied = map.apply_hazard_around(&origin, 500.0, entry, CollisionMask::SHOT, false, Some(&wall));
    assert_eq!(applied, 5);
}

#[test]
fn test_hazard_around_respects_radius() {
    let map = NavMap::new("corridor", create_grid_mesh(5, 1, 100.0));
    let origin = Vec3::new(50.0, 50.0, 72.0);
    let entry = HazardEntry::new(HazardReason::Sticky, 0);

    let applied = map.apply_hazard_around(&origin, 150.0, entry, CollisionMask::SHOT, true, None);
    assert_eq!(applied, 2);
    assert_eq!(map.lock().hazards.len(), 2);
}

#[test]
fn test_local_origin_prefers_surface_below() {
    let map = NavMap::new("stacked", stacked_mesh());

    // Between floors, contained by neither
    let between = Vec3::new(50.0, 50.0, 100.0);
    assert_eq!(
        map.find_closest_area(&between, true),
        Some(AreaHandle::new(0))
    );

    // Standing on the upper floor is an exact hit
    let on_upper = Vec3::new(50.0, 50.0, 205.0);
    assert_eq!(
        map.find_closest_area(&on_upper, true),
        Some(AreaHandle::new(1))
    );
    assert_eq!(
        map.find_closest_area(&on_upper, false),
        Some(AreaHandle::new(1))
    );
}

#[test]
fn test_outside_footprint_falls_back_to_nearest() {
    let map = NavMap::new("grid", create_grid_mesh(3, 1, 100.0));
    let far = Vec3::new(900.0, 50.0, 0.0);
    assert_eq!(map.find_closest_area(&far, true), Some(AreaHandle::new(2)));
}

#[test]
fn test_empty_map_is_not_ready() {
    let config = NavConfig::new();
    let map = NavMap::new("empty", NavMesh::from_areas(0, Vec::new()));
    assert_eq!(
        map.find_path(&context(&config), AreaHandle::new(0), AreaHandle::new(0)),
        Err(Status::NotReady)
    );
    assert!(map.find_closest_area(&Vec3::ZERO, true).is_none());
}

#[test]
fn test_concurrent_solves_share_state() {
    let map = Arc::new(NavMap::new("grid", create_grid_mesh(8, 8, 100.0)));
    let goal = AreaHandle::new(63);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                let config = NavConfig::new();
                let ctx = CostContext::new(&config, 10).with_randomize(false);
                match map.find_path(&ctx, AreaHandle::new(0), goal) {
                    Ok(PathOutcome::Found(path)) => path.areas.len(),
                    other => panic!("unexpected outcome {:?}", other),
                }
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), 15);
    }
    assert!(!map.lock().edges.is_empty());
}
