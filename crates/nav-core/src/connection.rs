//! Traversal geometry for a directed edge between two areas
//!
//! [`determine_points`] finds where to cross from one area into the next and
//! [`handle_dropdown`] classifies the vertical transition, refining ledge
//! positions with ground probes when the edge requires a drop.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use nav_common::clamp;

use crate::area::NavArea;
use crate::trace::{ground_z, TraceService};

pub const PLAYER_WIDTH: f32 = 49.0;
pub const HALF_PLAYER_WIDTH: f32 = PLAYER_WIDTH / 2.0;
pub const PLAYER_HEIGHT: f32 = 83.0;
pub const PLAYER_CROUCHED_JUMP_HEIGHT: f32 = 72.0;
pub const PLAYER_JUMP_HEIGHT: f32 = 50.0;

/// Height loss tolerated without treating the edge as a drop
pub const SMALL_DROP_GRACE: f32 = 18.0;

const EDGE_PADDING: f32 = 8.0;
const LEDGE_PROBE_COUNT: usize = 8;

/// Key points of an edge traversal
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NavPoints {
    /// Center of the current area
    pub current: Vec3,
    /// Crossing point on the current area
    pub center: Vec3,
    /// Crossing point projected onto the next area
    pub center_next: Vec3,
    /// Center of the next area
    pub next: Vec3,
}

/// Drop or climb annotation for an edge
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DropdownHint {
    pub adjusted_pos: Vec3,
    pub requires_drop: bool,
    pub drop_height: f32,
    pub approach_distance: f32,
    pub approach_dir: Vec3,
}

/// Picks a crossing point aligned with one of the area centers
pub fn determine_points(current: &NavArea, next: &NavArea) -> NavPoints {
    let current_center = current.center();
    let next_center = next.center();

    let current_closest = current.nearest_point(next_center.x, next_center.y);
    let next_closest = next.nearest_point(current_center.x, current_center.y);

    let mut closest = current_closest;
    let aligned = closest.x == current_center.x
        || closest.y == current_center.y
        || closest.x == next_center.x
        || closest.y == next_center.y;
    if !aligned {
        closest = next_closest;
        closest.z = current.nearest_point(next_closest.x, next_closest.y).z;
    }

    let center_next = next.nearest_point(closest.x, closest.y);

    NavPoints {
        current: current_center,
        center: closest,
        center_next,
        next: next_center,
    }
}

/// Classifies the transition from `current_pos` to `next_pos`
///
/// Drops push the crossing point forward toward the ledge; climbs pull it back
/// to give a run-up. Ground probes through `trace`, when available, locate the
/// real ledge edge.
pub fn handle_dropdown(
    trace: Option<&dyn TraceService>,
    current_pos: Vec3,
    next_pos: Vec3,
    is_one_way: bool,
) -> DropdownHint {
    let mut hint = DropdownHint {
        adjusted_pos: current_pos,
        ..Default::default()
    };

    let to_target = next_pos - current_pos;
    let height_diff = to_target.z;
    let horizontal = Vec3::new(to_target.x, to_target.y, 0.0);
    let horizontal_len = horizontal.length();

    if height_diff < 0.0 {
        let drop = -height_diff;
        if drop <= SMALL_DROP_GRACE || horizontal_len <= 1.0 {
            return hint;
        }

        let dir = horizontal / horizontal_len;
        hint.requires_drop = true;
        hint.drop_height = drop;
        hint.approach_dir = dir;

        let desired = clamp(drop * 0.5, PLAYER_WIDTH * 0.85, PLAYER_WIDTH * 2.5);
        let max_advance = (horizontal_len - EDGE_PADDING).max(0.0);
        let mut approach = if max_advance > 0.0 {
            desired.min(max_advance)
        } else {
            desired.min(horizontal_len * 0.8)
        };

        let (min_ratio, min_width) = if is_one_way {
            (0.35, PLAYER_WIDTH * 0.5)
        } else {
            (0.5, PLAYER_WIDTH * 0.75)
        };
        let min_advance = (horizontal_len * 0.95).min(min_width.max(horizontal_len * min_ratio));
        approach = approach.max(min_advance).min(horizontal_len * 0.95);
        hint.approach_distance = approach.max(0.0);
        hint.adjusted_pos = on_plane(current_pos, dir, hint.approach_distance);

        if let Some(trace) = trace {
            refine_ledge(trace, &mut hint, current_pos, dir, drop, horizontal_len);
        }
    } else if !is_one_way && height_diff > 0.0 && horizontal_len > 1.0 {
        let dir = horizontal / horizontal_len;
        let retreat = clamp(height_diff * 0.35, PLAYER_WIDTH * 0.3, PLAYER_WIDTH);
        hint.adjusted_pos = on_plane(current_pos, -dir, retreat);
        hint.approach_dir = -dir;
        hint.approach_distance = retreat;
    }

    hint
}

fn on_plane(origin: Vec3, dir: Vec3, dist: f32) -> Vec3 {
    let mut p = origin + dir * dist;
    p.z = origin.z;
    p
}

fn refine_ledge(
    trace: &dyn TraceService,
    hint: &mut DropdownHint,
    current_pos: Vec3,
    dir: Vec3,
    drop: f32,
    horizontal_len: f32,
) {
    let probe_down = (drop + PLAYER_HEIGHT * 1.5).max(PLAYER_HEIGHT * 2.0);
    let ground = |p: Vec3| ground_z(trace, p, PLAYER_CROUCHED_JUMP_HEIGHT, probe_down);

    let search_start = (horizontal_len * 0.95).min(hint.approach_distance.max(PLAYER_WIDTH * 0.8));
    let search_end = (PLAYER_WIDTH * 0.35)
        .max(search_start - (PLAYER_WIDTH * 2.2).max(horizontal_len * 0.6));
    let step = clamp(PLAYER_WIDTH * 0.45, 14.0, 28.0);

    for i in 0..=LEDGE_PROBE_COUNT {
        let t = i as f32 / LEDGE_PROBE_COUNT as f32;
        let dist = search_start + (search_end - search_start) * t;

        let candidate = on_plane(current_pos, dir, dist);
        let ahead = on_plane(current_pos, dir, (dist + step).min(horizontal_len * 0.99));

        let Some(ground_here) = ground(candidate) else {
            continue;
        };
        if current_pos.z - ground_here > PLAYER_JUMP_HEIGHT {
            continue;
        }

        let edge_found = match ground(ahead) {
            None => true,
            Some(ground_ahead) => ground_here - ground_ahead >= (drop * 0.35).max(16.0),
        };
        if edge_found {
            hint.approach_distance = dist;
            hint.adjusted_pos = candidate;
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::MeshGroundTrace;
    use crate::test_mesh_helpers::create_ledge_mesh;

    #[test]
    fn test_points_on_shared_edge() {
        let a = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 0.0);
        let b = NavArea::flat(2, [100.0, 0.0], [200.0, 100.0], 0.0);
        let points = determine_points(&a, &b);
        assert_eq!(points.current, Vec3::new(50.0, 50.0, 0.0));
        assert_eq!(points.center, Vec3::new(100.0, 50.0, 0.0));
        assert_eq!(points.center_next, Vec3::new(100.0, 50.0, 0.0));
        assert_eq!(points.next, Vec3::new(150.0, 50.0, 0.0));
    }

    #[test]
    fn test_diagonal_neighbor_uses_next_projection() {
        let a = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 0.0);
        let b = NavArea::flat(2, [100.0, 100.0], [150.0, 300.0], 0.0);
        let points = determine_points(&a, &b);
        // Next area's nearest point to (50,50) is its corner (100,100)
        assert_eq!(points.center, Vec3::new(100.0, 100.0, 0.0));
    }

    #[test]
    fn test_level_edge_has_no_hint() {
        let hint = handle_dropdown(None, Vec3::ZERO, Vec3::new(100.0, 0.0, -10.0), false);
        assert!(!hint.requires_drop);
        assert_eq!(hint.adjusted_pos, Vec3::ZERO);
    }

    #[test]
    fn test_drop_pushes_forward() {
        let hint = handle_dropdown(None, Vec3::ZERO, Vec3::new(200.0, 0.0, -100.0), true);
        assert!(hint.requires_drop);
        assert_eq!(hint.drop_height, 100.0);
        assert_eq!(hint.approach_dir, Vec3::X);
        // clamp(50, 41.65, 122.5) = 50, raised to 200 * 0.35 = 70
        assert!((hint.approach_distance - 70.0).abs() < 1e-3);
        assert_eq!(hint.adjusted_pos.z, 0.0);
    }

    #[test]
    fn test_climb_retreats() {
        let hint = handle_dropdown(None, Vec3::ZERO, Vec3::new(100.0, 0.0, 40.0), false);
        assert!(!hint.requires_drop);
        assert!((hint.approach_distance - 14.7).abs() < 1e-3);
        assert!(hint.adjusted_pos.x < 0.0);
        // One-way climbs get no run-up
        let one_way = handle_dropdown(None, Vec3::ZERO, Vec3::new(100.0, 0.0, 40.0), true);
        assert_eq!(one_way.approach_distance, 0.0);
    }

    #[test]
    fn test_ledge_probe_finds_edge() {
        // Upper floor ends at x = 100, lower floor 120 units below
        let mesh = create_ledge_mesh();
        let trace = MeshGroundTrace::new(&mesh);
        let start = Vec3::new(50.0, 50.0, 120.0);
        let end = Vec3::new(250.0, 50.0, 0.0);
        let hint = handle_dropdown(Some(&trace), start, end, true);
        assert!(hint.requires_drop);
        // The chosen candidate stands on the upper floor with a hole ahead
        assert!(hint.adjusted_pos.x <= 100.0);
        assert!(hint.adjusted_pos.x + clamp(PLAYER_WIDTH * 0.45, 14.0, 28.0) > 100.0);
    }
}
