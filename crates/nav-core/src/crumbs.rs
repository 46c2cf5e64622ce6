//! Waypoint ("crumb") synthesis
//!
//! An area path becomes a trail by concatenating one sub-trail per edge. Each
//! sub-trail starts at the center of the edge's source area, passes the
//! crossing point and ends at the center of the target area. Sub-trails are
//! pure functions of the mesh, which is what makes them cacheable on disk.

use std::collections::VecDeque;

use glam::Vec3;
use nav_common::{clamp, distance_2d, distance_squared, normalize_2d_or_zero, quadratic_bezier};
use serde::{Deserialize, Serialize};

use crate::area::{AreaHandle, NavArea};
use crate::connection::{determine_points, handle_dropdown, DropdownHint, NavPoints};
use crate::nav_mesh::NavMesh;
use crate::trace::TraceService;

pub const MIN_ADAPTIVE_SPACING: f32 = 72.0;
pub const MAX_ADAPTIVE_SPACING: f32 = 150.0;
pub const MAX_CONNECTION_CRUMBS: usize = 24;

const INTRA_SEGMENT_LENGTH: f32 = 120.0;
const MAX_INTRA_CRUMBS: usize = 8;
const CURVE_MIN_SEGMENT: f32 = 32.0;
const SHARP_TURN_DOT: f32 = 0.5;

/// Persisted form of a crumb, without its owning area
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedCrumb {
    pub pos: Vec3,
    #[serde(rename = "drop")]
    pub requires_drop: bool,
    pub drop_height: f32,
    pub approach_distance: f32,
    pub approach_dir: Vec3,
}

impl CachedCrumb {
    fn at(pos: Vec3, approach_dir: Vec3) -> Self {
        Self {
            pos,
            approach_dir,
            ..Default::default()
        }
    }
}

/// One waypoint of a trail
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crumb {
    pub pos: Vec3,
    pub area: AreaHandle,
    pub requires_drop: bool,
    pub drop_height: f32,
    pub approach_distance: f32,
    pub approach_dir: Vec3,
}

impl Crumb {
    pub fn new(pos: Vec3, area: AreaHandle) -> Self {
        Self {
            pos,
            area,
            requires_drop: false,
            drop_height: 0.0,
            approach_distance: 0.0,
            approach_dir: Vec3::ZERO,
        }
    }

    pub fn from_cached(cached: &CachedCrumb, area: AreaHandle) -> Self {
        Self {
            pos: cached.pos,
            area,
            requires_drop: cached.requires_drop,
            drop_height: cached.drop_height,
            approach_distance: cached.approach_distance,
            approach_dir: cached.approach_dir,
        }
    }
}

/// Ordered crumbs, consumed from the front
pub type CrumbTrail = VecDeque<Crumb>;

/// Evenly spaced crumbs strictly between `start` and `destination`
pub fn build_intra_area_crumbs(
    start: Vec3,
    destination: Vec3,
    area: AreaHandle,
    trail: &mut CrumbTrail,
) {
    let delta = destination - start;
    let effective = distance_2d(&start, &destination).max(delta.z.abs());
    if effective <= 1.0 {
        return;
    }

    let count = clamp(
        (effective / INTRA_SEGMENT_LENGTH).ceil() as usize,
        1,
        MAX_INTRA_CRUMBS,
    );
    let step = delta / (count + 1) as f32;
    let approach_dir = normalize_2d_or_zero(&delta);

    for i in 1..=count {
        let mut crumb = Crumb::new(start + step * i as f32, area);
        crumb.approach_dir = approach_dir;
        trail.push_back(crumb);
    }
}

/// Larger of the planar and vertical extent of a segment
fn segment_length(a: Vec3, b: Vec3) -> f32 {
    distance_2d(&a, &b).max((b.z - a.z).abs())
}

fn lerp_clamped(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    a + (b - a) * clamp(t, 0.0, 1.0)
}

/// Adaptive crumbs along `points.current -> points.center -> points.next`
///
/// Spacing shrinks on sharp turns and grows with the size of `area`. Smooth
/// turns without a drop are sampled on a quadratic curve. Heights come from
/// `area`'s surface; the final crumb sits exactly on `points.next`.
pub fn build_adaptive_area_crumbs(
    area: &NavArea,
    points: &NavPoints,
    drop: &DropdownHint,
    out: &mut Vec<CachedCrumb>,
) {
    let (a, b, c) = (points.current, points.center, points.next);

    let seg_ab = segment_length(a, b);
    let seg_bc = segment_length(b, c);
    let total = seg_ab + seg_bc;
    let area_size = area.diagonal_2d().max(1.0);

    let dir_in = normalize_2d_or_zero(&(b - a));
    let dir_out = normalize_2d_or_zero(&(c - b));
    let sharp_turn = dir_in.dot(dir_out) < SHARP_TURN_DOT;

    let mut spacing = 220.0 - area_size * 0.08;
    if sharp_turn {
        spacing *= 0.65;
    }
    let spacing = clamp(spacing, MIN_ADAPTIVE_SPACING, MAX_ADAPTIVE_SPACING);

    let by_length = clamp(
        (total.max(1.0) / spacing).ceil() as usize,
        1,
        MAX_CONNECTION_CRUMBS,
    );
    let by_area = clamp((area_size / 220.0).ceil() as usize, 1, 10);
    let count = by_length.max(by_area).min(MAX_CONNECTION_CRUMBS);

    let use_curve =
        !drop.requires_drop && count >= 3 && seg_ab > CURVE_MIN_SEGMENT && seg_bc > CURVE_MIN_SEGMENT;

    for i in 1..=count {
        let t = i as f32 / (count + 1) as f32;
        let (mut point, dir) = if use_curve {
            let u = 1.0 - t;
            let tangent = (b - a) * (2.0 * u) + (c - b) * (2.0 * t);
            (quadratic_bezier(a, b, c, t), tangent)
        } else {
            let dist = total * t;
            if dist <= seg_ab || seg_bc <= 0.001 {
                let local = if seg_ab > 0.001 { dist / seg_ab } else { 1.0 };
                (lerp_clamped(a, b, local), b - a)
            } else {
                let local = (dist - seg_ab) / seg_bc;
                (lerp_clamped(b, c, local), c - b)
            }
        };
        point.z = area.z_at(point.x, point.y);
        out.push(CachedCrumb::at(point, normalize_2d_or_zero(&dir)));
    }

    out.push(CachedCrumb::at(c, normalize_2d_or_zero(&(c - b))));

    if drop.requires_drop {
        let closest = out
            .iter()
            .enumerate()
            .min_by(|(_, x), (_, y)| {
                distance_squared(&x.pos, &b).total_cmp(&distance_squared(&y.pos, &b))
            })
            .map(|(i, _)| i);
        if let Some(i) = closest {
            let crumb = &mut out[i];
            crumb.requires_drop = true;
            crumb.drop_height = drop.drop_height;
            crumb.approach_distance = drop.approach_distance;
            crumb.approach_dir = drop.approach_dir;
        }
    }
}

/// Sub-trail for the edge `from -> to`, empty when either handle is invalid
pub fn build_connection_crumbs(
    mesh: &NavMesh,
    from: AreaHandle,
    to: AreaHandle,
    trace: Option<&dyn TraceService>,
) -> Vec<CachedCrumb> {
    let (Some(from_area), Some(to_area)) = (mesh.area(from), mesh.area(to)) else {
        return Vec::new();
    };

    let is_one_way = mesh.is_one_way(from, to);
    let mut points = determine_points(from_area, to_area);
    let drop = handle_dropdown(trace, points.center, points.next, is_one_way);
    points.center = drop.adjusted_pos;

    let mut out = Vec::with_capacity(16);
    out.push(CachedCrumb::at(points.current, Vec3::ZERO));
    build_adaptive_area_crumbs(from_area, &points, &drop, &mut out);
    out
}

/// Appends cached crumbs owned by `area`, skipping near-duplicates
pub fn append_cached_crumbs(trail: &mut CrumbTrail, area: AreaHandle, cached: &[CachedCrumb]) {
    for crumb in cached {
        if let Some(last) = trail.back() {
            if distance_squared(&last.pos, &crumb.pos) < 1.0 {
                continue;
            }
        }
        trail.push_back(Crumb::from_cached(crumb, area));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::{create_ledge_mesh, create_two_area_mesh, MeshGroundTrace};

    #[test]
    fn test_intra_area_spacing() {
        let mut trail = CrumbTrail::new();
        let area = AreaHandle::new(0);
        build_intra_area_crumbs(Vec3::ZERO, Vec3::new(300.0, 0.0, 0.0), area, &mut trail);

        // ceil(300 / 120) = 3 interior points
        let xs: Vec<f32> = trail.iter().map(|c| c.pos.x).collect();
        assert_eq!(xs, vec![75.0, 150.0, 225.0]);
        assert!(trail.iter().all(|c| c.approach_dir == Vec3::X));
    }

    #[test]
    fn test_intra_area_short_hop_is_empty() {
        let mut trail = CrumbTrail::new();
        build_intra_area_crumbs(
            Vec3::ZERO,
            Vec3::new(0.5, 0.5, 0.0),
            AreaHandle::new(0),
            &mut trail,
        );
        assert!(trail.is_empty());
    }

    #[test]
    fn test_intra_area_count_is_capped() {
        let mut trail = CrumbTrail::new();
        build_intra_area_crumbs(
            Vec3::ZERO,
            Vec3::new(5000.0, 0.0, 0.0),
            AreaHandle::new(0),
            &mut trail,
        );
        assert_eq!(trail.len(), MAX_INTRA_CRUMBS);
    }

    #[test]
    fn test_straight_connection_crosses_shared_edge() {
        let mesh = create_two_area_mesh(true);
        let crumbs = build_connection_crumbs(&mesh, AreaHandle::new(0), AreaHandle::new(1), None);

        let positions: Vec<Vec3> = crumbs.iter().map(|c| c.pos).collect();
        assert_eq!(
            positions,
            vec![
                Vec3::new(50.0, 50.0, 0.0),
                Vec3::new(100.0, 50.0, 0.0),
                Vec3::new(150.0, 50.0, 0.0),
            ]
        );
        assert!(crumbs.iter().all(|c| !c.requires_drop));
    }

    #[test]
    fn test_large_turn_uses_curve() {
        let area = NavArea::flat(1, [0.0, 0.0], [600.0, 600.0], 0.0);
        let points = NavPoints {
            current: Vec3::new(300.0, 300.0, 0.0),
            center: Vec3::new(600.0, 300.0, 0.0),
            center_next: Vec3::new(600.0, 300.0, 0.0),
            next: Vec3::new(600.0, 600.0, 0.0),
        };
        let mut out = Vec::new();
        build_adaptive_area_crumbs(&area, &points, &DropdownHint::default(), &mut out);

        assert!(out.len() >= 4);
        assert!(out.len() <= MAX_CONNECTION_CRUMBS + 1);
        assert_eq!(out.last().unwrap().pos, points.next);
        // A curve never touches the corner itself
        assert!(out.iter().all(|c| c.pos.distance(points.center) > 1.0));
        // Samples stay on the surface
        assert!(out.iter().all(|c| c.pos.z == 0.0));
    }

    #[test]
    fn test_drop_annotation_lands_near_crossing() {
        let mesh = create_ledge_mesh();
        let trace = MeshGroundTrace::new(&mesh);
        let crumbs = build_connection_crumbs(
            &mesh,
            AreaHandle::new(0),
            AreaHandle::new(1),
            Some(&trace),
        );

        let drops: Vec<&CachedCrumb> = crumbs.iter().filter(|c| c.requires_drop).collect();
        assert_eq!(drops.len(), 1);
        assert!(drops[0].drop_height > 100.0);
        assert_eq!(drops[0].approach_dir, Vec3::X);
        assert_eq!(crumbs.last().unwrap().pos.z, 0.0);
    }

    #[test]
    fn test_append_skips_duplicates() {
        let mut trail = CrumbTrail::new();
        let cached = [
            CachedCrumb::at(Vec3::ZERO, Vec3::ZERO),
            CachedCrumb::at(Vec3::new(0.5, 0.0, 0.0), Vec3::ZERO),
            CachedCrumb::at(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO),
        ];
        append_cached_crumbs(&mut trail, AreaHandle::new(3), &cached);
        append_cached_crumbs(&mut trail, AreaHandle::new(4), &cached[2..]);

        assert_eq!(trail.len(), 2);
        assert!(trail.iter().all(|c| c.area == AreaHandle::new(3)));
    }
}
