//! Collision trace collaborator
//!
//! The host environment answers ray and swept-hull queries; the navigation code
//! only consumes the hit fraction, end position and surface normal.

use std::ops::BitOr;

use glam::Vec3;
use nav_common::{distance_2d, normalize_2d_or_zero, right_2d};

use crate::connection::{HALF_PLAYER_WIDTH, PLAYER_JUMP_HEIGHT};

/// Minimum planar leg length that is probed at all
const MIN_PROBE_LENGTH: f32 = 16.0;

/// Contents mask passed to traces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CollisionMask(u32);

impl CollisionMask {
    pub const PLAYER_SOLID: CollisionMask = CollisionMask(0x0000_0001);
    pub const PLAYER_SOLID_BRUSH_ONLY: CollisionMask = CollisionMask(0x0000_0002);
    pub const SHOT: CollisionMask = CollisionMask(0x0000_0004);
    pub const GRATE: CollisionMask = CollisionMask(0x0000_0008);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: CollisionMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for CollisionMask {
    type Output = CollisionMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        CollisionMask(self.0 | rhs.0)
    }
}

/// Outcome of a trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    /// Portion of the segment travelled before the hit, 1.0 when clear
    pub fraction: f32,
    pub end_pos: Vec3,
    pub normal: Vec3,
}

impl TraceResult {
    /// A trace that reached `to` unobstructed
    pub fn clear(to: Vec3) -> Self {
        Self {
            fraction: 1.0,
            end_pos: to,
            normal: Vec3::ZERO,
        }
    }

    pub fn did_hit(&self) -> bool {
        self.fraction < 1.0
    }
}

/// Ray and hull queries against world geometry
pub trait TraceService: Send + Sync {
    /// Traces a ray between two points
    fn trace_ray(&self, from: Vec3, to: Vec3, mask: CollisionMask) -> TraceResult;

    /// Sweeps a box between two points; defaults to a ray
    fn trace_hull(
        &self,
        from: Vec3,
        to: Vec3,
        _mins: Vec3,
        _maxs: Vec3,
        mask: CollisionMask,
    ) -> TraceResult {
        self.trace_ray(from, to, mask)
    }
}

/// Whether a ray between two points is unobstructed
pub fn is_visible(trace: &dyn TraceService, from: Vec3, to: Vec3, mask: CollisionMask) -> bool {
    trace.trace_ray(from, to, mask).fraction >= 1.0
}

/// Whether a standing player could walk from `from` to `to`
///
/// Two rays at jump height, offset to either side of the leg, must both be
/// clear. Legs shorter than a few units always pass.
pub fn is_player_passable(trace: &dyn TraceService, from: Vec3, to: Vec3) -> bool {
    if distance_2d(&from, &to) < MIN_PROBE_LENGTH {
        return true;
    }

    let forward = normalize_2d_or_zero(&(to - from));
    let right = right_2d(&forward);
    if right.length_squared() <= 1e-6 {
        return false;
    }

    let lift = Vec3::new(0.0, 0.0, PLAYER_JUMP_HEIGHT);
    let offset = right * (HALF_PLAYER_WIDTH * 0.8);
    let start = from + lift;
    let end = to + lift;

    let left = trace.trace_ray(start - offset, end - offset, CollisionMask::PLAYER_SOLID);
    if left.did_hit() {
        return false;
    }
    let right = trace.trace_ray(start + offset, end + offset, CollisionMask::PLAYER_SOLID);
    !right.did_hit()
}

/// Ground height under `probe`, searching from `up` above to `down` below
pub fn ground_z(trace: &dyn TraceService, probe: Vec3, up: f32, down: f32) -> Option<f32> {
    let start = Vec3::new(probe.x, probe.y, probe.z + up);
    let end = Vec3::new(probe.x, probe.y, probe.z - down);
    let result = trace.trace_ray(start, end, CollisionMask::PLAYER_SOLID_BRUSH_ONLY);
    result.did_hit().then_some(result.end_pos.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::{OpenTrace, WallTrace};

    #[test]
    fn test_short_legs_always_pass() {
        let wall = WallTrace::new(5.0);
        assert!(is_player_passable(
            &wall,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0)
        ));
    }

    #[test]
    fn test_wall_blocks_passability() {
        let wall = WallTrace::new(50.0);
        assert!(!is_player_passable(
            &wall,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0)
        ));
        assert!(is_player_passable(
            &OpenTrace,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0)
        ));
    }

    #[test]
    fn test_mask_combination() {
        let mask = CollisionMask::SHOT | CollisionMask::GRATE;
        assert!(mask.contains(CollisionMask::SHOT));
        assert!(!mask.contains(CollisionMask::PLAYER_SOLID));
    }
}
