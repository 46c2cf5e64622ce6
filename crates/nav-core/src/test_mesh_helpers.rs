//! Synthetic meshes and trace fakes for tests
//!
//! Layouts used across the navigation test suites:
//!
//! - a flat grid of square areas with four-way links
//! - two unit squares joined by an (optionally one-way) east link
//! - a raised floor that drops onto a lower one
//! - a flat floor joined to a tilted ramp
//!
//! The trace fakes never allocate and are `Send + Sync`, so they can be shared
//! with worker threads.

use glam::Vec3;

use crate::area::{Direction, NavArea};
use crate::nav_mesh::NavMesh;
use crate::trace::{CollisionMask, TraceResult, TraceService};

/// Source size stamped on every synthetic mesh
pub const TEST_SOURCE_SIZE: u32 = 4096;

/// Creates a `cols` x `rows` grid of flat areas with side `size` at z = 0
///
/// Area ids are `1 + row * cols + col` and handles follow the same order
/// starting at 0. Every area links to its four neighbors in both directions.
pub fn create_grid_mesh(cols: usize, rows: usize, size: f32) -> NavMesh {
    let id_of = |col: usize, row: usize| (1 + row * cols + col) as u32;
    let mut areas = Vec::with_capacity(cols * rows);

    for row in 0..rows {
        for col in 0..cols {
            let min = [col as f32 * size, row as f32 * size];
            let max = [min[0] + size, min[1] + size];
            let mut area = NavArea::flat(id_of(col, row), min, max, 0.0);

            if row > 0 {
                area.add_connection(Direction::North, id_of(col, row - 1));
            }
            if col + 1 < cols {
                area.add_connection(Direction::East, id_of(col + 1, row));
            }
            if row + 1 < rows {
                area.add_connection(Direction::South, id_of(col, row + 1));
            }
            if col > 0 {
                area.add_connection(Direction::West, id_of(col - 1, row));
            }
            areas.push(area);
        }
    }

    NavMesh::from_areas(TEST_SOURCE_SIZE, areas)
}

/// A = [(0,0)-(100,100)] (id 1) and B = [(100,0)-(200,100)] (id 2) at z = 0
pub fn create_two_area_mesh(one_way: bool) -> NavMesh {
    let mut a = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 0.0);
    let mut b = NavArea::flat(2, [100.0, 0.0], [200.0, 100.0], 0.0);
    a.add_connection(Direction::East, 2);
    if !one_way {
        b.add_connection(Direction::West, 1);
    }
    NavMesh::from_areas(TEST_SOURCE_SIZE, vec![a, b])
}

/// Upper floor (id 1) at z = 120 over [0,100]^2 with a one-way link down to
/// a lower floor (id 2) at z = 0 over [100,300] x [0,100]
pub fn create_ledge_mesh() -> NavMesh {
    let mut upper = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 120.0);
    let lower = NavArea::flat(2, [100.0, 0.0], [300.0, 100.0], 0.0);
    upper.add_connection(Direction::East, 2);
    NavMesh::from_areas(TEST_SOURCE_SIZE, vec![upper, lower])
}

/// Flat floor (id 1) over [0,100]^2 at z = 0 linked both ways to a ramp
/// (id 2) over [100,300] x [0,100] rising from z = 0 at x = 100 to z = 60
/// at x = 300
pub fn create_ramp_mesh() -> NavMesh {
    let mut floor = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 0.0);
    // nw = (100, 0), se = (300, 100); ne = (300, 0), sw = (100, 100)
    let mut ramp = NavArea::new(
        2,
        Vec3::new(100.0, 0.0, 0.0),
        Vec3::new(300.0, 100.0, 60.0),
        60.0,
        0.0,
    );
    floor.add_connection(Direction::East, 2);
    ramp.add_connection(Direction::West, 1);
    NavMesh::from_areas(TEST_SOURCE_SIZE, vec![floor, ramp])
}

/// Deterministic linear congruential generator
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.state
    }

    /// Uniform value in `[lo, hi)`
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        let unit = (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32;
        lo + (hi - lo) * unit
    }
}

/// A world with no geometry
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTrace;

impl TraceService for OpenTrace {
    fn trace_ray(&self, _from: Vec3, to: Vec3, _mask: CollisionMask) -> TraceResult {
        TraceResult::clear(to)
    }
}

/// An infinite wall on the plane `x = wall_x`
#[derive(Debug, Clone, Copy)]
pub struct WallTrace {
    pub wall_x: f32,
}

impl WallTrace {
    pub fn new(wall_x: f32) -> Self {
        Self { wall_x }
    }
}

impl TraceService for WallTrace {
    fn trace_ray(&self, from: Vec3, to: Vec3, _mask: CollisionMask) -> TraceResult {
        let (a, b) = (from.x - self.wall_x, to.x - self.wall_x);
        if a * b > 0.0 || from.x == to.x {
            return TraceResult::clear(to);
        }
        let fraction = (a / (a - b)).clamp(0.0, 1.0);
        let normal = if a < 0.0 { -Vec3::X } else { Vec3::X };
        TraceResult {
            fraction: fraction.min(0.999),
            end_pos: from + (to - from) * fraction,
            normal,
        }
    }
}

/// Treats area surfaces as the only solid geometry
///
/// Vertical rays stop on the highest area surface between their end points.
/// Every other ray is clear.
pub struct MeshGroundTrace<'a> {
    mesh: &'a NavMesh,
}

impl<'a> MeshGroundTrace<'a> {
    pub fn new(mesh: &'a NavMesh) -> Self {
        Self { mesh }
    }
}

impl TraceService for MeshGroundTrace<'_> {
    fn trace_ray(&self, from: Vec3, to: Vec3, _mask: CollisionMask) -> TraceResult {
        if from.x != to.x || from.y != to.y || from.z <= to.z {
            return TraceResult::clear(to);
        }

        let surface = self
            .mesh
            .areas()
            .iter()
            .filter(|area| area.is_overlapping(&from, 0.0))
            .map(|area| area.z_at(from.x, from.y))
            .filter(|z| *z <= from.z && *z >= to.z)
            .fold(None, |best: Option<f32>, z| Some(best.map_or(z, |b| b.max(z))));

        match surface {
            Some(z) => TraceResult {
                fraction: (from.z - z) / (from.z - to.z),
                end_pos: Vec3::new(from.x, from.y, z),
                normal: Vec3::Z,
            },
            None => TraceResult::clear(to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::AreaHandle;

    #[test]
    fn test_grid_links_are_symmetric() {
        let mesh = create_grid_mesh(4, 3, 10.0);
        assert_eq!(mesh.area_count(), 12);
        for (handle, area) in mesh.iter() {
            for &next in area.connections() {
                assert!(mesh.has_direct_connection(next, handle));
            }
        }
        // Corner has two neighbors, interior four
        assert_eq!(mesh.area(AreaHandle::new(0)).unwrap().connections().len(), 2);
        assert_eq!(mesh.area(AreaHandle::new(5)).unwrap().connections().len(), 4);
    }

    #[test]
    fn test_ramp_surface() {
        let mesh = create_ramp_mesh();
        let ramp = mesh.area(AreaHandle::new(1)).unwrap();
        assert_eq!(ramp.z_at(100.0, 50.0), 0.0);
        assert_eq!(ramp.z_at(300.0, 50.0), 60.0);
        assert!((ramp.z_at(200.0, 20.0) - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = Lcg::new(3);
        for _ in 0..1000 {
            let v = rng.range(-2.0, 5.0);
            assert!((-2.0..5.0).contains(&v));
        }
    }

    #[test]
    fn test_ground_trace_hits_highest_surface() {
        let mesh = create_ledge_mesh();
        let trace = MeshGroundTrace::new(&mesh);
        let hit = trace.trace_ray(
            Vec3::new(50.0, 50.0, 300.0),
            Vec3::new(50.0, 50.0, -100.0),
            CollisionMask::PLAYER_SOLID,
        );
        assert!(hit.did_hit());
        assert_eq!(hit.end_pos.z, 120.0);
    }
}
