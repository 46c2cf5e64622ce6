//! Navigation areas: the nodes of the navigation graph
//!
//! An area is an axis-aligned quad in X/Y whose four corners carry independent
//! heights. Geometry is fixed after load; the context flags may be updated at
//! runtime (spawn rooms, blockers).

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Vertical tolerance used for the height band of an area
pub const AREA_HEIGHT_TOLERANCE: f32 = 18.0;

/// Stable handle to an area inside a [`crate::NavMesh`]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AreaHandle(u32);

impl AreaHandle {
    /// Creates a handle from an arena index
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Arena index of the area
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Raw handle value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for AreaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static traversal attributes stored in the mesh file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttributeFlags(u32);

impl AttributeFlags {
    pub const CROUCH: AttributeFlags = AttributeFlags(0x0000_0001);
    pub const JUMP: AttributeFlags = AttributeFlags(0x0000_0002);
    pub const PRECISE: AttributeFlags = AttributeFlags(0x0000_0004);
    pub const NO_JUMP: AttributeFlags = AttributeFlags(0x0000_0008);
    pub const STOP: AttributeFlags = AttributeFlags(0x0000_0010);
    pub const RUN: AttributeFlags = AttributeFlags(0x0000_0020);
    pub const WALK: AttributeFlags = AttributeFlags(0x0000_0040);
    pub const AVOID: AttributeFlags = AttributeFlags(0x0000_0080);
    pub const TRANSIENT: AttributeFlags = AttributeFlags(0x0000_0100);
    pub const DONT_HIDE: AttributeFlags = AttributeFlags(0x0000_0200);
    pub const STAND: AttributeFlags = AttributeFlags(0x0000_0400);
    pub const NO_HOSTAGES: AttributeFlags = AttributeFlags(0x0000_0800);
    pub const STAIRS: AttributeFlags = AttributeFlags(0x0000_1000);
    pub const NO_MERGE: AttributeFlags = AttributeFlags(0x0000_2000);
    pub const OBSTACLE_TOP: AttributeFlags = AttributeFlags(0x0000_4000);
    pub const CLIFF: AttributeFlags = AttributeFlags(0x0000_8000);
    pub const HAS_ELEVATOR: AttributeFlags = AttributeFlags(0x4000_0000);
    pub const NAV_BLOCKER: AttributeFlags = AttributeFlags(0x8000_0000);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, flag: AttributeFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: AttributeFlags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: AttributeFlags) {
        self.0 &= !flag.0;
    }
}

/// Game-context attributes; stored in the mesh and mutable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextFlags(u32);

impl ContextFlags {
    pub const BLOCKED: ContextFlags = ContextFlags(0x0000_0001);
    pub const SPAWN_ROOM_RED: ContextFlags = ContextFlags(0x0000_0002);
    pub const SPAWN_ROOM_BLUE: ContextFlags = ContextFlags(0x0000_0004);
    pub const SPAWN_ROOM_EXIT: ContextFlags = ContextFlags(0x0000_0008);
    pub const HAS_AMMO: ContextFlags = ContextFlags(0x0000_0010);
    pub const HAS_HEALTH: ContextFlags = ContextFlags(0x0000_0020);
    pub const CONTROL_POINT: ContextFlags = ContextFlags(0x0000_0040);
    pub const BLUE_ONE_WAY_DOOR: ContextFlags = ContextFlags(0x0000_8000);
    pub const RED_ONE_WAY_DOOR: ContextFlags = ContextFlags(0x0001_0000);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, flag: ContextFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: ContextFlags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: ContextFlags) {
        self.0 &= !flag.0;
    }
}

/// Side an agent plays for; drives spawn-room access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    #[default]
    Unassigned,
    Red,
    Blue,
}

impl Team {
    /// The spawn-room flag owned by this team
    pub fn spawn_flag(&self) -> Option<ContextFlags> {
        match self {
            Team::Red => Some(ContextFlags::SPAWN_ROOM_RED),
            Team::Blue => Some(ContextFlags::SPAWN_ROOM_BLUE),
            Team::Unassigned => None,
        }
    }

    /// The spawn-room flag of the opposing team
    pub fn enemy_spawn_flag(&self) -> Option<ContextFlags> {
        match self {
            Team::Red => Some(ContextFlags::SPAWN_ROOM_BLUE),
            Team::Blue => Some(ContextFlags::SPAWN_ROOM_RED),
            Team::Unassigned => None,
        }
    }
}

/// Direction of a connection list; matches the on-disk order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

/// Cover point recorded by the mesh authoring tool
#[derive(Debug, Clone, PartialEq)]
pub struct HidingSpot {
    pub id: u32,
    pub pos: Vec3,
    pub flags: u8,
}

/// A spot to look at while traversing an encounter path
#[derive(Debug, Clone, PartialEq)]
pub struct SpotOrder {
    pub id: u32,
    pub t: u8,
}

/// Path-crossing hint through an area
#[derive(Debug, Clone, PartialEq)]
pub struct SpotEncounter {
    pub from_id: u32,
    pub from_dir: u8,
    pub to_id: u32,
    pub to_dir: u8,
    pub spots: Vec<SpotOrder>,
}

/// Entry of the potentially-visible area list
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleArea {
    pub id: u32,
    pub attributes: u8,
}

/// A navigation area
#[derive(Debug, Clone)]
pub struct NavArea {
    pub id: u32,
    pub attributes: AttributeFlags,
    pub context: ContextFlags,
    pub nw: Vec3,
    pub se: Vec3,
    pub ne_z: f32,
    pub sw_z: f32,
    /// Connection ids per direction, as stored on disk
    pub connection_ids: [Vec<u32>; 4],
    pub hiding_spots: Vec<HidingSpot>,
    pub encounters: Vec<SpotEncounter>,
    pub index_type: u16,
    pub ladder_ids: [Vec<u32>; 2],
    pub earliest_occupy: [f32; 2],
    pub light_intensity: [f32; 4],
    pub visible_areas: Vec<VisibleArea>,
    pub inherit_visibility: u32,

    center: Vec3,
    inv_dx: f32,
    inv_dy: f32,
    min_z: f32,
    max_z: f32,
    /// Resolved outgoing adjacency; self links and unknown ids are dropped
    pub(crate) connections: Vec<AreaHandle>,
}

impl NavArea {
    /// Creates an area from its north-west and south-east corners and the two
    /// remaining corner heights
    pub fn new(id: u32, nw: Vec3, se: Vec3, ne_z: f32, sw_z: f32) -> Self {
        let mut area = Self {
            id,
            attributes: AttributeFlags::default(),
            context: ContextFlags::default(),
            nw,
            se,
            ne_z,
            sw_z,
            connection_ids: Default::default(),
            hiding_spots: Vec::new(),
            encounters: Vec::new(),
            index_type: 0,
            ladder_ids: Default::default(),
            earliest_occupy: [0.0; 2],
            light_intensity: [1.0; 4],
            visible_areas: Vec::new(),
            inherit_visibility: 0,
            center: Vec3::ZERO,
            inv_dx: 0.0,
            inv_dy: 0.0,
            min_z: 0.0,
            max_z: 0.0,
            connections: Vec::new(),
        };
        area.update_derived();
        area
    }

    /// Creates a flat area spanning `min`..`max` in X/Y at height `z`
    pub fn flat(id: u32, min: [f32; 2], max: [f32; 2], z: f32) -> Self {
        Self::new(
            id,
            Vec3::new(min[0], min[1], z),
            Vec3::new(max[0], max[1], z),
            z,
            z,
        )
    }

    /// Recomputes center, inverse extents and the height band from the corners
    pub fn update_derived(&mut self) {
        self.center = (self.nw + self.se) * 0.5;

        let dx = self.se.x - self.nw.x;
        let dy = self.se.y - self.nw.y;
        if dx > 0.0 && dy > 0.0 {
            self.inv_dx = 1.0 / dx;
            self.inv_dy = 1.0 / dy;
        } else {
            self.inv_dx = 0.0;
            self.inv_dy = 0.0;
        }

        let lowest = self.nw.z.min(self.se.z).min(self.ne_z).min(self.sw_z);
        let highest = self.nw.z.max(self.se.z).max(self.ne_z).max(self.sw_z);
        self.min_z = lowest - AREA_HEIGHT_TOLERANCE;
        self.max_z = highest + AREA_HEIGHT_TOLERANCE;
    }

    /// Appends a connection to another area id
    pub fn add_connection(&mut self, dir: Direction, id: u32) {
        self.connection_ids[dir as usize].push(id);
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn min_z(&self) -> f32 {
        self.min_z
    }

    pub fn max_z(&self) -> f32 {
        self.max_z
    }

    /// Resolved outgoing neighbors
    pub fn connections(&self) -> &[AreaHandle] {
        &self.connections
    }

    pub fn sw_corner(&self) -> Vec3 {
        Vec3::new(self.nw.x, self.se.y, self.sw_z)
    }

    pub fn ne_corner(&self) -> Vec3 {
        Vec3::new(self.se.x, self.nw.y, self.ne_z)
    }

    /// All four corners, clockwise from north-west
    pub fn corners(&self) -> [Vec3; 4] {
        [self.nw, self.ne_corner(), self.se, self.sw_corner()]
    }

    /// Length of the X/Y diagonal
    pub fn diagonal_2d(&self) -> f32 {
        let dx = self.se.x - self.nw.x;
        let dy = self.se.y - self.nw.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Surface height at (x, y), bilinear over the corner heights and clamped
    /// to the footprint
    pub fn z_at(&self, x: f32, y: f32) -> f32 {
        if self.inv_dx == 0.0 || self.inv_dy == 0.0 {
            return self.ne_z;
        }

        let u = ((x - self.nw.x) * self.inv_dx).clamp(0.0, 1.0);
        let v = ((y - self.nw.y) * self.inv_dy).clamp(0.0, 1.0);

        let north_z = self.nw.z + u * (self.ne_z - self.nw.z);
        let south_z = self.sw_z + u * (self.se.z - self.sw_z);

        north_z + v * (south_z - north_z)
    }

    /// Closest point on the area surface to (x, y)
    pub fn nearest_point(&self, x: f32, y: f32) -> Vec3 {
        let cx = x.clamp(self.nw.x, self.se.x.max(self.nw.x));
        let cy = y.clamp(self.nw.y, self.se.y.max(self.nw.y));
        Vec3::new(cx, cy, self.z_at(cx, cy))
    }

    /// Whether `pos` lies within the X/Y extents grown by `tolerance`
    pub fn is_overlapping(&self, pos: &Vec3, tolerance: f32) -> bool {
        pos.x + tolerance >= self.nw.x
            && pos.x - tolerance <= self.se.x
            && pos.y + tolerance >= self.nw.y
            && pos.y - tolerance <= self.se.y
    }

    /// Exact containment: inside the footprint and within the height band
    /// around the surface at that point
    pub fn contains(&self, pos: &Vec3) -> bool {
        if !self.is_overlapping(pos, 0.0) {
            return false;
        }
        (pos.z - self.z_at(pos.x, pos.y)).abs() <= AREA_HEIGHT_TOLERANCE
    }

    /// Whether `team` may not enter this area
    pub fn is_blocked(&self, team: Team) -> bool {
        if self.attributes.contains(AttributeFlags::NAV_BLOCKER)
            || self.context.contains(ContextFlags::BLOCKED)
        {
            return true;
        }
        self.is_enemy_spawn(team)
    }

    /// Spawn room that belongs exclusively to the other team
    pub fn is_enemy_spawn(&self, team: Team) -> bool {
        match (team.spawn_flag(), team.enemy_spawn_flag()) {
            (Some(own), Some(enemy)) => self.context.contains(enemy) && !self.context.contains(own),
            _ => false,
        }
    }

    /// Any spawn-room flag set
    pub fn is_spawn_room(&self) -> bool {
        self.context.contains(ContextFlags::SPAWN_ROOM_RED)
            || self.context.contains(ContextFlags::SPAWN_ROOM_BLUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilted() -> NavArea {
        // Rises 40 units from west to east
        NavArea::new(
            1,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 40.0),
            40.0,
            0.0,
        )
    }

    #[test]
    fn test_z_at_bilinear() {
        let area = tilted();
        assert_eq!(area.z_at(0.0, 50.0), 0.0);
        assert_eq!(area.z_at(100.0, 50.0), 40.0);
        assert!((area.z_at(50.0, 10.0) - 20.0).abs() < 1e-4);
        // Clamped outside the footprint
        assert_eq!(area.z_at(500.0, 50.0), 40.0);
    }

    #[test]
    fn test_contains_uses_surface_height() {
        let area = tilted();
        assert!(area.contains(&Vec3::new(90.0, 50.0, 36.0)));
        // Within the flat min/max band but far from the local surface
        assert!(!area.contains(&Vec3::new(10.0, 50.0, 40.0)));
        assert!(!area.contains(&Vec3::new(101.0, 50.0, 40.0)));
    }

    #[test]
    fn test_nearest_point_clamps() {
        let area = NavArea::flat(1, [0.0, 0.0], [100.0, 100.0], 5.0);
        assert_eq!(
            area.nearest_point(150.0, 50.0),
            Vec3::new(100.0, 50.0, 5.0)
        );
        assert_eq!(area.center(), Vec3::new(50.0, 50.0, 5.0));
    }

    #[test]
    fn test_blocked_by_enemy_spawn() {
        let mut area = NavArea::flat(1, [0.0, 0.0], [10.0, 10.0], 0.0);
        area.context.insert(ContextFlags::SPAWN_ROOM_BLUE);
        assert!(area.is_blocked(Team::Red));
        assert!(!area.is_blocked(Team::Blue));
        area.context.insert(ContextFlags::SPAWN_ROOM_RED);
        assert!(!area.is_blocked(Team::Red));
        area.attributes.insert(AttributeFlags::NAV_BLOCKER);
        assert!(area.is_blocked(Team::Blue));
    }

    #[test]
    fn test_height_band_spans_all_corners() {
        let area = NavArea::new(
            1,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 100.0, 0.0),
            60.0,
            -30.0,
        );
        assert_eq!(area.min_z(), -30.0 - AREA_HEIGHT_TOLERANCE);
        assert_eq!(area.max_z(), 60.0 + AREA_HEIGHT_TOLERANCE);
    }

    #[test]
    fn test_degenerate_extent_uses_ne_height() {
        let area = NavArea::new(
            1,
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(0.0, 10.0, 3.0),
            7.0,
            3.0,
        );
        assert_eq!(area.z_at(0.0, 5.0), 7.0);
    }
}
