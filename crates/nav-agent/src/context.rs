//! Collaborators the engine drives and observes
//!
//! Everything the engine learns about the world comes through
//! [`WorldState`] and every intent it produces goes to a
//! [`MovementActuator`]. Both travel in a [`NavContext`] passed into each
//! call, so the engine holds no global state and runs against fakes in tests.

use glam::Vec3;
use nav_core::{AreaHandle, DangerMap, Team, TraceService};
use serde::{Deserialize, Serialize};

/// A threat position reported by the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardSource {
    pub kind: HazardKind,
    pub position: Vec3,
}

impl HazardSource {
    pub fn new(kind: HazardKind, position: Vec3) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardKind {
    /// Enemy sentry gun; `include_low` also marks the outermost ring
    Sentry { include_low: bool },
    /// Enemy that currently cannot be damaged
    InvulnerableEnemy,
    /// Enemy sticky bomb lying on the ground
    StickyTrap,
}

/// Read-only view of the agent and its surroundings
pub trait WorldState {
    /// Current simulation tick
    fn tick(&self) -> u64;
    fn agent_position(&self) -> Vec3;
    fn agent_velocity(&self) -> Vec3;
    fn agent_team(&self) -> Team;
    fn agent_id(&self) -> u32;
    fn is_alive(&self) -> bool;
    fn on_ground(&self) -> bool;
    /// Frozen by the game (round start, taunt, stun)
    fn movement_locked(&self) -> bool;
    fn hazards(&self) -> Vec<HazardSource>;

    /// Environmental danger of an area, added to its traversal cost
    fn area_danger(&self, _area: AreaHandle) -> f32 {
        0.0
    }

    /// Whether the agent itself is currently invulnerable
    fn is_invulnerable(&self) -> bool {
        false
    }
}

/// Movement intents for the current tick
pub trait MovementActuator {
    fn walk_to(&mut self, point: Vec3);
    fn jump(&mut self);
}

/// Per-call bundle of collaborators
pub struct NavContext<'a> {
    pub world: &'a dyn WorldState,
    pub actuator: &'a mut dyn MovementActuator,
    pub trace: &'a dyn TraceService,
}

impl<'a> NavContext<'a> {
    pub fn new(
        world: &'a dyn WorldState,
        actuator: &'a mut dyn MovementActuator,
        trace: &'a dyn TraceService,
    ) -> Self {
        Self {
            world,
            actuator,
            trace,
        }
    }

    pub fn now(&self) -> u64 {
        self.world.tick()
    }
}

/// Exposes [`WorldState::area_danger`] to the cost model
pub(crate) struct WorldDanger<'a>(pub &'a dyn WorldState);

impl DangerMap for WorldDanger<'_> {
    fn danger(&self, area: AreaHandle) -> f32 {
        self.0.area_danger(area)
    }
}

/// An axis-aligned spawn room; `team: None` belongs to both sides
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRoom {
    pub team: Option<Team>,
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl SpawnRoom {
    pub fn new(team: Option<Team>, mins: Vec3, maxs: Vec3) -> Self {
        Self { team, mins, maxs }
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        point.cmpge(self.mins).all() && point.cmple(self.maxs).all()
    }
}
