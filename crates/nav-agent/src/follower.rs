//! Consumes the crumb trail one tick at a time
//!
//! Each tick pops every crumb the agent has reached, then steers toward the
//! first remaining one. Drop crumbs get a steering target pushed past the
//! ledge so the agent commits to the fall. Jumps are issued only after the
//! agent has been inactive for a while.

use glam::Vec3;
use nav_common::{clamp, distance_2d_squared, flatten, length_2d};
use nav_core::{
    AreaHandle, AttributeFlags, NavConfig, NavMesh, PLAYER_JUMP_HEIGHT, PLAYER_WIDTH,
    SMALL_DROP_GRACE,
};

use crate::path_state::PathState;
use crate::timer::TickTimer;

pub const REACH_RADIUS: f32 = 50.0;
pub const DROP_REACH_RADIUS: f32 = 28.0;
/// Planar distance at which the crumb after the current one counts as reached
const LOOK_AHEAD_RADIUS: f32 = 50.0;
const MAX_POPS_PER_TICK: usize = 32;
/// Planar speed below which the agent counts as stationary
const STATIONARY_SPEED: f32 = 40.0;
const JUMP_COOLDOWN: f32 = 0.2;

/// What the follower needs to know about the agent this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSnapshot {
    pub now: u64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub on_ground: bool,
    pub local_area: Option<AreaHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FollowStep {
    /// No trail
    Idle,
    /// The last crumb was consumed this tick
    Arrived,
    /// Walk toward `target`, jumping when `jump` is set
    Steer { target: Vec3, jump: bool },
}

#[derive(Debug, Default)]
pub struct CrumbFollower {
    inactivity: TickTimer,
    crumb_timer: TickTimer,
    jump_timer: TickTimer,
    current_area: Option<AreaHandle>,
}

impl CrumbFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the agent made no progress for `ticks`
    pub fn is_inactive(&self, now: u64, ticks: u64) -> bool {
        self.inactivity.check(now, ticks)
    }

    /// Marks the agent as making progress
    pub fn touch(&mut self, now: u64) {
        self.inactivity.update(now);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn consume(&mut self, path: &mut PathState, now: u64) -> bool {
        if let Some(crumb) = path.trail.pop_front() {
            path.last_crumb = Some(crumb);
        }
        self.crumb_timer.update(now);
        self.inactivity.update(now);
        path.trail.is_empty()
    }

    /// Advances along the trail and returns this tick's movement intent
    pub fn step(
        &mut self,
        path: &mut PathState,
        mesh: &NavMesh,
        agent: &AgentSnapshot,
        config: &NavConfig,
    ) -> FollowStep {
        if path.trail.is_empty() {
            path.finish();
            return FollowStep::Idle;
        }

        let now = agent.now;
        let origin = agent.position;
        let mut move_target = origin;
        let mut move_dir = Vec3::ZERO;
        let mut drop_crumb = false;

        for _ in 0..MAX_POPS_PER_TICK {
            let Some(active) = path.trail.front().copied() else {
                break;
            };
            if self.current_area != Some(active.area) {
                self.crumb_timer.update(now);
            }
            self.current_area = Some(active.area);

            drop_crumb = active.requires_drop;
            let crumb_target = active.pos;
            move_target = active.pos;

            let mut dir = flatten(&active.approach_dir);
            if length_2d(&dir) < 0.01 {
                if let Some(next) = path.trail.get(1) {
                    dir = flatten(&(next.pos - active.pos));
                }
            }
            if length_2d(&dir) < 0.01 && drop_crumb {
                dir = flatten(&path.path_dir);
                if length_2d(&dir) < 0.01 {
                    if let Some(area) = mesh.area(active.area) {
                        dir = flatten(&(active.pos - area.center()));
                    }
                }
                if length_2d(&dir) < 0.01 {
                    dir = flatten(&(active.pos - origin));
                }
            }

            let dir_len = length_2d(&dir);
            move_dir = if dir_len > 0.01 { dir / dir_len } else { Vec3::ZERO };
            if drop_crumb && dir_len > 0.01 {
                let push = if active.approach_distance <= 0.0 {
                    active.drop_height * 0.5
                } else {
                    active.approach_distance
                };
                move_target += move_dir * clamp(push, PLAYER_WIDTH * 0.8, PLAYER_WIDTH * 2.5);
            }
            path.path_dir = move_dir;

            let reach = if drop_crumb { DROP_REACH_RADIUS } else { REACH_RADIUS };
            let vertical_tolerance = clamp(PLAYER_JUMP_HEIGHT * 0.75, 26.0, 42.0);

            if !drop_crumb
                && distance_2d_squared(&crumb_target, &origin) < reach * reach
                && (crumb_target.z - origin.z).abs() <= vertical_tolerance
            {
                if self.consume(path, now) {
                    path.finish();
                    return FollowStep::Arrived;
                }
                continue;
            }

            if !drop_crumb {
                if let Some(next) = path.trail.get(1).copied() {
                    if distance_2d_squared(&next.pos, &origin) < LOOK_AHEAD_RADIUS * LOOK_AHEAD_RADIUS
                        && (next.pos.z - origin.z).abs() <= PLAYER_JUMP_HEIGHT
                    {
                        if self.consume(path, now) {
                            path.finish();
                            return FollowStep::Arrived;
                        }
                        // The agent already stands at the following crumb
                        path.last_crumb = Some(next);
                        continue;
                    }
                }
            }

            if drop_crumb {
                let completion = SMALL_DROP_GRACE.max(active.drop_height * 0.5);
                let mut completed = crumb_target.z - origin.z >= completion;

                if !completed && active.drop_height > SMALL_DROP_GRACE {
                    completed = agent
                        .local_area
                        .map_or(false, |area| area != active.area);
                }
                if !completed {
                    if let Some(next) = path.trail.get(1) {
                        let radius = REACH_RADIUS.max(reach + 12.0);
                        completed = distance_2d_squared(&next.pos, &origin) < radius * radius;
                    }
                }

                if completed {
                    if self.consume(path, now) {
                        path.finish();
                        return FollowStep::Arrived;
                    }
                    continue;
                }
            }

            break;
        }

        let mut jump = false;

        // Progress check only applies while the crumb is fresh
        if !self.crumb_timer.check(now, config.ticks(config.stuck_detect_time)) {
            if length_2d(&agent.velocity) > STATIONARY_SPEED {
                self.inactivity.update(now);
            } else if drop_crumb {
                move_target += move_dir * (PLAYER_WIDTH * 1.25);
                jump = agent.on_ground;
                self.inactivity.update(now);
            }
        }

        let mut prevent_jump = drop_crumb;
        if let (Some(c0), Some(c1)) = (path.trail.front(), path.trail.get(1)) {
            if c1.pos.z <= c0.pos.z - PLAYER_JUMP_HEIGHT {
                prevent_jump = true;
            }
        }
        let jump_allowed = agent
            .local_area
            .and_then(|area| mesh.area(area))
            .map_or(false, |area| {
                !area.attributes.contains(AttributeFlags::NO_JUMP)
                    && !area.attributes.contains(AttributeFlags::STAIRS)
            });

        if !prevent_jump
            && jump_allowed
            && self.inactivity.check(now, config.ticks(config.stuck_time / 2.0))
            && self.jump_timer.check(now, config.ticks(JUMP_COOLDOWN))
        {
            jump = true;
            self.jump_timer.update(now);
        }

        FollowStep::Steer {
            target: move_target,
            jump,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::Priority;
    use nav_core::test_mesh_helpers::{create_ledge_mesh, create_two_area_mesh};
    use nav_core::Crumb;

    fn trail_state(crumbs: &[Crumb]) -> PathState {
        let mut path = PathState::new();
        path.priority = Priority::Patrol;
        path.trail.extend(crumbs.iter().copied());
        path
    }

    fn snapshot(now: u64, position: Vec3, local_area: u32) -> AgentSnapshot {
        AgentSnapshot {
            now,
            position,
            velocity: Vec3::ZERO,
            on_ground: true,
            local_area: Some(AreaHandle::new(local_area)),
        }
    }

    fn two_area_trail() -> PathState {
        let (a, b) = (AreaHandle::new(0), AreaHandle::new(1));
        trail_state(&[
            Crumb::new(Vec3::new(50.0, 50.0, 0.0), a),
            Crumb::new(Vec3::new(100.0, 50.0, 0.0), a),
            Crumb::new(Vec3::new(150.0, 50.0, 0.0), b),
        ])
    }

    #[test]
    fn test_reached_crumb_is_consumed() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let mut path = two_area_trail();
        let mut follower = CrumbFollower::new();

        let step = follower.step(&mut path, &mesh, &snapshot(100, Vec3::new(10.0, 50.0, 0.0), 0), &config);
        assert_eq!(
            step,
            FollowStep::Steer {
                target: Vec3::new(100.0, 50.0, 0.0),
                jump: false
            }
        );
        assert_eq!(path.trail.len(), 2);
        assert_eq!(path.last_crumb.unwrap().pos, Vec3::new(50.0, 50.0, 0.0));
        assert_eq!(path.path_dir, Vec3::X);
    }

    #[test]
    fn test_look_ahead_records_the_crumb_reached() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let (a, b) = (AreaHandle::new(0), AreaHandle::new(1));
        let ledge = Crumb::new(Vec3::new(160.0, 50.0, 45.0), b);
        let mut path = trail_state(&[
            Crumb::new(Vec3::new(100.0, 50.0, 0.0), a),
            ledge,
            Crumb::new(Vec3::new(400.0, 50.0, 45.0), b),
        ]);
        let mut follower = CrumbFollower::new();

        // Too far from the front crumb, close enough to the next one but
        // beyond the reach tolerance in height
        let step = follower.step(&mut path, &mesh, &snapshot(100, Vec3::new(150.0, 50.0, 0.0), 1), &config);
        assert_eq!(
            step,
            FollowStep::Steer {
                target: ledge.pos,
                jump: false
            }
        );
        assert_eq!(path.trail.len(), 2);
        assert_eq!(path.last_crumb, Some(ledge));
    }

    #[test]
    fn test_consuming_last_crumb_goes_idle() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let mut path = trail_state(&[Crumb::new(Vec3::new(150.0, 50.0, 0.0), AreaHandle::new(1))]);
        let mut follower = CrumbFollower::new();

        let step = follower.step(&mut path, &mesh, &snapshot(5, Vec3::new(140.0, 50.0, 0.0), 1), &config);
        assert_eq!(step, FollowStep::Arrived);
        assert_eq!(path.priority(), Priority::None);

        let step = follower.step(&mut path, &mesh, &snapshot(6, Vec3::new(140.0, 50.0, 0.0), 1), &config);
        assert_eq!(step, FollowStep::Idle);
    }

    #[test]
    fn test_jump_after_inactivity_with_cooldown() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let mut path = two_area_trail();
        let mut follower = CrumbFollower::new();
        let frozen = Vec3::new(10.0, 50.0, 0.0);

        let jumps: Vec<u64> = (100..130)
            .filter(|&now| {
                matches!(
                    follower.step(&mut path, &mesh, &snapshot(now, frozen, 0), &config),
                    FollowStep::Steer { jump: true, .. }
                )
            })
            .collect();

        // stuck_time / 2 = 6 ticks of inactivity, 13 ticks between jumps
        assert_eq!(jumps, vec![106, 119]);
    }

    #[test]
    fn test_no_jump_before_a_descent() {
        let mesh = create_ledge_mesh();
        let config = NavConfig::new();
        let mut path = trail_state(&[
            Crumb::new(Vec3::new(50.0, 50.0, 120.0), AreaHandle::new(0)),
            Crumb::new(Vec3::new(200.0, 50.0, 0.0), AreaHandle::new(1)),
        ]);
        let mut follower = CrumbFollower::new();

        let step = follower.step(&mut path, &mesh, &snapshot(50, Vec3::new(0.0, 50.0, 120.0), 0), &config);
        assert_eq!(
            step,
            FollowStep::Steer {
                target: Vec3::new(50.0, 50.0, 120.0),
                jump: false
            }
        );
    }

    #[test]
    fn test_drop_crumb_pushes_past_ledge_until_landed() {
        let mesh = create_ledge_mesh();
        let config = NavConfig::new();
        let mut drop = Crumb::new(Vec3::new(100.0, 50.0, 120.0), AreaHandle::new(0));
        drop.requires_drop = true;
        drop.drop_height = 120.0;
        drop.approach_distance = 30.0;
        drop.approach_dir = Vec3::X;
        let mut path = trail_state(&[drop, Crumb::new(Vec3::new(250.0, 50.0, 0.0), AreaHandle::new(1))]);
        let mut follower = CrumbFollower::new();

        let mut agent = snapshot(10, Vec3::new(60.0, 50.0, 120.0), 0);
        agent.velocity = Vec3::new(200.0, 0.0, 0.0);
        let FollowStep::Steer { target, jump } = follower.step(&mut path, &mesh, &agent, &config) else {
            panic!("expected steering");
        };
        assert!((target.x - (100.0 + PLAYER_WIDTH * 0.8)).abs() < 1e-3);
        assert_eq!(target.z, 120.0);
        assert!(!jump);
        assert_eq!(path.trail.len(), 2);

        // Landed on the lower floor
        let mut landed = snapshot(11, Vec3::new(130.0, 50.0, 0.0), 1);
        landed.velocity = Vec3::new(200.0, 0.0, 0.0);
        let step = follower.step(&mut path, &mesh, &landed, &config);
        assert_eq!(
            step,
            FollowStep::Steer {
                target: Vec3::new(250.0, 50.0, 0.0),
                jump: false
            }
        );
        assert!(path.last_crumb.unwrap().requires_drop);
    }

    #[test]
    fn test_stationary_on_drop_crumb_jumps_forward() {
        let mesh = create_ledge_mesh();
        let config = NavConfig::new();
        let mut drop = Crumb::new(Vec3::new(100.0, 50.0, 120.0), AreaHandle::new(0));
        drop.requires_drop = true;
        drop.drop_height = 120.0;
        drop.approach_dir = Vec3::X;
        let mut path = trail_state(&[drop, Crumb::new(Vec3::new(250.0, 50.0, 0.0), AreaHandle::new(1))]);
        let mut follower = CrumbFollower::new();

        let agent = snapshot(10, Vec3::new(90.0, 50.0, 120.0), 0);
        let FollowStep::Steer { target, jump } = follower.step(&mut path, &mesh, &agent, &config) else {
            panic!("expected steering");
        };
        // drop / 2 push plus the stationary nudge
        let expected = 100.0 + 60.0 + PLAYER_WIDTH * 1.25;
        assert!((target.x - expected).abs() < 1e-3);
        assert!(jump);
    }
}
