//! Edge costs for the area graph
//!
//! [`evaluate_connection_cost`] is the static geometric cost of an edge. It is
//! cached in the [`EdgeCache`] together with the crossing geometry.
//! [`adjacent_costs`] expands one area: it reuses or refreshes cache entries,
//! rejects edges the agent cannot physically take, and layers the dynamic
//! hazard, danger and stuck-history terms on top of the cached base cost.

use nav_common::{clamp, distance_2d, flatten};

use crate::area::{AreaHandle, AttributeFlags, ContextFlags, NavArea, Team};
use crate::config::NavConfig;
use crate::connection::{
    determine_points, handle_dropdown, DropdownHint, NavPoints, PLAYER_CROUCHED_JUMP_HEIGHT,
    PLAYER_JUMP_HEIGHT, PLAYER_WIDTH,
};
use crate::edge_cache::{is_live, EdgeCache, EdgeCacheEntry, VisibilityState};
use crate::hazard::HazardLedger;
use crate::nav_mesh::NavMesh;
use crate::trace::{is_player_passable, TraceService};

/// Cost added for areas flagged AVOID
pub const AVOID_PENALTY: f32 = 100_000.0;

/// Longest lifetime of a solver-written cache entry, in seconds
pub const MAX_SOLVER_CACHE_TIME: f32 = 45.0;

/// Lifetime of an "unreachable" verdict, in seconds
pub const UNREACHABLE_CACHE_TIME: f32 = 90.0;

const IGNORE_TRACES_MULTIPLIER: f32 = 1.2;
const JITTER_RANGE: f32 = 0.15;

/// Externally supplied environmental danger per area
pub trait DangerMap {
    fn danger(&self, area: AreaHandle) -> f32;
}

/// Inputs that vary per solve
pub struct CostContext<'a> {
    pub now: u64,
    pub team: Team,
    pub agent_id: u32,
    /// Skip feasibility checks and dynamic penalties
    pub ignore_traces: bool,
    pub randomize: bool,
    /// Absolute tick at which fresh cache entries expire
    pub cache_expiry: u64,
    /// Absolute tick at which unreachable verdicts expire
    pub unreachable_expiry: u64,
    pub trace: Option<&'a dyn TraceService>,
    pub danger: Option<&'a dyn DangerMap>,
}

impl<'a> CostContext<'a> {
    pub fn new(config: &NavConfig, now: u64) -> Self {
        let cache_time = config.vischeck_cache_time.min(MAX_SOLVER_CACHE_TIME);
        Self {
            now,
            team: Team::Unassigned,
            agent_id: 0,
            ignore_traces: false,
            randomize: config.path_randomization,
            cache_expiry: config.timestamp(now, cache_time),
            unreachable_expiry: config.timestamp(now, UNREACHABLE_CACHE_TIME),
            trace: None,
            danger: None,
        }
    }

    pub fn with_agent(mut self, team: Team, agent_id: u32) -> Self {
        self.team = team;
        self.agent_id = agent_id;
        self
    }

    pub fn with_trace(mut self, trace: Option<&'a dyn TraceService>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_danger(mut self, danger: Option<&'a dyn DangerMap>) -> Self {
        self.danger = danger;
        self
    }

    pub fn with_ignore_traces(mut self, ignore: bool) -> Self {
        self.ignore_traces = ignore;
        self
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }
}

/// Static cost of walking from `current` into `next` through `points`
pub fn evaluate_connection_cost(
    next: &NavArea,
    points: &NavPoints,
    dropdown: &DropdownHint,
    team: Team,
) -> f32 {
    let forward = distance_2d(&points.current, &points.next).max(1.0);
    let deviation_start = distance_2d(&points.current, &points.center);
    let deviation_end = distance_2d(&points.center, &points.next);
    let height_diff = points.next.z - points.current.z;

    let mut cost = forward + deviation_start * 0.3 + deviation_end * 0.2;

    if height_diff > 0.0 {
        cost += height_diff * 1.8;
    } else if height_diff < -8.0 {
        cost += height_diff.abs() * 0.9;
    }

    if dropdown.requires_drop {
        cost += dropdown.drop_height * 2.2 + dropdown.approach_distance * 0.45;
    } else if dropdown.approach_distance > 0.0 {
        cost += dropdown.approach_distance * 0.25;
    }

    let leg_in = flatten(&(points.center - points.current));
    let leg_out = flatten(&(points.next - points.center));
    let (len_in, len_out) = (leg_in.length(), leg_out.length());
    if len_in > 1.0 && len_out > 1.0 {
        let dot = clamp((leg_in / len_in).dot(leg_out / len_out), -1.0, 1.0);
        cost += (1.0 - dot) * 30.0;
    }

    let size = next.diagonal_2d();
    if size > 0.0 {
        cost -= clamp(size * 0.01, 0.0, 12.0);
    }

    cost += spawn_penalty(next, team);

    if next.attributes.contains(AttributeFlags::AVOID) {
        cost += AVOID_PENALTY;
    }
    if next.attributes.contains(AttributeFlags::CROUCH) {
        cost += forward * 5.0;
    }

    cost.max(1.0)
}

fn spawn_penalty(area: &NavArea, team: Team) -> f32 {
    let red = area.context.contains(ContextFlags::SPAWN_ROOM_RED);
    let blue = area.context.contains(ContextFlags::SPAWN_ROOM_BLUE);
    if !red && !blue {
        return 0.0;
    }
    if area.is_enemy_spawn(team) {
        220.0
    } else if red && blue {
        60.0
    } else {
        40.0
    }
}

/// Per-agent multiplicative noise in `[1, 1.15)`
pub fn jitter(area_id: u32, agent_id: u32) -> f32 {
    let seed = (area_id ^ agent_id) ^ 0xDEAD_BEEF;
    let seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    let noise = (seed & 0xFFFF) as f32 / 65536.0;
    1.0 + noise * JITTER_RANGE
}

struct Feasibility {
    /// Higher than a crouched jump
    too_high: bool,
    /// Needs more vertical gain than any jump provides
    clearly_unreachable: bool,
    /// Stacked areas joined by a steep link; only taken when probes confirm it
    suspicious: bool,
}

fn classify_vertical_link(
    current: &NavArea,
    next: &NavArea,
    points: &NavPoints,
    is_one_way: bool,
) -> Feasibility {
    let up = points.center_next.z - points.center.z;
    let planar = distance_2d(&points.center, &points.center_next);
    let center_planar = distance_2d(&current.center(), &next.center());
    let overlap_x = current.se.x.min(next.se.x) - current.nw.x.max(next.nw.x);
    let overlap_y = current.se.y.min(next.se.y) - current.nw.y.max(next.nw.y);
    let stacked = overlap_x > PLAYER_WIDTH * 1.2 && overlap_y > PLAYER_WIDTH * 1.2;

    let suspicious = !is_one_way
        && up > (PLAYER_CROUCHED_JUMP_HEIGHT * 0.8).max(36.0)
        && stacked
        && center_planar < PLAYER_WIDTH * 0.75
        && planar < PLAYER_WIDTH * 0.4;
    let clearly_unreachable = !is_one_way
        && (up > PLAYER_CROUCHED_JUMP_HEIGHT + 10.0
            || (up > PLAYER_JUMP_HEIGHT * 1.35 && planar < PLAYER_WIDTH * 1.1));

    Feasibility {
        too_high: up > PLAYER_CROUCHED_JUMP_HEIGHT,
        clearly_unreachable,
        suspicious,
    }
}

/// Expands `current`, pushing `(neighbor, cost)` pairs into `out`
///
/// Cache entries for each inspected edge are created or refreshed as a side
/// effect. Edges that are hard-blocked, stuck-blacklisted, physically
/// unreachable or carry an infinite hazard penalty are omitted.
pub fn adjacent_costs(
    mesh: &NavMesh,
    edges: &mut EdgeCache,
    hazards: &HazardLedger,
    ctx: &CostContext<'_>,
    current: AreaHandle,
    out: &mut Vec<(AreaHandle, f32)>,
) {
    let Some(current_area) = mesh.area(current) else {
        return;
    };

    for &next in current_area.connections() {
        if next == current {
            continue;
        }
        let Some(next_area) = mesh.area(next) else {
            continue;
        };
        if next_area.attributes.contains(AttributeFlags::NAV_BLOCKER)
            || next_area.context.contains(ContextFlags::BLOCKED)
        {
            continue;
        }
        if edges.is_area_stuck_blacklisted(next, ctx.now) {
            continue;
        }

        let mut hazard_penalty = 0.0;
        if !hazards.is_blocked() && !ctx.ignore_traces {
            if let Some(penalty) = hazards.penalty_at(next, ctx.now) {
                if !penalty.is_finite() {
                    continue;
                }
                hazard_penalty = penalty;
            }
        }

        let key = (current, next);
        let entry = edges.entry_mut(key);
        let blocked = entry.is_live_block(ctx.now);
        if blocked && (entry.stuck_blacklist || !ctx.ignore_traces) {
            continue;
        }

        let mut base_cost;
        if !blocked
            && is_live(entry.expire_tick, ctx.now)
            && entry.state == VisibilityState::Visible
            && entry.cached_cost < f32::MAX
        {
            base_cost = entry.cached_cost;
        } else {
            let is_one_way = mesh.is_one_way(current, next);
            let mut points = determine_points(current_area, next_area);
            let dropdown = handle_dropdown(ctx.trace, points.center, points.next, is_one_way);
            points.center = dropdown.adjusted_pos;

            if !ctx.ignore_traces {
                let verdict = classify_vertical_link(current_area, next_area, &points, is_one_way);
                let blocked_until = if verdict.clearly_unreachable {
                    Some(ctx.unreachable_expiry)
                } else if verdict.too_high {
                    Some(ctx.cache_expiry)
                } else if verdict.suspicious {
                    let confirmed = ctx.trace.is_some_and(|trace| {
                        is_player_passable(trace, points.current, points.center)
                            && is_player_passable(trace, points.center, points.next)
                    });
                    (!confirmed).then_some(ctx.unreachable_expiry)
                } else {
                    None
                };
                if let Some(expire) = blocked_until {
                    *entry = EdgeCacheEntry {
                        points,
                        dropdown,
                        ..EdgeCacheEntry::blocked(expire, false)
                    };
                    continue;
                }
            }

            base_cost = evaluate_connection_cost(next_area, &points, &dropdown, ctx.team);
            // Crossing a blocked edge with traces ignored leaves the block cached
            if !blocked {
                *entry = EdgeCacheEntry {
                    expire_tick: ctx.cache_expiry,
                    state: VisibilityState::Visible,
                    cached_cost: base_cost,
                    dropdown,
                    points,
                    stuck_blacklist: false,
                };
            }
        }

        if !blocked {
            if !base_cost.is_finite() || base_cost <= 0.0 {
                base_cost =
                    evaluate_connection_cost(next_area, &entry.points, &entry.dropdown, ctx.team);
                entry.cached_cost = base_cost;
            }
            entry.expire_tick = ctx.cache_expiry;
        }

        let mut cost = base_cost;
        if ctx.ignore_traces {
            cost *= IGNORE_TRACES_MULTIPLIER;
        } else {
            if hazard_penalty > 0.0 {
                cost += clamp(hazard_penalty * 0.2, 0.0, 350.0);
            }
            if let Some(danger) = ctx.danger {
                cost += clamp(danger.danger(next) * 0.02, 0.0, 220.0);
            }
            if let Some(record) = edges.stuck_record(&key) {
                if is_live(record.expire_tick, ctx.now) {
                    cost += clamp(record.time_stuck as f32 * 18.0, 12.0, 160.0);
                }
            }
        }

        if !cost.is_finite() || cost <= 0.0 {
            continue;
        }
        if ctx.randomize {
            cost *= jitter(next_area.id, ctx.agent_id);
        }

        out.push((next, cost));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use crate::hazard::HazardReason;
    use crate::test_mesh_helpers::{create_grid_mesh, create_two_area_mesh};

    fn context(config: &NavConfig) -> CostContext<'_> {
        CostContext::new(config, 100).with_randomize(false)
    }

    fn single_edge_cost(mesh: &NavMesh, hazards: &HazardLedger, ctx: &CostContext<'_>) -> f32 {
        let mut edges = EdgeCache::new();
        let mut out = Vec::new();
        adjacent_costs(mesh, &mut edges, hazards, ctx, AreaHandle::new(0), &mut out);
        assert_eq!(out.len(), 1);
        out[0].1
    }

    #[test]
    fn test_level_edge_cost() {
        let mesh = create_two_area_mesh(true);
        let a = mesh.area(AreaHandle::new(0)).unwrap();
        let b = mesh.area(AreaHandle::new(1)).unwrap();
        let points = determine_points(a, b);
        assert_eq!(points.center, Vec3::new(100.0, 50.0, 0.0));
        let cost = evaluate_connection_cost(b, &points, &DropdownHint::default(), Team::Red);
        // 100 forward + 15 + 10 deviation - 1.41 size bonus
        assert!((cost - (125.0 - b.diagonal_2d() * 0.01)).abs() < 1e-3);
    }

    #[test]
    fn test_cost_never_below_floor() {
        let huge = NavArea::flat(9, [0.0, 0.0], [100_000.0, 100_000.0], 0.0);
        let points = NavPoints::default();
        let cost = evaluate_connection_cost(&huge, &points, &DropdownHint::default(), Team::Red);
        assert_eq!(cost, 1.0);
    }

    #[test]
    fn test_hazard_raises_cost_monotonically() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let ctx = context(&config);
        let target = AreaHandle::new(1);

        let mut previous = single_edge_cost(&mesh, &HazardLedger::new(), &ctx);
        for reason in [
            HazardReason::BadBuildSpot,
            HazardReason::EnemyNormal,
            HazardReason::SentryLow,
            HazardReason::Sticky,
            HazardReason::Sentry,
        ] {
            let mut hazards = HazardLedger::new();
            hazards.insert(target, reason, 0);
            let cost = single_edge_cost(&mesh, &hazards, &ctx);
            assert!(cost > previous, "{reason} did not raise the cost");
            previous = cost;
        }
    }

    #[test]
    fn test_impassable_hazard_removes_edge() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let ctx = context(&config);
        let mut hazards = HazardLedger::new();
        hazards.insert(AreaHandle::new(1), HazardReason::Impassable, 0);

        let mut edges = EdgeCache::new();
        let mut out = Vec::new();
        adjacent_costs(&mesh, &mut edges, &hazards, &ctx, AreaHandle::new(0), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_ignore_traces_scales_and_skips_hazards() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let strict = context(&config);
        let relaxed = context(&config).with_ignore_traces(true);
        let mut hazards = HazardLedger::new();
        hazards.insert(AreaHandle::new(1), HazardReason::Sentry, 0);

        let base = single_edge_cost(&mesh, &HazardLedger::new(), &strict);
        let ignored = single_edge_cost(&mesh, &hazards, &relaxed);
        assert!((ignored - base * 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_unreachable_climb_is_cached_as_blocked() {
        let mut mesh = create_two_area_mesh(false);
        let b = mesh.area_mut(AreaHandle::new(1)).unwrap();
        b.nw.z = 200.0;
        b.se.z = 200.0;
        b.ne_z = 200.0;
        b.sw_z = 200.0;
        b.update_derived();

        let config = NavConfig::new();
        let ctx = context(&config);
        let mut edges = EdgeCache::new();
        let mut out = Vec::new();
        adjacent_costs(&mesh, &mut edges, &HazardLedger::new(), &ctx, AreaHandle::new(0), &mut out);
        assert!(out.is_empty());
        let entry = edges.get(&(AreaHandle::new(0), AreaHandle::new(1))).unwrap();
        assert_eq!(entry.state, VisibilityState::NotVisible);
        assert_eq!(entry.expire_tick, ctx.unreachable_expiry);
    }

    #[test]
    fn test_jitter_is_deterministic_and_bounded() {
        for area in 0..64 {
            let j = jitter(area, 7);
            assert_eq!(j, jitter(area, 7));
            assert!((1.0..1.15).contains(&j));
        }
    }

    #[test]
    fn test_cache_reused_between_expansions() {
        let mesh = create_grid_mesh(3, 3, 100.0);
        let config = NavConfig::new();
        let ctx = context(&config);
        let hazards = HazardLedger::new();
        let mut edges = EdgeCache::new();

        let mut first = Vec::new();
        adjacent_costs(&mesh, &mut edges, &hazards, &ctx, AreaHandle::new(4), &mut first);
        let cached = edges.len();
        let mut second = Vec::new();
        adjacent_costs(&mesh, &mut edges, &hazards, &ctx, AreaHandle::new(4), &mut second);

        assert_eq!(first.len(), 4);
        assert_eq!(cached, 4);
        assert_eq!(edges.len(), cached);
        assert_eq!(first, second);
    }

    #[test]
    fn test_stuck_history_adds_penalty() {
        let mesh = create_two_area_mesh(true);
        let config = NavConfig::new();
        let ctx = context(&config);
        let hazards = HazardLedger::new();
        let key = (AreaHandle::new(0), AreaHandle::new(1));

        let mut edges = EdgeCache::new();
        let mut plain = Vec::new();
        adjacent_costs(&mesh, &mut edges, &hazards, &ctx, key.0, &mut plain);

        edges.add_stuck_time(key, 3, 0);
        let mut stuck = Vec::new();
        adjacent_costs(&mesh, &mut edges, &hazards, &ctx, key.0, &mut stuck);
        assert!((stuck[0].1 - plain[0].1 - 54.0).abs() < 1e-3);
    }
}
