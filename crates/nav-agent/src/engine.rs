//! The per-agent navigation engine
//!
//! [`NavEngine`] owns the active map and the agent's single path slot.
//! Goal layers call [`NavEngine::request_path`]; the host calls
//! [`NavEngine::run`] once per simulation tick. Every failure is reported
//! through a boolean plus [`NavEngine::last_failure_reason`], never a panic
//! or an `Err`.

use std::path::Path;

use glam::Vec3;
use log::{debug, info, warn};
use nav_common::distance_squared;
use nav_core::{
    append_cached_crumbs, build_intra_area_crumbs, determine_points, handle_dropdown,
    is_player_passable, AreaHandle, CollisionMask, ContextFlags, CostContext, Crumb, CrumbTrail,
    EdgeCache, HazardEntry, HazardReason, NavConfig, NavMap, NavMesh, PathOutcome, TraceService,
    MAX_SOLVER_CACHE_TIME, PLAYER_CROUCHED_JUMP_HEIGHT, SMALL_DROP_GRACE,
};

use crate::context::{NavContext, SpawnRoom, WorldDanger};
use crate::follower::{AgentSnapshot, CrumbFollower, FollowStep};
use crate::hazard_scan::{apply_threats, HazardWatch};
use crate::path_state::{PathRequest, PathState};
use crate::priority::Priority;
use crate::recovery::{blacklist_stuck, EscalationLadder};
use crate::timer::TickTimer;

/// A request for nearly the same destination keeps the current trail
const REUSE_DESTINATION_RADIUS: f32 = 160.0;
/// Below the cached local area by more than this forces a new lookup
const LOCAL_AREA_BELOW_SLACK: f32 = 8.0;
/// Fraction of the way back onto the mesh that must be clear
const OFF_MESH_MIN_FRACTION: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// No usable mesh is loaded
    Unavailable,
    Active,
}

/// Counters for the recovery paths taken since the mesh was loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavStats {
    /// Paths dropped while being followed
    pub abandons: u32,
    /// Stuck edges blacklisted
    pub stuck_blacklists: u32,
    /// Retries with geometry checks disabled
    pub emergency_fallbacks: u32,
    /// Scheduled repaths attempted
    pub repaths: u32,
}

/// Outcome of probing consecutive crumbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrailProbe {
    Clear,
    /// A live cache entry says a pair is impassable
    BlockedCached,
    /// A fresh probe failed; the pair is now cached as impassable
    Blocked,
}

/// Probes each consecutive crumb pair, keyed by the crumbs' areas
///
/// Live impassable verdicts are trusted. Live passable verdicts are trusted
/// unless `retrace` is set. Every other pair is traced and recorded until
/// `expire_tick`. Stops at the first impassable pair.
fn probe_trail(
    edges: &mut EdgeCache,
    trail: &CrumbTrail,
    trace: &dyn TraceService,
    now: u64,
    expire_tick: u64,
    retrace: bool,
) -> TrailProbe {
    for (crumb, next) in trail.iter().zip(trail.iter().skip(1)) {
        let key = (crumb.area, next.area);
        match edges.cached_passability(&key, now) {
            Some(true) if !retrace => continue,
            Some(false) => return TrailProbe::BlockedCached,
            _ => {}
        }
        let passable = is_player_passable(trace, crumb.pos, next.pos);
        edges.record_probe(key, passable, expire_tick);
        if !passable {
            return TrailProbe::Blocked;
        }
    }
    TrailProbe::Clear
}

/// Explains why the local area leads nowhere, if it does
fn describe_local_exits(mesh: &NavMesh, local: AreaHandle, trace: &dyn TraceService) -> &'static str {
    let Some(area) = mesh.area(local) else {
        return "";
    };
    if area.connections().is_empty() {
        return " - Local area has no exits";
    }

    let any_possible = area.connections().iter().any(|&next| {
        let Some(next_area) = mesh.area(next) else {
            return false;
        };
        let mut points = determine_points(area, next_area);
        let drop = handle_dropdown(Some(trace), points.center, points.next, mesh.is_one_way(local, next));
        points.center = drop.adjusted_pos;

        is_player_passable(trace, points.current, points.center)
            && (is_player_passable(trace, points.center, points.next)
                || is_player_passable(trace, points.current, points.next))
    });

    if any_possible {
        ""
    } else {
        " - All local exits blocked by traces"
    }
}

/// Appends the final crumb, merging it into the last one when they coincide
fn push_end_crumb(trail: &mut CrumbTrail, end: Crumb) {
    match trail.back_mut() {
        Some(last) if distance_squared(&last.pos, &end.pos) < 1.0 => *last = end,
        _ => trail.push_back(end),
    }
}

/// Single-agent navigation over one loaded map
#[derive(Debug, Default)]
pub struct NavEngine {
    config: NavConfig,
    map: Option<NavMap>,
    local_area: Option<AreaHandle>,
    path: PathState,
    path_cost: f32,
    follower: CrumbFollower,
    ladder: EscalationLadder,
    watch: HazardWatch,
    vischeck_timer: TickTimer,
    spawn_rooms: Vec<SpawnRoom>,
    spawn_rooms_dirty: bool,
    exit_areas: Vec<AreaHandle>,
    stats: NavStats,
}

impl NavEngine {
    pub fn new(config: NavConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn map(&self) -> Option<&NavMap> {
        self.map.as_ref()
    }

    pub fn state(&self) -> NavState {
        match &self.map {
            Some(map) if !map.mesh().is_empty() => NavState::Active,
            _ => NavState::Unavailable,
        }
    }

    pub fn stats(&self) -> NavStats {
        self.stats
    }

    /// Loads a mesh file and makes it the active map
    ///
    /// A missing, truncated or unsupported file leaves the engine
    /// [`NavState::Unavailable`] and returns `false`.
    pub fn load_mesh<P: AsRef<Path>>(
        &mut self,
        map_name: &str,
        path: P,
        trace: Option<&dyn TraceService>,
    ) -> bool {
        let path = path.as_ref();
        match NavMesh::load(path) {
            Ok(mesh) => {
                self.load_mesh_from(map_name, mesh, trace);
                true
            }
            Err(e) => {
                warn!("Failed to load navigation mesh {}: {}", path.display(), e);
                self.unload();
                false
            }
        }
    }

    /// Makes an in-memory mesh the active map
    pub fn load_mesh_from(&mut self, map_name: &str, mesh: NavMesh, trace: Option<&dyn TraceService>) {
        self.unload();

        let mut map = NavMap::new(map_name, mesh);
        if let Some(dir) = &self.config.crumb_cache_dir {
            map.load_crumb_cache(dir, trace);
        }
        info!(
            "Loaded navigation mesh {} with {} areas",
            map_name,
            map.mesh().area_count()
        );

        self.map = Some(map);
        self.spawn_rooms_dirty = !self.spawn_rooms.is_empty();
    }

    /// Flushes a dirty crumb cache and drops the active map
    pub fn unload(&mut self) {
        if self.map.is_some() {
            self.flush_crumb_cache();
        }
        self.map = None;
        self.local_area = None;
        self.path = PathState::new();
        self.path_cost = 0.0;
        self.follower.reset();
        self.ladder.reset();
        self.watch.reset();
        self.vischeck_timer.reset();
        self.exit_areas.clear();
        self.stats = NavStats::default();
    }

    /// Writes the crumb cache when it has unsaved edges; returns whether a
    /// file was written
    pub fn flush_crumb_cache(&mut self) -> bool {
        let (Some(map), Some(dir)) = (self.map.as_mut(), self.config.crumb_cache_dir.as_ref()) else {
            return false;
        };
        match map.flush_crumb_cache(dir) {
            Ok(written) => written,
            Err(e) => {
                warn!("Failed to save crumb cache for {}: {}", map.name(), e);
                false
            }
        }
    }

    pub fn is_following_path(&self) -> bool {
        self.path.is_following()
    }

    pub fn current_trail(&self) -> &CrumbTrail {
        self.path.trail()
    }

    pub fn current_priority(&self) -> Priority {
        self.path.priority()
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.path.destination()
    }

    pub fn last_failure_reason(&self) -> &str {
        self.path.failure_reason()
    }

    pub fn is_repath_pending(&self) -> bool {
        self.path.is_repath_pending()
    }

    /// Solver cost of the path being followed
    pub fn current_path_cost(&self) -> f32 {
        self.path_cost
    }

    pub fn cancel_path(&mut self) {
        self.path.cancel();
    }

    pub fn local_area(&self) -> Option<AreaHandle> {
        self.local_area
    }

    pub fn find_closest_area(&self, pos: &Vec3) -> Option<AreaHandle> {
        self.map.as_ref()?.find_closest_area(pos, false)
    }

    /// Areas flagged as spawn-room exits by the last spawn-room update
    pub fn exit_areas(&self) -> &[AreaHandle] {
        &self.exit_areas
    }

    /// Resolves the agent's area, reusing the cached one while the agent is
    /// still plausibly on it
    fn update_local_area(&mut self, pos: Vec3) -> Option<AreaHandle> {
        let map = self.map.as_ref()?;
        let stale = match self.local_area.and_then(|handle| map.mesh().area(handle)) {
            Some(area) => {
                !area.is_overlapping(&pos, 0.0)
                    || pos.z < area.min_z() - LOCAL_AREA_BELOW_SLACK
                    || pos.z > area.max_z() + PLAYER_CROUCHED_JUMP_HEIGHT
            }
            None => true,
        };
        if stale {
            self.local_area = map.find_closest_area(&pos, true);
        }
        self.local_area
    }

    fn reject(&mut self, reason: &str) -> bool {
        debug!("Path request rejected: {}", reason);
        self.path.failure_reason = reason.to_string();
        false
    }

    fn abandon(&mut self, reason: &str, now: u64) {
        self.stats.abandons += 1;
        self.path.abandon(reason, now, &self.config);
    }

    /// Replaces the current path with one to `request.destination`
    ///
    /// Returns `false` with a failure reason when the request is refused or
    /// no traversable path exists. Repeated strict failures toward the same
    /// destination escalate to one retry with geometry checks disabled.
    pub fn request_path(&mut self, ctx: &NavContext<'_>, request: PathRequest) -> bool {
        let world = ctx.world;
        let now = world.tick();
        self.path.failure_reason.clear();

        if self.state() != NavState::Active || !world.is_alive() || world.movement_locked() {
            return self.reject("Not ready");
        }
        if request.priority < self.path.priority {
            return self.reject("Priority too low");
        }

        let previous_destination = self.path.destination;
        let previous_partial = self.path.allow_partial;
        let previous_ignore = self.path.ignore_geometry;
        self.path.begin(&request);

        let origin = world.agent_position();
        let Some(start) = self.update_local_area(origin) else {
            return self.reject("No local nav area");
        };
        let Some(goal) = self.find_closest_area(&request.destination) else {
            return self.reject("No destination nav area");
        };

        let reusable = self.path.is_following()
            && !self.path.repath_requested
            && request.priority == self.path.priority
            && request.allow_partial == previous_partial
            && request.ignore_geometry == previous_ignore
            && previous_destination.is_some_and(|dest| {
                distance_squared(&dest, &request.destination)
                    <= REUSE_DESTINATION_RADIUS * REUSE_DESTINATION_RADIUS
            });
        if reusable {
            return true;
        }

        let ignore = request.ignore_geometry;
        let Some(map) = self.map.as_mut() else {
            return self.reject("Not ready");
        };

        let outcome = {
            let danger = WorldDanger(world);
            let cost_ctx = CostContext::new(&self.config, now)
                .with_agent(world.agent_team(), world.agent_id())
                .with_trace(Some(ctx.trace))
                .with_danger(Some(&danger))
                .with_ignore_traces(ignore);
            if start == goal {
                Ok(PathOutcome::StartEndSame)
            } else {
                map.find_path(&cost_ctx, start, goal)
            }
        };

        let mut partial = false;
        let solved = match outcome {
            Ok(PathOutcome::Found(path)) => Some(path),
            Ok(PathOutcome::StartEndSame) => None,
            Ok(PathOutcome::NoSolution {
                partial: Some(path),
            }) if request.allow_partial && path.areas.len() > 1 => {
                partial = true;
                Some(path)
            }
            Ok(PathOutcome::NoSolution { .. }) => {
                if !ignore {
                    let step = self.ladder.record_failure(
                        "No solution found",
                        request.destination,
                        request.priority,
                        now,
                        &self.config,
                    );
                    if step.is_fallback() {
                        self.stats.emergency_fallbacks += 1;
                        return self.request_path(ctx, request.with_ignore_geometry(true));
                    }
                }
                let exits = describe_local_exits(map.mesh(), start, ctx.trace);
                return self.reject(&format!("No solution found (disconnected){}", exits));
            }
            Err(status) => {
                warn!("Path solve from {} to {} failed: {}", start, goal, status);
                return self.reject("Pathing engine error");
            }
        };

        if let Some(path) = &solved {
            let disconnected = path
                .areas
                .windows(2)
                .any(|pair| !map.mesh().has_direct_connection(pair[0], pair[1]));
            if disconnected {
                return self.reject("Path contains disconnected areas");
            }
        }

        self.path.trail.clear();
        let mut trail = CrumbTrail::new();
        match &solved {
            None => {
                build_intra_area_crumbs(origin, request.destination, start, &mut trail);
                push_end_crumb(&mut trail, Crumb::new(request.destination, start));
            }
            Some(path) => {
                for pair in path.areas.windows(2) {
                    let cached = map.connection_crumbs(pair[0], pair[1], Some(ctx.trace));
                    append_cached_crumbs(&mut trail, pair[0], &cached);
                }
                let last = path.areas[path.areas.len() - 1];
                let end = match map.mesh().area(last) {
                    Some(area) if partial => {
                        area.nearest_point(request.destination.x, request.destination.y)
                    }
                    _ => request.destination,
                };
                push_end_crumb(&mut trail, Crumb::new(end, last));
            }
        }

        if let (Some(last), Some(first)) = (self.path.last_crumb, trail.front()) {
            if distance_squared(&first.pos, &last.pos) < 1.0 {
                trail.pop_front();
            }
        }
        if let (Some(c0), Some(c1)) = (trail.front(), trail.get(1)) {
            let leg = c1.pos - c0.pos;
            if leg.length_squared() > 0.001 && (origin - c0.pos).dot(leg) > 0.0 {
                trail.pop_front();
            }
        }

        if !ignore && !trail.is_empty() {
            let cache_time = self.config.vischeck_cache_time.min(MAX_SOLVER_CACHE_TIME);
            let expire = self.config.timestamp(now, cache_time);
            let probe = probe_trail(&mut map.lock().edges, &trail, ctx.trace, now, expire, false);

            if probe != TrailProbe::Clear {
                let step = self.ladder.record_failure(
                    "Path blocked by traces",
                    request.destination,
                    request.priority,
                    now,
                    &self.config,
                );
                if step.is_fallback() {
                    self.stats.emergency_fallbacks += 1;
                    return self.request_path(ctx, request.with_ignore_geometry(true));
                }
                return self.reject(step.reason());
            }
        }

        if !ignore {
            self.ladder.record_success();
        }

        debug!(
            "Path to {:?} at {}: {} areas, {} crumbs",
            request.destination,
            request.priority,
            solved.as_ref().map_or(1, |path| path.areas.len()),
            trail.len()
        );
        self.path_cost = solved.as_ref().map_or(0.0, |path| path.cost);
        self.path.trail = trail;
        self.path.priority = request.priority;
        true
    }

    /// Solver cost between two positions
    ///
    /// `Some(0.0)` when both resolve to the same area, `None` when either
    /// position is off the mesh or no path exists.
    pub fn path_cost(&self, ctx: &NavContext<'_>, origin: Vec3, destination: Vec3) -> Option<f32> {
        let map = self.map.as_ref()?;
        let start = map.find_closest_area(&origin, true)?;
        let goal = map.find_closest_area(&destination, false)?;
        if start == goal {
            return Some(0.0);
        }

        let world = ctx.world;
        let danger = WorldDanger(world);
        let cost_ctx = CostContext::new(&self.config, world.tick())
            .with_agent(world.agent_team(), world.agent_id())
            .with_trace(Some(ctx.trace))
            .with_danger(Some(&danger));
        match map.find_path(&cost_ctx, start, goal) {
            Ok(PathOutcome::Found(path)) => Some(path.cost),
            Ok(PathOutcome::StartEndSame) => Some(0.0),
            _ => None,
        }
    }

    /// Records `reason` on every area within `radius` of `origin`
    pub fn apply_hazard_around(
        &self,
        origin: Vec3,
        radius: f32,
        reason: HazardReason,
        expire_tick: u64,
        require_los: bool,
        trace: Option<&dyn TraceService>,
    ) -> usize {
        let Some(map) = &self.map else {
            return 0;
        };
        map.apply_hazard_around(
            &origin,
            radius,
            HazardEntry::new(reason, expire_tick),
            CollisionMask::SHOT,
            require_los,
            trace,
        )
    }

    /// Drops hazards of one reason, or all of them
    pub fn clear_hazards(&self, reason: Option<HazardReason>) {
        let Some(map) = &self.map else {
            return;
        };
        let mut state = map.lock();
        match reason {
            Some(reason) => state.hazards.clear_reason(reason),
            None => state.hazards.clear(),
        }
    }

    /// Snapshot of the hazard ledger, ordered by area
    pub fn hazards(&self) -> Vec<(AreaHandle, HazardEntry)> {
        let Some(map) = &self.map else {
            return Vec::new();
        };
        let state = map.lock();
        let mut out: Vec<_> = state
            .hazards
            .iter()
            .map(|(area, entry)| (*area, *entry))
            .collect();
        out.sort_by_key(|(area, _)| *area);
        out
    }

    /// Replaces the spawn rooms; areas are flagged on the next tick
    pub fn set_spawn_rooms(&mut self, rooms: &[SpawnRoom]) {
        self.spawn_rooms = rooms.to_vec();
        self.spawn_rooms_dirty = true;
    }

    fn apply_spawn_rooms(&mut self) {
        if !self.spawn_rooms_dirty {
            return;
        }
        let Some(map) = self.map.as_mut() else {
            return;
        };
        self.spawn_rooms_dirty = false;

        let lift = Vec3::new(0.0, 0.0, SMALL_DROP_GRACE);
        let mesh = map.mesh_mut();

        let mut marked = Vec::new();
        for (handle, area) in mesh.iter() {
            let mut probes = vec![area.center()];
            probes.extend(area.corners());
            let room = self
                .spawn_rooms
                .iter()
                .find(|room| probes.iter().any(|p| room.contains(&(*p + lift))));
            if let Some(room) = room {
                marked.push((handle, room.team.and_then(|team| team.spawn_flag())));
            }
        }

        let mut neighbors = Vec::new();
        for &(handle, flag) in &marked {
            let Some(area) = mesh.area_mut(handle) else {
                continue;
            };
            match flag {
                Some(flag) => area.context.insert(flag),
                None => {
                    area.context.insert(ContextFlags::SPAWN_ROOM_RED);
                    area.context.insert(ContextFlags::SPAWN_ROOM_BLUE);
                }
            }
            neighbors.extend_from_slice(area.connections());
        }

        for next in neighbors {
            let Some(area) = mesh.area_mut(next) else {
                continue;
            };
            let flagged = area.context.contains(ContextFlags::SPAWN_ROOM_RED)
                || area.context.contains(ContextFlags::SPAWN_ROOM_BLUE)
                || area.context.contains(ContextFlags::SPAWN_ROOM_EXIT);
            if !flagged {
                area.context.insert(ContextFlags::SPAWN_ROOM_EXIT);
                self.exit_areas.push(next);
            }
        }

        info!(
            "Spawn rooms cover {} areas with {} exits",
            marked.len(),
            self.exit_areas.len()
        );
    }

    /// Advances the engine by one tick
    pub fn run(&mut self, ctx: &mut NavContext<'_>) {
        if self.map.is_none() {
            return;
        }
        let world = ctx.world;
        let now = world.tick();

        if !world.is_alive() || world.movement_locked() {
            self.path.cancel();
            self.follower.touch(now);
            return;
        }

        self.apply_spawn_rooms();

        if self.watch.rescan_due(now, &self.config) {
            if let Some(map) = &self.map {
                apply_threats(map, &world.hazards(), ctx.trace, &self.config, now);
            }
        }

        if let Some(request) = self.path.take_due_repath(now) {
            self.stats.repaths += 1;
            if !self.request_path(ctx, request) {
                self.path.defer_repath(now, &self.config);
            }
        }

        let origin = world.agent_position();
        let local = self.update_local_area(origin);

        self.recover_off_mesh(ctx.trace, origin, local);
        if self.config.vischeck_enabled {
            self.vischeck(ctx.trace, now);
        }
        self.follow(ctx, origin, local);
        self.update_stuck(ctx, local);

        let invulnerable = world.is_invulnerable();
        if let Some(map) = &self.map {
            let abandon = self.watch.check_trail(
                map,
                &self.path,
                origin,
                local,
                invulnerable,
                &self.config,
                now,
            );
            if let Some(reason) = abandon {
                self.abandon(reason, now);
            }
        }
    }

    /// Walks an agent that fell off the mesh back onto its area
    fn recover_off_mesh(&mut self, trace: &dyn TraceService, origin: Vec3, local: Option<AreaHandle>) {
        let (Some(map), Some(handle)) = (&self.map, local) else {
            return;
        };
        let Some(area) = map.mesh().area(handle) else {
            return;
        };
        let on_mesh = area.is_overlapping(&origin, 0.0)
            && (area.z_at(origin.x, origin.y) - origin.z).abs() < SMALL_DROP_GRACE;
        if on_mesh || self.path.is_following() {
            return;
        }

        let target = area.nearest_point(origin.x, origin.y);
        let hit = trace.trace_ray(origin, target, CollisionMask::PLAYER_SOLID);
        if hit.fraction <= OFF_MESH_MIN_FRACTION {
            return;
        }

        debug!("Off mesh at {:?}, returning to area {}", origin, handle);
        self.path.trail.clear();
        build_intra_area_crumbs(origin, hit.end_pos, handle, &mut self.path.trail);
        self.path.trail.push_back(Crumb::new(hit.end_pos, handle));
        self.path.priority = Priority::Patrol;
    }

    /// Re-probes the remaining trail at the vischeck cadence
    fn vischeck(&mut self, trace: &dyn TraceService, now: u64) {
        if self.path.trail.len() < 2
            || !self
                .vischeck_timer
                .run(now, self.config.ticks(self.config.vischeck_time))
            || self.path.ignore_geometry
        {
            return;
        }
        let Some(map) = &self.map else {
            return;
        };

        let cache_time = self.config.vischeck_cache_time.min(MAX_SOLVER_CACHE_TIME);
        let expire = self.config.timestamp(now, cache_time);
        let probe = probe_trail(&mut map.lock().edges, &self.path.trail, trace, now, expire, true);
        match probe {
            TrailProbe::Clear => {}
            TrailProbe::BlockedCached => self.abandon("Traceline blocked (cached)", now),
            TrailProbe::Blocked => self.abandon("Traceline blocked", now),
        }
    }

    fn follow(&mut self, ctx: &mut NavContext<'_>, origin: Vec3, local: Option<AreaHandle>) {
        let Some(map) = &self.map else {
            return;
        };
        let world = ctx.world;
        let agent = AgentSnapshot {
            now: world.tick(),
            position: origin,
            velocity: world.agent_velocity(),
            on_ground: world.on_ground(),
            local_area: local,
        };

        match self
            .follower
            .step(&mut self.path, map.mesh(), &agent, &self.config)
        {
            FollowStep::Idle => {}
            FollowStep::Arrived => {
                debug!("Reached end of trail at {:?}", origin);
                self.path_cost = 0.0;
            }
            FollowStep::Steer { target, jump } => {
                ctx.actuator.walk_to(target);
                if jump {
                    ctx.actuator.jump();
                }
            }
        }
    }

    /// Accumulates stuck time on the current edge and blacklists it once the
    /// agent has made no progress for too long
    fn update_stuck(&mut self, ctx: &mut NavContext<'_>, local: Option<AreaHandle>) {
        let Some(front) = self.path.trail.front().copied() else {
            return;
        };
        let now = ctx.now();
        let config = &self.config;

        let trigger = if front.requires_drop {
            config.stuck_time
        } else {
            config.stuck_time / 2.0
        };
        if !self.follower.is_inactive(now, config.ticks(trigger)) {
            return;
        }
        let Some(map) = &self.map else {
            return;
        };

        let key = match self.path.last_crumb {
            Some(last) => (last.area, front.area),
            None => (front.area, front.area),
        };
        let mut detect_ticks = config.ticks(config.stuck_detect_time);
        if front.requires_drop {
            detect_ticks += config.ticks(config.stuck_detect_time * 0.5);
        }

        let expire = config.timestamp(now, config.stuck_expire_time);
        let time_stuck = u64::from(map.lock().edges.add_stuck_time(key, 1, expire));

        if time_stuck > detect_ticks {
            let blacklist_until = config.timestamp(now, config.stuck_blacklist_time);
            blacklist_stuck(map, key, &front, local, blacklist_until);
            map.lock().edges.reset_stuck_time(&key);

            self.stats.stuck_blacklists += 1;
            self.follower.touch(now);
            self.abandon("Stuck", now);
            return;
        }

        if time_stuck > detect_ticks / 2 && ctx.world.on_ground() {
            ctx.actuator.jump();
        }
    }
}
