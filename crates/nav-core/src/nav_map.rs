//! One loaded map: mesh, spatial index, shared graph state and crumb cache
//!
//! Graph state that changes at runtime (edge cache, stuck history, hazard
//! ledger, solver scratch) lives behind a single mutex. A poisoned lock is
//! recovered; the state it guards is always structurally valid.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::Vec3;
use log::debug;
use nav_common::distance_squared;

use crate::area::AreaHandle;
use crate::connection::{
    HALF_PLAYER_WIDTH, PLAYER_CROUCHED_JUMP_HEIGHT, PLAYER_HEIGHT,
};
use crate::cost_model::CostContext;
use crate::crumb_cache::CrumbCache;
use crate::crumbs::CachedCrumb;
use crate::edge_cache::EdgeCache;
use crate::hazard::{HazardEntry, HazardLedger};
use crate::nav_mesh::{MeshSignature, NavMesh};
use crate::path_graph::{MeshGraph, PathOutcome, PathSolver};
use crate::spatial_index::SpatialIndex;
use crate::status::{Status, StatusResult};
use crate::trace::{is_visible, CollisionMask, TraceService};

/// Upper bound on areas visited by a radius search
const COLLECT_LOOP_LIMIT: usize = 2048;

/// Mutable graph state shared by the solver and the follower
#[derive(Debug, Default)]
pub struct GraphState {
    pub edges: EdgeCache,
    pub hazards: HazardLedger,
    solver: PathSolver,
}

impl GraphState {
    /// Solves on the mesh with the current edge cache and hazards
    pub fn solve(
        &mut self,
        mesh: &NavMesh,
        ctx: &CostContext<'_>,
        start: AreaHandle,
        goal: AreaHandle,
    ) -> StatusResult<PathOutcome> {
        let GraphState {
            edges,
            hazards,
            solver,
        } = self;
        let mut graph = MeshGraph {
            mesh,
            edges,
            hazards,
            ctx,
        };
        solver.solve(&mut graph, start, goal)
    }

    pub fn purge_expired(&mut self, now: u64) {
        self.edges.purge_expired(now);
        self.hazards.purge_expired(now);
    }

    pub fn clear(&mut self) {
        self.edges.clear();
        self.hazards.clear();
        self.hazards.set_blocked(false);
    }
}

/// A loaded map
#[derive(Debug)]
pub struct NavMap {
    name: String,
    mesh: NavMesh,
    index: SpatialIndex,
    state: Mutex<GraphState>,
    crumbs: CrumbCache,
}

impl NavMap {
    /// Takes ownership of a mesh and starts building its index in the
    /// background
    pub fn new(name: impl Into<String>, mesh: NavMesh) -> Self {
        let index = SpatialIndex::spawn(&mesh);
        Self {
            name: name.into(),
            mesh,
            index,
            state: Mutex::new(GraphState::default()),
            crumbs: CrumbCache::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &NavMesh {
        &self.mesh
    }

    /// Mutable access for attribute updates; geometry must stay unchanged so
    /// the index remains valid
    pub fn mesh_mut(&mut self) -> &mut NavMesh {
        &mut self.mesh
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn signature(&self) -> MeshSignature {
        self.mesh.signature(&self.name)
    }

    /// Locks the graph state
    pub fn lock(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn crumb_cache(&self) -> &CrumbCache {
        &self.crumbs
    }

    pub fn set_crumb_cache(&mut self, crumbs: CrumbCache) {
        self.crumbs = crumbs;
    }

    /// Cached sub-trail for an edge, built on a miss
    pub fn connection_crumbs(
        &mut self,
        from: AreaHandle,
        to: AreaHandle,
        trace: Option<&dyn TraceService>,
    ) -> Vec<CachedCrumb> {
        self.crumbs.get_or_build(&self.mesh, from, to, trace)
    }

    /// Best area for a position
    ///
    /// Exact containment wins. Otherwise, when `local_origin` is set, areas
    /// whose footprint overlaps the position are scored by vertical distance
    /// with extra weight for being far below or above the area. Falls back to
    /// the nearest area.
    pub fn find_closest_area(&self, pos: &Vec3, local_origin: bool) -> Option<AreaHandle> {
        let result = self.index.find_area(&self.mesh, pos);
        if result.is_exact || !local_origin {
            return result.area;
        }

        let mut best: Option<(AreaHandle, f32)> = None;
        for (handle, area) in self.mesh.iter() {
            if !area.is_overlapping(pos, 0.0) {
                continue;
            }
            let mut score = (area.z_at(pos.x, pos.y) - pos.z).abs();
            if pos.z < area.min_z() - PLAYER_CROUCHED_JUMP_HEIGHT {
                score += PLAYER_HEIGHT;
            }
            if pos.z > area.max_z() + PLAYER_CROUCHED_JUMP_HEIGHT {
                score += PLAYER_HEIGHT * 0.5;
            }
            if best.map_or(true, |(_, s)| score < s) {
                best = Some((handle, score));
            }
        }

        best.map(|(handle, _)| handle).or(result.area)
    }

    /// Areas whose center lies within `radius` of `origin`
    ///
    /// Breadth-first from the closest area, expanding while neighbors stay
    /// within twice the radius. Never empty when the mesh has areas: the seed
    /// area is returned when nothing else qualifies.
    pub fn collect_areas_around(&self, origin: &Vec3, radius: f32) -> Vec<AreaHandle> {
        let Some(seed) = self.find_closest_area(origin, false) else {
            return Vec::new();
        };
        let Some(seed_area) = self.mesh.area(seed) else {
            return Vec::new();
        };

        let radius_sq = radius * radius;
        let expansion_limit = radius_sq * 4.0;

        let mut out = Vec::new();
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        queue.push_back((seed, distance_squared(&seed_area.center(), origin)));
        visited.insert(seed);

        let mut budget = COLLECT_LOOP_LIMIT;
        while let Some((handle, dist)) = queue.pop_front() {
            if budget == 0 {
                break;
            }
            budget -= 1;

            if dist <= radius_sq {
                out.push(handle);
            }
            if dist > expansion_limit {
                continue;
            }
            let Some(area) = self.mesh.area(handle) else {
                continue;
            };
            for &next in area.connections() {
                let Some(next_area) = self.mesh.area(next) else {
                    continue;
                };
                let next_dist = distance_squared(&next_area.center(), origin);
                if next_dist > expansion_limit {
                    continue;
                }
                if visited.insert(next) {
                    queue.push_back((next, next_dist));
                }
            }
        }

        if out.is_empty() {
            out.push(seed);
        }
        out
    }

    /// Records `entry` on every area within `radius` of `origin`
    ///
    /// Each area is tested at crouched-jump height above its center. With
    /// `require_los`, the area must also be visible from `origin`; without a
    /// trace service every area counts as visible. Returns the number of
    /// areas updated.
    pub fn apply_hazard_around(
        &self,
        origin: &Vec3,
        radius: f32,
        entry: HazardEntry,
        mask: CollisionMask,
        require_los: bool,
        trace: Option<&dyn TraceService>,
    ) -> usize {
        let candidates = self.collect_areas_around(origin, radius + HALF_PLAYER_WIDTH);
        let radius_sq = radius * radius;

        let mut state = self.lock();
        let mut applied = 0;
        for handle in candidates {
            let Some(area) = self.mesh.area(handle) else {
                continue;
            };
            let probe = area.center() + Vec3::new(0.0, 0.0, PLAYER_CROUCHED_JUMP_HEIGHT);
            if distance_squared(origin, &probe) > radius_sq {
                continue;
            }
            if require_los {
                if let Some(trace) = trace {
                    if !is_visible(trace, *origin, probe, mask) {
                        continue;
                    }
                }
            }
            if state.hazards.insert_entry(handle, entry) {
                applied += 1;
            }
        }

        debug!(
            "Hazard {} applied to {} areas around {:?}",
            entry.reason, applied, origin
        );
        applied
    }

    /// Solves from `start` to `goal` under the shared graph state
    pub fn find_path(
        &self,
        ctx: &CostContext<'_>,
        start: AreaHandle,
        goal: AreaHandle,
    ) -> StatusResult<PathOutcome> {
        if self.mesh.is_empty() {
            return Err(Status::NotReady);
        }
        self.lock().solve(&self.mesh, ctx, start, goal)
    }

    pub fn purge_expired(&self, now: u64) {
        self.lock().purge_expired(now);
    }

    /// Drops all runtime graph state
    pub fn reset_state(&self) {
        self.lock().clear();
    }
}

#[cfg(feature = "serialization")]
mod persistence {
    use std::path::Path;

    use nav_common::Result;

    use super::*;

    impl NavMap {
        /// Replaces the crumb cache with the on-disk one, rebuilding it when
        /// the file is missing or stale
        pub fn load_crumb_cache(&mut self, dir: &Path, trace: Option<&dyn TraceService>) {
            self.crumbs = CrumbCache::load_or_rebuild(dir, &self.name, &self.mesh, trace);
        }

        /// Writes the crumb cache when it holds unsaved entries
        pub fn flush_crumb_cache(&mut self, dir: &Path) -> Result<bool> {
            if !self.crumbs.is_dirty() {
                return Ok(false);
            }
            let path = crate::crumb_cache::cache_path(dir, &self.name);
            let signature = self.signature();
            self.crumbs.save(&path, &signature)?;
            Ok(true)
        }
    }
}
