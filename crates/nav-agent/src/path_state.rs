//! The agent's single active path request and its trail
//!
//! Aborting a path clears the trail within the same tick. A repath, when the
//! request asked for one, is only scheduled for a later tick.

use glam::Vec3;
use log::info;
use nav_core::{Crumb, CrumbTrail, NavConfig};

use crate::priority::Priority;

/// Repath delay after a stuck or blacklist abort, in seconds
const REPATH_DELAY_BLOCKED: f32 = 0.45;
/// Repath delay after any other abort, in seconds
const REPATH_DELAY: f32 = 0.2;
/// Minimum delay before retrying a failed repath, in seconds
const REPATH_RETRY_DELAY: f32 = 0.25;

/// A goal handed to the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    pub destination: Vec3,
    pub priority: Priority,
    /// Schedule one repath when the path is abandoned
    pub auto_repath: bool,
    /// Accept a path to the reachable area closest to the destination
    pub allow_partial: bool,
    /// Skip traversal probes and dynamic hazard costs
    pub ignore_geometry: bool,
}

impl PathRequest {
    pub fn new(destination: Vec3, priority: Priority) -> Self {
        Self {
            destination,
            priority,
            auto_repath: true,
            allow_partial: false,
            ignore_geometry: false,
        }
    }

    pub fn with_auto_repath(mut self, auto_repath: bool) -> Self {
        self.auto_repath = auto_repath;
        self
    }

    pub fn with_allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }

    pub fn with_ignore_geometry(mut self, ignore_geometry: bool) -> Self {
        self.ignore_geometry = ignore_geometry;
        self
    }
}

#[derive(Debug, Default)]
pub struct PathState {
    pub(crate) trail: CrumbTrail,
    /// Most recently consumed crumb
    pub(crate) last_crumb: Option<Crumb>,
    pub(crate) path_dir: Vec3,
    pub(crate) priority: Priority,
    pub(crate) destination: Option<Vec3>,
    pub(crate) auto_repath: bool,
    pub(crate) allow_partial: bool,
    pub(crate) ignore_geometry: bool,
    pub(crate) repath_requested: bool,
    pub(crate) next_repath_tick: u64,
    pub(crate) failure_reason: String,
}

impl PathState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trail(&self) -> &CrumbTrail {
        &self.trail
    }

    pub fn is_following(&self) -> bool {
        !self.trail.is_empty()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn ignore_geometry(&self) -> bool {
        self.ignore_geometry
    }

    pub fn failure_reason(&self) -> &str {
        &self.failure_reason
    }

    pub fn is_repath_pending(&self) -> bool {
        self.repath_requested
    }

    pub fn next_repath_tick(&self) -> u64 {
        self.next_repath_tick
    }

    /// Records the parameters of a new request before it is solved
    pub(crate) fn begin(&mut self, request: &PathRequest) {
        self.destination = Some(request.destination);
        self.auto_repath = request.auto_repath;
        self.allow_partial = request.allow_partial;
        self.ignore_geometry = request.ignore_geometry;
        self.failure_reason.clear();
    }

    /// Drops the trail and either schedules a repath or gives up the goal
    ///
    /// Returns `true` when a repath was scheduled.
    pub(crate) fn abandon(&mut self, reason: &str, now: u64, config: &NavConfig) -> bool {
        info!("Abandoning path: {}", reason);
        self.failure_reason = reason.to_string();
        self.trail.clear();
        self.last_crumb = None;

        if !self.auto_repath {
            self.priority = Priority::None;
            return false;
        }

        let delay = if reason.contains("Blacklisted") || reason.contains("Stuck") {
            REPATH_DELAY_BLOCKED
        } else {
            REPATH_DELAY
        };
        self.next_repath_tick = self
            .next_repath_tick
            .max(config.timestamp(now, delay));
        self.repath_requested = true;
        self.auto_repath = false;
        true
    }

    /// Takes the scheduled repath once it is due
    pub(crate) fn take_due_repath(&mut self, now: u64) -> Option<PathRequest> {
        if !self.repath_requested || now < self.next_repath_tick {
            return None;
        }
        self.repath_requested = false;
        let destination = self.destination?;
        Some(PathRequest {
            destination,
            priority: self.priority,
            auto_repath: true,
            allow_partial: self.allow_partial,
            ignore_geometry: self.ignore_geometry,
        })
    }

    /// Pushes the repath tick out after a failed repath
    pub(crate) fn defer_repath(&mut self, now: u64, config: &NavConfig) {
        self.next_repath_tick = self
            .next_repath_tick
            .max(config.timestamp(now, REPATH_RETRY_DELAY));
    }

    /// Clears the trail once it has been fully consumed
    pub(crate) fn finish(&mut self) {
        self.last_crumb = None;
        self.auto_repath = false;
        if !self.repath_requested {
            self.priority = Priority::None;
        }
    }

    pub(crate) fn cancel(&mut self) {
        self.trail.clear();
        self.last_crumb = None;
        self.path_dir = Vec3::ZERO;
        self.priority = Priority::None;
        self.ignore_geometry = false;
        self.repath_requested = false;
        self.next_repath_tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_core::AreaHandle;

    fn following(auto_repath: bool) -> PathState {
        let mut state = PathState::new();
        let request =
            PathRequest::new(Vec3::new(500.0, 0.0, 0.0), Priority::Patrol).with_auto_repath(auto_repath);
        state.begin(&request);
        state.priority = Priority::Patrol;
        state
            .trail
            .push_back(Crumb::new(Vec3::new(100.0, 0.0, 0.0), AreaHandle::new(0)));
        state
    }

    #[test]
    fn test_abandon_schedules_one_repath() {
        let config = NavConfig::new();
        let mut state = following(true);

        assert!(state.abandon("Stuck", 100, &config));
        assert!(!state.is_following());
        assert_eq!(state.failure_reason(), "Stuck");
        assert_eq!(state.next_repath_tick(), 100 + config.ticks(0.45));
        assert_eq!(state.priority(), Priority::Patrol);

        // Auto-repath was consumed
        assert!(!state.abandon("Traceline blocked", 101, &config));
        assert_eq!(state.priority(), Priority::None);
        assert_eq!(state.next_repath_tick(), 100 + config.ticks(0.45));
    }

    #[test]
    fn test_scheduled_tick_never_moves_earlier() {
        let config = NavConfig::new();
        let mut state = following(true);
        state.next_repath_tick = 500;
        state.abandon("Traceline blocked", 100, &config);
        assert_eq!(state.next_repath_tick(), 500);
    }

    #[test]
    fn test_due_repath_is_taken_once() {
        let config = NavConfig::new();
        let mut state = following(true);
        state.abandon("Traceline blocked", 100, &config);

        let due = 100 + config.ticks(0.2);
        assert!(state.take_due_repath(due - 1).is_none());
        let request = state.take_due_repath(due).unwrap();
        assert_eq!(request.destination, Vec3::new(500.0, 0.0, 0.0));
        assert_eq!(request.priority, Priority::Patrol);
        assert!(request.auto_repath);
        assert!(state.take_due_repath(due + 100).is_none());
    }

    #[test]
    fn test_cancel_clears_schedule() {
        let config = NavConfig::new();
        let mut state = following(true);
        state.abandon("Stuck", 10, &config);
        state.cancel();
        assert!(!state.is_repath_pending());
        assert_eq!(state.next_repath_tick(), 0);
        assert_eq!(state.priority(), Priority::None);
    }
}
