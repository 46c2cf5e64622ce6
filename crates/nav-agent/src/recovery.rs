//! Failure escalation and stuck blacklisting

use glam::Vec3;
use log::{info, warn};
use nav_common::distance_squared;
use nav_core::{AreaHandle, Crumb, EdgeKey, NavConfig, NavMap};

use crate::priority::Priority;

/// Failures within this distance count against the same destination
const SAME_DESTINATION_RADIUS: f32 = 650.0;
/// Failures further apart than this start a new count, in seconds
const FAIL_WINDOW: f32 = 2.25;
/// Areas around a stuck crumb that are blacklisted with it
const STUCK_BLACKLIST_RADIUS: f32 = 120.0;

/// Outcome of a strict (geometry-checked) failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    /// Fail the request
    Strict { reason: String },
    /// Retry once with geometry checks disabled
    EmergencyFallback { reason: String },
}

impl Escalation {
    pub fn reason(&self) -> &str {
        match self {
            Escalation::Strict { reason } | Escalation::EmergencyFallback { reason } => reason,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Escalation::EmergencyFallback { .. })
    }
}

/// Counts strict failures against one destination
///
/// Once the count reaches the priority's threshold within the failure window
/// the ladder resets and allows exactly one retry with geometry ignored.
#[derive(Debug, Clone, Default)]
pub struct EscalationLadder {
    count: u32,
    last_fail_tick: Option<u64>,
    last_destination: Vec3,
}

impl EscalationLadder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn record_failure(
        &mut self,
        reason: &str,
        destination: Vec3,
        priority: Priority,
        now: u64,
        config: &NavConfig,
    ) -> Escalation {
        let threshold = priority.fallback_threshold();
        let same_destination = distance_squared(&self.last_destination, &destination)
            <= SAME_DESTINATION_RADIUS * SAME_DESTINATION_RADIUS;
        let within_window = self
            .last_fail_tick
            .map_or(false, |tick| now.saturating_sub(tick) <= config.ticks(FAIL_WINDOW));

        if same_destination && within_window {
            self.count += 1;
        } else {
            self.count = 1;
        }
        self.last_destination = destination;
        self.last_fail_tick = Some(now);

        if self.count < threshold {
            return Escalation::Strict {
                reason: format!("{} (strict {}/{})", reason, self.count, threshold),
            };
        }

        self.count = 0;
        warn!("{}: using emergency fallback", reason);
        Escalation::EmergencyFallback {
            reason: format!("{} (emergency fallback)", reason),
        }
    }

    /// A strict request succeeded
    pub fn record_success(&mut self) {
        self.count = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Blocks the stuck edge, the crumb's area and every area near the crumb
/// except `local_area` until `expire_tick`
///
/// Returns the number of nearby areas blacklisted.
pub fn blacklist_stuck(
    map: &NavMap,
    key: EdgeKey,
    crumb: &Crumb,
    local_area: Option<AreaHandle>,
    expire_tick: u64,
) -> usize {
    let nearby = map.collect_areas_around(&crumb.pos, STUCK_BLACKLIST_RADIUS);

    let mut state = map.lock();
    state.edges.blacklist_stuck(key, expire_tick);
    state.edges.blacklist_stuck((crumb.area, crumb.area), expire_tick);

    let mut count = 0;
    for area in nearby {
        if Some(area) == local_area {
            continue;
        }
        state.edges.blacklist_stuck((area, area), expire_tick);
        count += 1;
    }

    info!(
        "Stuck on {} -> {}, blacklisted {} nearby areas until tick {}",
        key.0, key.1, count, expire_tick
    );
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_core::test_mesh_helpers::create_grid_mesh;

    #[test]
    fn test_patrol_falls_back_on_first_failure() {
        let config = NavConfig::new();
        let mut ladder = EscalationLadder::new();
        let dest = Vec3::new(100.0, 0.0, 0.0);

        let step = ladder.record_failure("No solution found", dest, Priority::Patrol, 10, &config);
        assert_eq!(
            step,
            Escalation::EmergencyFallback {
                reason: "No solution found (emergency fallback)".to_string()
            }
        );
        assert_eq!(ladder.count(), 0);
    }

    #[test]
    fn test_counts_within_window_and_radius() {
        let config = NavConfig::new();
        let mut ladder = EscalationLadder::new();
        let dest = Vec3::new(100.0, 0.0, 0.0);

        let first = ladder.record_failure("Path blocked by traces", dest, Priority::GetAmmo, 10, &config);
        assert_eq!(first.reason(), "Path blocked by traces (strict 1/2)");
        assert!(!first.is_fallback());

        // Far destination starts over
        let far = ladder.record_failure(
            "Path blocked by traces",
            dest + Vec3::new(1000.0, 0.0, 0.0),
            Priority::GetAmmo,
            20,
            &config,
        );
        assert!(!far.is_fallback());

        let near = dest + Vec3::new(1000.0, 100.0, 0.0);
        assert!(ladder
            .record_failure("Path blocked by traces", near, Priority::GetAmmo, 30, &config)
            .is_fallback());
    }

    #[test]
    fn test_window_lapse_resets_count() {
        let config = NavConfig::new();
        let mut ladder = EscalationLadder::new();
        let dest = Vec3::ZERO;

        ladder.record_failure("No solution found", dest, Priority::Engineer, 0, &config);
        let late = config.ticks(FAIL_WINDOW) + 1;
        let step = ladder.record_failure("No solution found", dest, Priority::Engineer, late, &config);
        assert_eq!(step.reason(), "No solution found (strict 1/2)");

        ladder.record_success();
        assert_eq!(ladder.count(), 0);
    }

    #[test]
    fn test_stuck_blacklist_spares_local_area() {
        let map = NavMap::new("grid", create_grid_mesh(3, 1, 100.0));
        let (a, b) = (AreaHandle::new(0), AreaHandle::new(1));
        let crumb = Crumb::new(Vec3::new(100.0, 50.0, 0.0), a);

        let count = blacklist_stuck(&map, (a, a), &crumb, Some(a), 500);
        assert_eq!(count, 1);

        let state = map.lock();
        assert!(state.edges.is_area_stuck_blacklisted(a, 100));
        assert!(state.edges.is_area_stuck_blacklisted(b, 100));
        assert!(!state.edges.is_area_stuck_blacklisted(AreaHandle::new(2), 100));
        assert!(!state.edges.is_area_stuck_blacklisted(b, 500));
    }
}
