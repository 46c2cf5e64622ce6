//! Threat rescans and the upcoming-hazard watchdog

use glam::Vec3;
use log::debug;
use nav_common::distance_2d_squared;
use nav_core::{
    AreaHandle, CollisionMask, HazardEntry, HazardReason, NavConfig, NavMap, TraceService,
    HALF_PLAYER_WIDTH, PLAYER_CROUCHED_JUMP_HEIGHT, PLAYER_JUMP_HEIGHT,
};

use crate::context::{HazardKind, HazardSource};
use crate::path_state::PathState;
use crate::timer::TickTimer;

pub const SENTRY_HIGH_RADIUS: f32 = 900.0;
pub const SENTRY_MEDIUM_RADIUS: f32 = 1050.0;
pub const SENTRY_LOW_RADIUS: f32 = 1200.0;
pub const INVULNERABLE_RADIUS: f32 = 1000.0;
pub const STICKY_RADIUS: f32 = 130.0 + HALF_PLAYER_WIDTH;

const BLACKLIST_SCAN_MAX_CRUMBS: usize = 20;
const BLACKLIST_SCAN_RADIUS: f32 = 1800.0;
const BLACKLIST_ABANDON_COOLDOWN: f32 = 0.4;

/// Reasons recomputed from scratch on every rescan
const RESCANNED_REASONS: [HazardReason; 4] = [
    HazardReason::Sentry,
    HazardReason::SentryMedium,
    HazardReason::SentryLow,
    HazardReason::EnemyInvuln,
];

/// Marks the areas around each reported threat
///
/// Sentry and invulnerable-enemy hazards are rebuilt from the current
/// report; sticky hazards carry their own expiry. Returns the number of area
/// updates.
pub fn apply_threats(
    map: &NavMap,
    threats: &[HazardSource],
    trace: &dyn TraceService,
    config: &NavConfig,
    now: u64,
) -> usize {
    {
        let mut state = map.lock();
        for reason in RESCANNED_REASONS {
            state.hazards.clear_reason(reason);
        }
    }

    let sentry_mask = CollisionMask::SHOT | CollisionMask::GRATE;
    let eye = Vec3::new(0.0, 0.0, PLAYER_CROUCHED_JUMP_HEIGHT);
    let mut applied = 0;

    for threat in threats {
        match threat.kind {
            HazardKind::Sentry { include_low } => {
                let origin = threat.position + eye;
                let mut rings = vec![
                    (SENTRY_HIGH_RADIUS, HazardReason::Sentry),
                    (SENTRY_MEDIUM_RADIUS, HazardReason::SentryMedium),
                ];
                if include_low {
                    rings.push((SENTRY_LOW_RADIUS, HazardReason::SentryLow));
                }
                for (radius, reason) in rings {
                    applied += map.apply_hazard_around(
                        &origin,
                        radius,
                        HazardEntry::new(reason, 0),
                        sentry_mask,
                        true,
                        Some(trace),
                    );
                }
            }
            HazardKind::InvulnerableEnemy => {
                applied += map.apply_hazard_around(
                    &(threat.position + eye),
                    INVULNERABLE_RADIUS,
                    HazardEntry::new(HazardReason::EnemyInvuln, 0),
                    CollisionMask::SHOT,
                    true,
                    Some(trace),
                );
            }
            HazardKind::StickyTrap => {
                let origin = threat.position + Vec3::new(0.0, 0.0, PLAYER_JUMP_HEIGHT / 2.0);
                let expire = config.timestamp(now, config.sticky_ignore_time);
                applied += map.apply_hazard_around(
                    &origin,
                    STICKY_RADIUS,
                    HazardEntry::new(HazardReason::Sticky, expire),
                    CollisionMask::SHOT,
                    true,
                    Some(trace),
                );
            }
        }
    }

    map.purge_expired(now);
    debug!("Threat rescan: {} threats, {} area updates", threats.len(), applied);
    applied
}

/// Rate-limited scan of the upcoming trail against the hazard ledger
#[derive(Debug, Default)]
pub struct HazardWatch {
    scan_timer: TickTimer,
    check_timer: TickTimer,
    last_abandon_tick: Option<u64>,
}

impl HazardWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the threat rescan is due; marks it as run
    pub fn rescan_due(&mut self, now: u64, config: &NavConfig) -> bool {
        self.scan_timer.run(now, config.ticks(config.hazard_scan_time))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Looks for hazards ahead on the trail
    ///
    /// Returns the abandon reason when an upcoming area is too dangerous or
    /// stuck-blacklisted. While the agent stands in a hazardous area, or is
    /// invulnerable, hazard enforcement is suspended instead.
    pub fn check_trail(
        &mut self,
        map: &NavMap,
        path: &PathState,
        agent_pos: Vec3,
        local_area: Option<AreaHandle>,
        invulnerable: bool,
        config: &NavConfig,
        now: u64,
    ) -> Option<&'static str> {
        if !self.check_timer.run(now, config.ticks(config.blacklist_check_time))
            || path.ignore_geometry()
        {
            return None;
        }

        let mut state = map.lock();
        if invulnerable {
            state.hazards.set_blocked(true);
            return None;
        }
        if let Some(area) = local_area {
            if state.hazards.penalty_at(area, now).is_some() {
                state.hazards.set_blocked(true);
                return None;
            }
        }
        state.hazards.set_blocked(false);
        state
            .hazards
            .set_ignore_sentry(path.priority().ignores_sentries());

        let threshold = path.priority().abandon_penalty();
        let radius_sq = BLACKLIST_SCAN_RADIUS * BLACKLIST_SCAN_RADIUS;

        for crumb in path.trail().iter().take(BLACKLIST_SCAN_MAX_CRUMBS) {
            if distance_2d_squared(&crumb.pos, &agent_pos) > radius_sq {
                break;
            }
            let reason = if state
                .hazards
                .penalty_at(crumb.area, now)
                .is_some_and(|penalty| penalty >= threshold)
            {
                Some("Blacklisted area")
            } else if state.edges.is_area_stuck_blacklisted(crumb.area, now) {
                Some("Area blacklisted (stuck)")
            } else {
                None
            };

            if let Some(reason) = reason {
                let cooldown = config.ticks(BLACKLIST_ABANDON_COOLDOWN);
                if self
                    .last_abandon_tick
                    .is_some_and(|tick| now.saturating_sub(tick) < cooldown)
                {
                    return None;
                }
                self.last_abandon_tick = Some(now);
                return Some(reason);
            }
        }
        None
    }
}
