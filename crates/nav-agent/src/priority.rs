//! Goal priorities competing for the single path slot

use serde::{Deserialize, Serialize};

/// Penalty at which an upcoming area aborts the current path
const BLACKLIST_ABANDON_PENALTY: f32 = 2500.0;
const CAPTURE_ABANDON_PENALTY: f32 = 4000.0;

/// Why the agent is moving
///
/// A new request only replaces the current path when its priority is at
/// least the current one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    #[default]
    None = 0,
    Patrol = 5,
    LowPrioGetHealth,
    StayNear,
    RunReload,
    RunSafeReload,
    SnipeSentry,
    Capture,
    GetAmmo,
    MeleeAttack,
    Engineer,
    GetHealth,
    EscapeSpawn,
    EscapeDanger,
    Followbot,
}

impl Priority {
    /// Strict failures against one destination before the emergency retry
    pub fn fallback_threshold(&self) -> u32 {
        match self {
            Priority::Patrol => 1,
            _ => 2,
        }
    }

    /// Hazard penalty of an upcoming area that aborts the path
    pub fn abandon_penalty(&self) -> f32 {
        match self {
            Priority::Capture => CAPTURE_ABANDON_PENALTY,
            _ => BLACKLIST_ABANDON_PENALTY,
        }
    }

    /// Goals that knowingly walk into sentry range
    pub fn ignores_sentries(&self) -> bool {
        matches!(self, Priority::SnipeSentry | Priority::Capture)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(Priority::None < Priority::Patrol);
        assert!(Priority::Patrol < Priority::LowPrioGetHealth);
        assert!(Priority::Capture < Priority::GetAmmo);
        assert!(Priority::EscapeDanger < Priority::Followbot);
        assert_eq!(Priority::Patrol as u8, 5);
        assert_eq!(Priority::LowPrioGetHealth as u8, 6);
    }

    #[test]
    fn test_thresholds() {
        assert_eq!(Priority::Patrol.fallback_threshold(), 1);
        assert_eq!(Priority::GetHealth.fallback_threshold(), 2);
        assert_eq!(Priority::Capture.abandon_penalty(), 4000.0);
        assert_eq!(Priority::Engineer.abandon_penalty(), 2500.0);
        assert!(Priority::SnipeSentry.ignores_sentries());
        assert!(!Priority::Patrol.ignores_sentries());
    }
}
