//! Time-expiring hazard ledger
//!
//! Maps areas to a hazard reason and severity. External scans add entries;
//! they leave by tick expiry or by clearing a whole reason. The cost model
//! reads severities as additive penalties, and an infinite severity makes the
//! area impassable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::area::AreaHandle;
use crate::edge_cache::is_live;

/// Why an area is hazardous
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardReason {
    Sentry,
    SentryMedium,
    SentryLow,
    Sticky,
    EnemyNormal,
    EnemyDormant,
    EnemyInvuln,
    BadBuildSpot,
    /// Never traversable while in force
    Impassable,
}

impl HazardReason {
    pub const ALL: [HazardReason; 9] = [
        HazardReason::Sentry,
        HazardReason::SentryMedium,
        HazardReason::SentryLow,
        HazardReason::Sticky,
        HazardReason::EnemyNormal,
        HazardReason::EnemyDormant,
        HazardReason::EnemyInvuln,
        HazardReason::BadBuildSpot,
        HazardReason::Impassable,
    ];

    /// Default severity for this reason
    pub fn default_severity(&self) -> f32 {
        match self {
            HazardReason::Sentry => 3500.0,
            HazardReason::EnemyInvuln => 1500.0,
            HazardReason::Sticky => 1000.0,
            HazardReason::SentryMedium => 800.0,
            HazardReason::SentryLow => 400.0,
            HazardReason::EnemyNormal => 300.0,
            HazardReason::EnemyDormant => 200.0,
            HazardReason::BadBuildSpot => 100.0,
            HazardReason::Impassable => f32::INFINITY,
        }
    }

    pub fn is_sentry(&self) -> bool {
        matches!(
            self,
            HazardReason::Sentry | HazardReason::SentryMedium | HazardReason::SentryLow
        )
    }
}

impl std::fmt::Display for HazardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HazardReason::Sentry => "sentry",
            HazardReason::SentryMedium => "sentry (medium)",
            HazardReason::SentryLow => "sentry (low)",
            HazardReason::Sticky => "sticky",
            HazardReason::EnemyNormal => "enemy",
            HazardReason::EnemyDormant => "enemy (dormant)",
            HazardReason::EnemyInvuln => "enemy (invulnerable)",
            HazardReason::BadBuildSpot => "bad build spot",
            HazardReason::Impassable => "impassable",
        };
        f.write_str(name)
    }
}

/// One hazard record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardEntry {
    pub reason: HazardReason,
    pub severity: f32,
    /// 0 never expires
    pub expire_tick: u64,
}

impl HazardEntry {
    pub fn new(reason: HazardReason, expire_tick: u64) -> Self {
        Self {
            reason,
            severity: reason.default_severity(),
            expire_tick,
        }
    }
}

/// Area hazards plus the enforcement switches
#[derive(Debug, Default)]
pub struct HazardLedger {
    entries: HashMap<AreaHandle, HazardEntry>,
    /// Set while the agent stands in a hazardous area
    blocked: bool,
    ignore_sentry: bool,
}

impl HazardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective penalty of an entry
    pub fn penalty(&self, entry: &HazardEntry) -> f32 {
        if self.ignore_sentry && entry.reason.is_sentry() {
            return 0.0;
        }
        entry.severity
    }

    fn should_override(&self, current: &HazardEntry, incoming: &HazardEntry) -> bool {
        if current.reason == incoming.reason {
            return true;
        }
        let current_penalty = self.penalty(current);
        let incoming_penalty = self.penalty(incoming);
        if !incoming_penalty.is_finite() {
            return true;
        }
        if !current_penalty.is_finite() {
            return false;
        }
        incoming_penalty >= current_penalty
    }

    /// Records a hazard with the reason's default severity
    pub fn insert(&mut self, area: AreaHandle, reason: HazardReason, expire_tick: u64) -> bool {
        self.insert_entry(area, HazardEntry::new(reason, expire_tick))
    }

    /// Records a hazard, honoring the override rules; returns whether stored
    ///
    /// A repeated reason keeps the later expiry and the larger severity. A
    /// different reason replaces the current one only when at least as severe.
    pub fn insert_entry(&mut self, area: AreaHandle, incoming: HazardEntry) -> bool {
        if let Some(current) = self.entries.get(&area).copied() {
            if current.reason == incoming.reason {
                let merged = HazardEntry {
                    reason: current.reason,
                    severity: current.severity.max(incoming.severity),
                    expire_tick: if current.expire_tick == 0 || incoming.expire_tick == 0 {
                        0
                    } else {
                        current.expire_tick.max(incoming.expire_tick)
                    },
                };
                self.entries.insert(area, merged);
                return true;
            }
            if !self.should_override(&current, &incoming) {
                return false;
            }
        }
        self.entries.insert(area, incoming);
        true
    }

    pub fn get(&self, area: AreaHandle) -> Option<&HazardEntry> {
        self.entries.get(&area)
    }

    /// Live penalty for an area, `None` when there is no live entry
    pub fn penalty_at(&self, area: AreaHandle, now: u64) -> Option<f32> {
        self.entries
            .get(&area)
            .filter(|e| is_live(e.expire_tick, now))
            .map(|e| self.penalty(e))
    }

    pub fn remove(&mut self, area: AreaHandle) -> Option<HazardEntry> {
        self.entries.remove(&area)
    }

    /// Removes every entry of one reason
    pub fn clear_reason(&mut self, reason: HazardReason) {
        self.entries.retain(|_, e| e.reason != reason);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn purge_expired(&mut self, now: u64) {
        self.entries.retain(|_, e| is_live(e.expire_tick, now));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AreaHandle, &HazardEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn ignore_sentry(&self) -> bool {
        self.ignore_sentry
    }

    pub fn set_ignore_sentry(&mut self, ignore: bool) {
        self.ignore_sentry = ignore;
    }
}
