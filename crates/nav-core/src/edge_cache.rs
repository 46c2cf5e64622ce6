//! Expiring per-edge caches keyed by an ordered area pair
//!
//! Expiry ticks of 0 never expire.

use std::collections::HashMap;

use crate::area::AreaHandle;
use crate::connection::{DropdownHint, NavPoints};

/// Ordered `(from, to)` area pair; `(a, a)` keys a whole-area blacklist
pub type EdgeKey = (AreaHandle, AreaHandle);

/// Whether an entry with `expire_tick` is still valid at `now`
#[inline]
pub fn is_live(expire_tick: u64, now: u64) -> bool {
    expire_tick == 0 || expire_tick > now
}

/// Result of the last traversal check of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityState {
    NotVisible,
    #[default]
    NotChecked,
    Visible,
}

/// Cached geometry, cost and passability of one edge
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCacheEntry {
    pub expire_tick: u64,
    pub state: VisibilityState,
    pub cached_cost: f32,
    pub dropdown: DropdownHint,
    pub points: NavPoints,
    /// Set when the edge was blacklisted after the agent got stuck on it
    pub stuck_blacklist: bool,
}

impl Default for EdgeCacheEntry {
    fn default() -> Self {
        Self {
            expire_tick: 0,
            state: VisibilityState::NotChecked,
            cached_cost: f32::MAX,
            dropdown: DropdownHint::default(),
            points: NavPoints::default(),
            stuck_blacklist: false,
        }
    }
}

impl EdgeCacheEntry {
    /// A blocked entry, optionally marked as a stuck blacklist
    pub fn blocked(expire_tick: u64, stuck_blacklist: bool) -> Self {
        Self {
            expire_tick,
            state: VisibilityState::NotVisible,
            stuck_blacklist,
            ..Default::default()
        }
    }

    /// Blocked and still in force
    pub fn is_live_block(&self, now: u64) -> bool {
        self.state == VisibilityState::NotVisible && is_live(self.expire_tick, now)
    }
}

/// Outcome of a traversal probe along an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceVerdict {
    pub expire_tick: u64,
    pub passable: bool,
}

/// Time spent stuck on an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckRecord {
    pub expire_tick: u64,
    pub time_stuck: u32,
}

/// Edge cache plus trace verdicts and stuck history
///
/// Trace verdicts are kept apart from the solver's entries so that
/// re-costing an edge never turns an untraced step into a passable one.
#[derive(Debug, Default)]
pub struct EdgeCache {
    entries: HashMap<EdgeKey, EdgeCacheEntry>,
    verdicts: HashMap<EdgeKey, TraceVerdict>,
    stuck: HashMap<EdgeKey, StuckRecord>,
}

impl EdgeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EdgeKey) -> Option<&EdgeCacheEntry> {
        self.entries.get(key)
    }

    pub fn entry_mut(&mut self, key: EdgeKey) -> &mut EdgeCacheEntry {
        self.entries.entry(key).or_default()
    }

    pub fn insert(&mut self, key: EdgeKey, entry: EdgeCacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A live stuck blacklist on the whole area `(area, area)`
    pub fn is_area_stuck_blacklisted(&self, area: AreaHandle, now: u64) -> bool {
        self.entries
            .get(&(area, area))
            .map(|e| e.is_live_block(now) && e.stuck_blacklist)
            .unwrap_or(false)
    }

    /// Live cached verdict for an edge, `None` when unknown or expired
    pub fn cached_visibility(&self, key: &EdgeKey, now: u64) -> Option<VisibilityState> {
        self.entries
            .get(key)
            .filter(|e| is_live(e.expire_tick, now) && e.state != VisibilityState::NotChecked)
            .map(|e| e.state)
    }

    /// Live passability of an edge as last traced, `None` when no live
    /// trace verdict exists
    ///
    /// A live stuck blacklist always reads as impassable.
    pub fn cached_passability(&self, key: &EdgeKey, now: u64) -> Option<bool> {
        let stuck = self
            .entries
            .get(key)
            .is_some_and(|e| e.stuck_blacklist && e.is_live_block(now));
        if stuck {
            return Some(false);
        }
        self.verdicts
            .get(key)
            .filter(|p| is_live(p.expire_tick, now))
            .map(|p| p.passable)
    }

    /// Stores the outcome of a traversal probe along an edge
    ///
    /// A failed probe also blocks the solver's entry until `expire_tick`. A
    /// passing probe lifts a non-stuck block, leaving the edge `NotChecked`
    /// until the solver costs it again.
    pub fn record_probe(&mut self, key: EdgeKey, passable: bool, expire_tick: u64) {
        self.verdicts.insert(
            key,
            TraceVerdict {
                expire_tick,
                passable,
            },
        );

        let entry = self.entries.entry(key).or_default();
        if passable {
            if entry.state == VisibilityState::NotVisible && !entry.stuck_blacklist {
                entry.state = VisibilityState::NotChecked;
            }
        } else {
            entry.expire_tick = expire_tick;
            entry.state = VisibilityState::NotVisible;
            entry.cached_cost = f32::MAX;
        }
    }

    /// Blocks an edge after the agent got stuck on it
    pub fn blacklist_stuck(&mut self, key: EdgeKey, expire_tick: u64) {
        let entry = self.entries.entry(key).or_default();
        entry.expire_tick = expire_tick;
        entry.state = VisibilityState::NotVisible;
        entry.stuck_blacklist = true;
        entry.cached_cost = f32::MAX;
    }

    pub fn stuck_record(&self, key: &EdgeKey) -> Option<&StuckRecord> {
        self.stuck.get(key)
    }

    /// Adds `ticks` to the stuck time of an edge and refreshes its expiry
    pub fn add_stuck_time(&mut self, key: EdgeKey, ticks: u32, expire_tick: u64) -> u32 {
        let record = self.stuck.entry(key).or_insert(StuckRecord {
            expire_tick,
            time_stuck: 0,
        });
        record.time_stuck = record.time_stuck.saturating_add(ticks);
        record.expire_tick = expire_tick;
        record.time_stuck
    }

    pub fn reset_stuck_time(&mut self, key: &EdgeKey) {
        if let Some(record) = self.stuck.get_mut(key) {
            record.time_stuck = 0;
        }
    }

    /// Drops expired entries
    pub fn purge_expired(&mut self, now: u64) {
        self.entries.retain(|_, e| is_live(e.expire_tick, now));
        self.verdicts.retain(|_, p| is_live(p.expire_tick, now));
        self.stuck.retain(|_, r| is_live(r.expire_tick, now));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.verdicts.clear();
        self.stuck.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let a = AreaHandle::new(0);
        let b = AreaHandle::new(1);
        let mut cache = EdgeCache::new();
        cache.insert((a, b), EdgeCacheEntry::blocked(100, false));
        cache.insert((b, b), EdgeCacheEntry::blocked(0, true));

        assert_eq!(
            cache.cached_visibility(&(a, b), 50),
            Some(VisibilityState::NotVisible)
        );
        assert_eq!(cache.cached_visibility(&(a, b), 100), None);
        assert!(cache.is_area_stuck_blacklisted(b, 1_000_000));

        cache.purge_expired(150);
        assert!(cache.get(&(a, b)).is_none());
        assert!(cache.get(&(b, b)).is_some());
    }

    #[test]
    fn test_stuck_accumulates() {
        let key = (AreaHandle::new(2), AreaHandle::new(3));
        let mut cache = EdgeCache::new();
        assert_eq!(cache.add_stuck_time(key, 1, 500), 1);
        assert_eq!(cache.add_stuck_time(key, 1, 600), 2);
        assert_eq!(cache.stuck_record(&key).unwrap().expire_tick, 600);
        cache.reset_stuck_time(&key);
        assert_eq!(cache.stuck_record(&key).unwrap().time_stuck, 0);
        cache.purge_expired(700);
        assert!(cache.stuck_record(&key).is_none());
    }

    #[test]
    fn test_probe_results() {
        let a = AreaHandle::new(0);
        let b = AreaHandle::new(1);
        let mut cache = EdgeCache::new();

        cache.record_probe((a, b), true, 40);
        assert_eq!(cache.cached_passability(&(a, b), 10), Some(true));
        assert_eq!(cache.get(&(a, b)).unwrap().state, VisibilityState::NotChecked);
        assert_eq!(cache.cached_passability(&(a, b), 40), None);

        cache.record_probe((a, b), false, 80);
        assert_eq!(cache.cached_passability(&(a, b), 50), Some(false));
        assert!(!cache.is_area_stuck_blacklisted(b, 50));

        cache.blacklist_stuck((b, b), 90);
        assert!(cache.is_area_stuck_blacklisted(b, 50));
        assert!(!cache.is_area_stuck_blacklisted(b, 90));
        assert_eq!(cache.cached_passability(&(b, b), 50), Some(false));
    }

    #[test]
    fn test_costed_edge_has_no_verdict() {
        let a = AreaHandle::new(0);
        let b = AreaHandle::new(1);
        let mut cache = EdgeCache::new();

        cache.insert(
            (a, b),
            EdgeCacheEntry {
                expire_tick: 100,
                state: VisibilityState::Visible,
                cached_cost: 12.0,
                ..Default::default()
            },
        );
        assert_eq!(cache.cached_passability(&(a, b), 10), None);

        cache.record_probe((a, b), false, 60);
        cache.insert(
            (a, b),
            EdgeCacheEntry {
                expire_tick: 100,
                state: VisibilityState::Visible,
                cached_cost: 12.0,
                ..Default::default()
            },
        );
        assert_eq!(cache.cached_passability(&(a, b), 10), Some(false));
        assert_eq!(cache.cached_passability(&(a, b), 60), None);

        cache.purge_expired(60);
        cache.record_probe((b, a), true, 200);
        cache.clear();
        assert_eq!(cache.cached_passability(&(b, a), 10), None);
    }
}
