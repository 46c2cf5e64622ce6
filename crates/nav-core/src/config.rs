//! Tunables for path solving and following

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Navigation configuration; all durations are in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Seconds per simulation tick
    pub tick_interval: f32,
    /// Re-check upcoming edges while following
    pub vischeck_enabled: bool,
    pub vischeck_time: f32,
    /// Lifetime of edge cache entries
    pub vischeck_cache_time: f32,
    /// Inactivity before a tick counts as stuck
    pub stuck_time: f32,
    /// Accumulated stuck ticks before an edge is blacklisted, in seconds of ticks
    pub stuck_detect_time: f32,
    pub stuck_expire_time: f32,
    pub stuck_blacklist_time: f32,
    pub sticky_ignore_time: f32,
    /// Jitter edge costs per agent
    pub path_randomization: bool,
    pub blacklist_check_time: f32,
    pub hazard_scan_time: f32,
    /// Where crumb caches are stored; `None` disables disk caching
    pub crumb_cache_dir: Option<PathBuf>,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NavConfig {
    pub fn new() -> Self {
        Self {
            tick_interval: 1.0 / 66.0,
            vischeck_enabled: true,
            vischeck_time: 2.0,
            vischeck_cache_time: 240.0,
            stuck_time: 0.2,
            stuck_detect_time: 5.0,
            stuck_expire_time: 10.0,
            stuck_blacklist_time: 120.0,
            sticky_ignore_time: 15.0,
            path_randomization: true,
            blacklist_check_time: 0.5,
            hazard_scan_time: 1.0,
            crumb_cache_dir: None,
        }
    }

    /// Converts seconds to a whole number of ticks, rounding down
    pub fn ticks(&self, seconds: f32) -> u64 {
        if self.tick_interval <= 0.0 || seconds <= 0.0 {
            return 0;
        }
        (seconds / self.tick_interval) as u64
    }

    /// Tick at which something started at `now` and lasting `seconds` ends
    pub fn timestamp(&self, now: u64, seconds: f32) -> u64 {
        now + self.ticks(seconds)
    }

    pub fn with_tick_interval(mut self, tick_interval: f32) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_vischeck(mut self, enabled: bool) -> Self {
        self.vischeck_enabled = enabled;
        self
    }

    pub fn with_vischeck_time(mut self, vischeck_time: f32) -> Self {
        self.vischeck_time = vischeck_time;
        self
    }

    pub fn with_vischeck_cache_time(mut self, vischeck_cache_time: f32) -> Self {
        self.vischeck_cache_time = vischeck_cache_time;
        self
    }

    pub fn with_stuck_time(mut self, stuck_time: f32) -> Self {
        self.stuck_time = stuck_time;
        self
    }

    pub fn with_stuck_detect_time(mut self, stuck_detect_time: f32) -> Self {
        self.stuck_detect_time = stuck_detect_time;
        self
    }

    pub fn with_stuck_expire_time(mut self, stuck_expire_time: f32) -> Self {
        self.stuck_expire_time = stuck_expire_time;
        self
    }

    pub fn with_stuck_blacklist_time(mut self, stuck_blacklist_time: f32) -> Self {
        self.stuck_blacklist_time = stuck_blacklist_time;
        self
    }

    pub fn with_sticky_ignore_time(mut self, sticky_ignore_time: f32) -> Self {
        self.sticky_ignore_time = sticky_ignore_time;
        self
    }

    pub fn with_path_randomization(mut self, enabled: bool) -> Self {
        self.path_randomization = enabled;
        self
    }

    pub fn with_crumb_cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.crumb_cache_dir = Some(dir.into());
        self
    }
}
