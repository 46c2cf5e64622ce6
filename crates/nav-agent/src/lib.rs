//! Single-agent navigation on top of `nav-core`
//!
//! This crate turns solved area paths into movement. A [`NavEngine`] owns the
//! loaded map and one agent's path slot; the host feeds it the world each tick
//! and receives walk and jump intents back.
//!
//! # Features
//!
//! - **Prioritized Requests**: One path slot, replaced only by equal or higher
//!   [`Priority`] goals, with reuse for nearby destinations
//! - **Crumb Following**: Look-ahead, drop handling and jump assistance
//! - **Hazard Scanning**: Sentry rings, invulnerable enemies and sticky traps
//!   written into the hazard ledger and checked along the trail
//! - **Recovery**: Stuck detection with area blacklisting, auto-repath and an
//!   emergency fallback that ignores geometry after repeated failures
//!
//! # Example
//!
//! ```rust,ignore
//! use nav_agent::{NavContext, NavEngine, PathRequest, Priority};
//! use nav_core::NavConfig;
//!
//! let mut engine = NavEngine::new(NavConfig::default());
//! engine.load_mesh("ctf_2fort", "maps/ctf_2fort.nav", Some(&trace));
//!
//! let mut ctx = NavContext::new(&world, &mut actuator, &trace);
//! if !engine.request_path(&ctx, PathRequest::new(goal, Priority::GetAmmo)) {
//!     log::debug!("no path: {}", engine.last_failure_reason());
//! }
//!
//! // Once per game tick
//! engine.run(&mut ctx);
//! ```
//!
//! # Architecture
//!
//! - [`NavEngine`]: Request handling and the per-tick pipeline
//! - [`PathState`]: The path slot, its trail and repath bookkeeping
//! - [`CrumbFollower`]: Chooses the steering target each tick
//! - [`HazardWatch`]: Threat rescans and trail blacklist checks
//! - [`EscalationLadder`]: Strict failure counting and the emergency fallback

pub mod context;
pub mod engine;
pub mod follower;
pub mod hazard_scan;
pub mod path_state;
pub mod priority;
pub mod recovery;
pub mod timer;

pub use context::*;
pub use engine::*;
pub use follower::*;
pub use hazard_scan::*;
pub use path_state::*;
pub use priority::*;
pub use recovery::*;
pub use timer::*;
