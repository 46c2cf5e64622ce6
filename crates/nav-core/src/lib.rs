//! Navigation mesh storage and cost-aware path solving
//!
//! This crate holds everything about a loaded map that does not depend on a
//! particular agent: the area arena read from a `.nav` file, a KD-tree over
//! the areas, an A* solver whose edge costs react to hazards and stuck
//! history, and the synthesis of steerable crumb trails for each edge.
//!
//! # Features
//!
//! - **Mesh I/O**: Byte-exact reader and writer for the binary mesh format
//! - **Spatial Index**: Containing and nearest area queries, built off-thread
//! - **Path Solving**: A* over area adjacency with an expiring edge cache
//! - **Crumbs**: Adaptive, optionally curved waypoints per edge with a JSON
//!   disk cache
//! - **Hazards**: Time-expiring, category-tagged area penalties
//!
//! # Example
//!
//! ```rust,ignore
//! use nav_core::{CostContext, NavConfig, NavMap, NavMesh, PathOutcome};
//!
//! let mesh = NavMesh::load("maps/ctf_2fort.nav")?;
//! let map = NavMap::new("ctf_2fort", mesh);
//!
//! let start = map.find_closest_area(&start_pos, true).unwrap();
//! let goal = map.find_closest_area(&goal_pos, false).unwrap();
//!
//! let config = NavConfig::default();
//! let ctx = CostContext::new(&config, tick).with_trace(Some(&trace));
//! if let Ok(PathOutcome::Found(path)) = map.find_path(&ctx, start, goal) {
//!     println!("{} areas, cost {}", path.areas.len(), path.cost);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`NavMesh`]: Area arena with stable [`AreaHandle`]s
//! - [`SpatialIndex`]: KD-tree built on a worker thread
//! - [`NavMap`]: Mesh, index and the mutex-guarded [`GraphState`]
//! - [`PathSolver`]: Query-id stamped A*
//! - [`CrumbCache`]: Per-edge crumb trails keyed by mesh signature

pub mod area;
pub mod binary_format;
pub mod config;
pub mod connection;
pub mod cost_model;
pub mod crumb_cache;
pub mod crumbs;
pub mod edge_cache;
pub mod hazard;
pub mod kd_tree;
pub mod nav_map;
pub mod nav_mesh;
pub mod path_graph;
pub mod spatial_index;
pub mod status;
pub mod test_mesh_helpers;
pub mod trace;

pub use area::*;
pub use config::*;
pub use connection::*;
pub use cost_model::*;
pub use crumb_cache::*;
pub use crumbs::*;
pub use edge_cache::*;
pub use hazard::*;
pub use kd_tree::{FindAreaResult, KdTree};
pub use nav_map::*;
pub use nav_mesh::*;
pub use path_graph::*;
pub use spatial_index::*;
pub use status::*;
pub use trace::*;

#[cfg(test)]
mod nav_map_tests;
