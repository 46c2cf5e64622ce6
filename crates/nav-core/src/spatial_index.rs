//! Spatial index with an optional background build
//!
//! The KD-tree is built on a worker thread when a mesh is loaded. The first
//! query joins the worker; if the worker cannot be spawned or panics, the tree
//! is built on the calling thread instead.

use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use glam::Vec3;

use crate::area::AreaHandle;
use crate::kd_tree::{FindAreaResult, KdItem, KdTree};
use crate::nav_mesh::NavMesh;

/// Spatial index over the areas of one mesh
#[derive(Debug)]
pub struct SpatialIndex {
    tree: OnceLock<KdTree>,
    pending: Mutex<Option<JoinHandle<KdTree>>>,
}

impl SpatialIndex {
    /// Builds the index on the current thread
    pub fn build(mesh: &NavMesh) -> Self {
        let tree = OnceLock::new();
        let _ = tree.set(KdTree::from_mesh(mesh));
        Self {
            tree,
            pending: Mutex::new(None),
        }
    }

    /// Starts building the index on a worker thread
    pub fn spawn(mesh: &NavMesh) -> Self {
        let items = KdItem::collect(mesh);
        let area_count = items.len();
        let spawned = thread::Builder::new()
            .name("nav-index".to_string())
            .spawn(move || {
                let tree = KdTree::build(items);
                log::debug!("Spatial index built for {} areas", area_count);
                tree
            });

        match spawned {
            Ok(handle) => Self {
                tree: OnceLock::new(),
                pending: Mutex::new(Some(handle)),
            },
            Err(e) => {
                log::warn!("Failed to spawn index worker, building inline: {}", e);
                Self::build(mesh)
            }
        }
    }

    /// Whether queries can run without blocking
    pub fn is_ready(&self) -> bool {
        if self.tree.get().is_some() {
            return true;
        }
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// The tree, blocking on the worker if it is still running
    pub fn tree(&self, mesh: &NavMesh) -> &KdTree {
        self.tree.get_or_init(|| {
            let handle = self
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            match handle.map(JoinHandle::join) {
                Some(Ok(tree)) => tree,
                Some(Err(_)) => {
                    log::warn!("Index worker panicked, rebuilding inline");
                    KdTree::from_mesh(mesh)
                }
                None => KdTree::from_mesh(mesh),
            }
        })
    }

    pub fn find_containing(&self, mesh: &NavMesh, pos: &Vec3) -> Option<AreaHandle> {
        self.tree(mesh).find_containing(mesh, pos)
    }

    pub fn find_nearest(&self, mesh: &NavMesh, pos: &Vec3) -> Option<AreaHandle> {
        self.tree(mesh).find_nearest(pos)
    }

    pub fn find_area(&self, mesh: &NavMesh, pos: &Vec3) -> FindAreaResult {
        self.tree(mesh).find_area(mesh, pos)
    }
}
