//! Per-edge crumb trails persisted between sessions
//!
//! The cache file is stamped with the mesh signature. A file whose version or
//! signature does not match is rejected as a whole; entries naming unknown
//! area ids are dropped individually.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::area::AreaHandle;
use crate::crumbs::{build_connection_crumbs, CachedCrumb};
use crate::nav_mesh::{MeshSignature, NavMesh};
use crate::trace::TraceService;

pub const CRUMB_CACHE_VERSION: u32 = 1;

/// Cache key of the edge between two area ids
#[inline]
pub fn connection_key(from_id: u32, to_id: u32) -> u64 {
    ((from_id as u64) << 32) | to_id as u64
}

/// `<dir>/<map>.crumbs.v1.json`
pub fn cache_path(dir: &Path, map_name: &str) -> PathBuf {
    dir.join(format!("{map_name}.crumbs.v{CRUMB_CACHE_VERSION}.json"))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrumbCacheFile {
    version: u32,
    map_signature: MeshSignature,
    connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConnectionRecord {
    from: u32,
    to: u32,
    crumbs: Vec<CachedCrumb>,
}

/// Edge sub-trails keyed by [`connection_key`]
#[derive(Debug, Default, Clone)]
pub struct CrumbCache {
    entries: HashMap<u64, Vec<CachedCrumb>>,
    dirty: bool,
}

impl CrumbCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the sub-trail of every connection in the mesh
    pub fn build(mesh: &NavMesh, trace: Option<&dyn TraceService>) -> Self {
        let mut cache = Self::new();
        for (handle, area) in mesh.iter() {
            for &next in area.connections() {
                let Some(next_area) = mesh.area(next) else {
                    continue;
                };
                let crumbs = build_connection_crumbs(mesh, handle, next, trace);
                if !crumbs.is_empty() {
                    cache
                        .entries
                        .insert(connection_key(area.id, next_area.id), crumbs);
                }
            }
        }
        cache.dirty = !cache.entries.is_empty();
        debug!("Built {} crumb cache entries", cache.entries.len());
        cache
    }

    pub fn get(&self, from_id: u32, to_id: u32) -> Option<&[CachedCrumb]> {
        self.entries
            .get(&connection_key(from_id, to_id))
            .map(Vec::as_slice)
    }

    /// Cached sub-trail for an edge, building and storing it on a miss
    pub fn get_or_build(
        &mut self,
        mesh: &NavMesh,
        from: AreaHandle,
        to: AreaHandle,
        trace: Option<&dyn TraceService>,
    ) -> Vec<CachedCrumb> {
        let (Some(from_area), Some(to_area)) = (mesh.area(from), mesh.area(to)) else {
            return Vec::new();
        };
        let key = connection_key(from_area.id, to_area.id);
        if let Some(crumbs) = self.entries.get(&key) {
            return crumbs.clone();
        }
        let crumbs = build_connection_crumbs(mesh, from, to, trace);
        if !crumbs.is_empty() {
            self.entries.insert(key, crumbs.clone());
            self.dirty = true;
        }
        crumbs
    }

    pub fn insert(&mut self, from_id: u32, to_id: u32, crumbs: Vec<CachedCrumb>) {
        self.entries.insert(connection_key(from_id, to_id), crumbs);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Holds entries not yet written to disk
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = false;
    }
}

#[cfg(feature = "serialization")]
mod persistence {
    use std::fs;

    use log::warn;
    use nav_common::{Error, Result};

    use super::*;

    impl CrumbCache {
        /// Loads a cache file, rejecting it unless it matches `signature`
        pub fn load(path: &Path, mesh: &NavMesh, signature: &MeshSignature) -> Result<Self> {
            let text = fs::read_to_string(path)?;
            let file: CrumbCacheFile = serde_json::from_str(&text)
                .map_err(|e| Error::CrumbCache(format!("parse {}: {e}", path.display())))?;

            if file.version != CRUMB_CACHE_VERSION {
                return Err(Error::CrumbCache(format!(
                    "version {} != {CRUMB_CACHE_VERSION}",
                    file.version
                )));
            }
            if &file.map_signature != signature {
                return Err(Error::CrumbCache(format!(
                    "signature mismatch: {:?} != {:?}",
                    file.map_signature, signature
                )));
            }

            let mut cache = Self::new();
            for record in file.connections {
                if mesh.handle_for_id(record.from).is_none()
                    || mesh.handle_for_id(record.to).is_none()
                    || record.crumbs.is_empty()
                {
                    continue;
                }
                cache
                    .entries
                    .insert(connection_key(record.from, record.to), record.crumbs);
            }

            info!(
                "Loaded {} crumb cache entries from {}",
                cache.entries.len(),
                path.display()
            );
            Ok(cache)
        }

        /// Writes the cache, creating the directory when needed
        pub fn save(&mut self, path: &Path, signature: &MeshSignature) -> Result<()> {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }

            let mut keys: Vec<u64> = self.entries.keys().copied().collect();
            keys.sort_unstable();
            let connections = keys
                .into_iter()
                .filter_map(|key| {
                    self.entries.get(&key).map(|crumbs| ConnectionRecord {
                        from: (key >> 32) as u32,
                        to: key as u32,
                        crumbs: crumbs.clone(),
                    })
                })
                .collect();

            let file = CrumbCacheFile {
                version: CRUMB_CACHE_VERSION,
                map_signature: signature.clone(),
                connections,
            };
            let text = serde_json::to_string(&file)
                .map_err(|e| Error::CrumbCache(format!("serialize: {e}")))?;
            fs::write(path, text)?;

            self.dirty = false;
            info!(
                "Saved {} crumb cache entries to {}",
                self.entries.len(),
                path.display()
            );
            Ok(())
        }

        /// Loads the cache for a map, rebuilding and saving it when the file is
        /// missing, stale or unreadable
        pub fn load_or_rebuild(
            dir: &Path,
            map_name: &str,
            mesh: &NavMesh,
            trace: Option<&dyn TraceService>,
        ) -> Self {
            let path = cache_path(dir, map_name);
            let signature = mesh.signature(map_name);

            match Self::load(&path, mesh, &signature) {
                Ok(cache) if !cache.is_empty() => return cache,
                Ok(_) => debug!("Crumb cache {} is empty", path.display()),
                Err(e) => debug!("Crumb cache miss: {e}"),
            }

            let mut cache = Self::build(mesh, trace);
            if let Err(e) = cache.save(&path, &signature) {
                warn!("Failed to save crumb cache {}: {e}", path.display());
            }
            cache
        }
    }
}
