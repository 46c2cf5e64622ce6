//! Area arena for a loaded navigation mesh

use std::collections::HashMap;
use std::path::Path;

use glam::Vec3;
use nav_common::Result;
use serde::{Deserialize, Serialize};

use crate::area::{AreaHandle, NavArea};
use crate::binary_format::{self, NAV_MIN_VERSION, NAV_SUB_VERSION};

/// Identity of a mesh used to validate derived caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshSignature {
    pub name: String,
    pub size: u32,
    pub area_count: u32,
}

/// Navigation mesh: header data plus a fixed arena of areas
#[derive(Debug, Clone)]
pub struct NavMesh {
    pub version: u32,
    pub sub_version: u32,
    /// Size of the level file the mesh was generated from
    pub source_size: u32,
    pub analyzed: bool,
    /// Raw place names
    pub places: Vec<Vec<u8>>,
    pub has_unnamed_areas: bool,
    areas: Vec<NavArea>,
    id_lookup: HashMap<u32, AreaHandle>,
}

impl NavMesh {
    /// Creates a mesh from a list of areas and resolves their connections
    pub fn from_areas(source_size: u32, areas: Vec<NavArea>) -> Self {
        let mut mesh = Self {
            version: NAV_MIN_VERSION,
            sub_version: NAV_SUB_VERSION,
            source_size,
            analyzed: false,
            places: Vec::new(),
            has_unnamed_areas: false,
            areas,
            id_lookup: HashMap::new(),
        };
        mesh.resolve_connections();
        mesh
    }

    /// Rebuilds the id lookup and the resolved adjacency of every area
    pub(crate) fn resolve_connections(&mut self) {
        self.id_lookup.clear();
        self.id_lookup.reserve(self.areas.len());
        for (index, area) in self.areas.iter().enumerate() {
            self.id_lookup
                .entry(area.id)
                .or_insert(AreaHandle::new(index as u32));
        }

        for area in &mut self.areas {
            let own_id = area.id;
            let mut resolved = Vec::new();
            for id in area.connection_ids.iter().flatten() {
                if *id == own_id {
                    continue;
                }
                if let Some(handle) = self.id_lookup.get(id) {
                    resolved.push(*handle);
                }
            }
            area.connections = resolved;
        }
    }

    /// Loads a mesh from a `.nav` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        binary_format::load_nav_mesh_from_file(path)
    }

    /// Writes the mesh to a `.nav` file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        binary_format::save_nav_mesh_to_file(self, path)
    }

    pub fn areas(&self) -> &[NavArea] {
        &self.areas
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn area(&self, handle: AreaHandle) -> Option<&NavArea> {
        self.areas.get(handle.index())
    }

    pub fn area_mut(&mut self, handle: AreaHandle) -> Option<&mut NavArea> {
        self.areas.get_mut(handle.index())
    }

    pub fn is_valid(&self, handle: AreaHandle) -> bool {
        handle.index() < self.areas.len()
    }

    /// Handle of the area with the given file id
    pub fn handle_for_id(&self, id: u32) -> Option<AreaHandle> {
        self.id_lookup.get(&id).copied()
    }

    /// Iterates `(handle, area)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (AreaHandle, &NavArea)> {
        self.areas
            .iter()
            .enumerate()
            .map(|(i, area)| (AreaHandle::new(i as u32), area))
    }

    /// Signature used to stamp derived caches
    pub fn signature(&self, map_name: &str) -> MeshSignature {
        MeshSignature {
            name: map_name.to_string(),
            size: self.source_size,
            area_count: self.areas.len() as u32,
        }
    }

    /// Whether `to` appears in the resolved adjacency of `from`
    pub fn has_direct_connection(&self, from: AreaHandle, to: AreaHandle) -> bool {
        if from == to {
            return true;
        }
        self.area(from)
            .map(|area| area.connections.contains(&to))
            .unwrap_or(false)
    }

    /// An edge is one-way when the target has no connection back
    pub fn is_one_way(&self, from: AreaHandle, to: AreaHandle) -> bool {
        match self.area(to) {
            Some(area) => !area.connections.contains(&from),
            None => true,
        }
    }

    /// Bounds of all area corners
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self.areas.iter().flat_map(|area| area.corners());
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Direction;

    #[test]
    fn test_resolve_skips_self_and_unknown() {
        let mut a = NavArea::flat(10, [0.0, 0.0], [10.0, 10.0], 0.0);
        a.add_connection(Direction::East, 20);
        a.add_connection(Direction::North, 10);
        a.add_connection(Direction::West, 99);
        let b = NavArea::flat(20, [10.0, 0.0], [20.0, 10.0], 0.0);
        let mesh = NavMesh::from_areas(0, vec![a, b]);

        let ha = mesh.handle_for_id(10).unwrap();
        let hb = mesh.handle_for_id(20).unwrap();
        assert_eq!(mesh.area(ha).unwrap().connections(), &[hb]);
        assert!(mesh.has_direct_connection(ha, hb));
        assert!(!mesh.has_direct_connection(hb, ha));
        assert!(mesh.is_one_way(ha, hb));
        // Raw ids survive for writing
        assert_eq!(mesh.area(ha).unwrap().connection_ids[0], vec![10]);
    }

    #[test]
    fn test_signature() {
        let mesh = NavMesh::from_areas(
            1234,
            vec![NavArea::flat(1, [0.0, 0.0], [1.0, 1.0], 0.0)],
        );
        let sig = mesh.signature("ctf_test");
        assert_eq!(sig.size, 1234);
        assert_eq!(sig.area_count, 1);
        assert_eq!(sig.name, "ctf_test");
    }
}
