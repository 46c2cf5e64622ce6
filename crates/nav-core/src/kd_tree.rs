//! KD-tree over navigation areas
//!
//! Areas are split on alternating X/Y axes at the median of their centers.
//! Every node stores the union of its own area box and both subtree boxes so
//! queries can prune whole subtrees. Build and queries use explicit stacks.

use glam::Vec3;

use crate::area::AreaHandle;
use crate::nav_mesh::NavMesh;

/// Extra vertical room around each area box
pub const BBOX_Z_PADDING: f32 = 128.0;

const KD_NULL: u32 = u32::MAX;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum bounds
    pub min: [f32; 3],
    /// Maximum bounds
    pub max: [f32; 3],
}

impl Aabb {
    /// Creates a new Aabb from min and max points
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Creates an empty Aabb (invalid bounds)
    pub fn empty() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }

    /// Checks if this Aabb is valid
    pub fn is_valid(&self) -> bool {
        self.min[0] <= self.max[0] && self.min[1] <= self.max[1] && self.min[2] <= self.max[2]
    }

    /// Expands this Aabb to include another Aabb
    pub fn expand(&mut self, other: &Aabb) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    /// Checks if the point lies inside or on the boundary
    pub fn contains_point(&self, p: &Vec3) -> bool {
        p.x >= self.min[0]
            && p.x <= self.max[0]
            && p.y >= self.min[1]
            && p.y <= self.max[1]
            && p.z >= self.min[2]
            && p.z <= self.max[2]
    }

    /// Squared distance from a point to the box; zero inside
    pub fn distance_squared(&self, p: &Vec3) -> f32 {
        let dx = (self.min[0] - p.x).max(p.x - self.max[0]).max(0.0);
        let dy = (self.min[1] - p.y).max(p.y - self.max[1]).max(0.0);
        let dz = (self.min[2] - p.z).max(p.z - self.max[2]).max(0.0);
        dx * dx + dy * dy + dz * dz
    }
}

/// Area snapshot used to build the tree
#[derive(Debug, Clone)]
pub struct KdItem {
    pub handle: AreaHandle,
    pub bounds: Aabb,
    pub center: Vec3,
}

impl KdItem {
    /// Snapshots every area of the mesh
    pub fn collect(mesh: &NavMesh) -> Vec<KdItem> {
        mesh.iter()
            .map(|(handle, area)| KdItem {
                handle,
                bounds: Aabb::new(
                    [area.nw.x, area.nw.y, area.min_z() - BBOX_Z_PADDING],
                    [area.se.x, area.se.y, area.max_z() + BBOX_Z_PADDING],
                ),
                center: area.center(),
            })
            .collect()
    }

    /// Doubled center coordinate on the split axis
    fn key(&self, axis: usize) -> f32 {
        self.bounds.min[axis] + self.bounds.max[axis]
    }
}

#[derive(Debug, Clone)]
struct KdNode {
    handle: AreaHandle,
    center: Vec3,
    bounds: Aabb,
    split: f32,
    axis: u8,
    left: u32,
    right: u32,
}

/// Result of a combined containing/nearest lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FindAreaResult {
    pub area: Option<AreaHandle>,
    pub is_exact: bool,
}

/// Balanced KD-tree of area handles
#[derive(Debug, Default)]
pub struct KdTree {
    nodes: Vec<KdNode>,
}

struct BuildTask {
    start: usize,
    end: usize,
    depth: usize,
    parent: u32,
    is_left: bool,
}

impl KdTree {
    /// Builds a tree for every area in the mesh
    pub fn from_mesh(mesh: &NavMesh) -> Self {
        Self::build(KdItem::collect(mesh))
    }

    /// Builds a tree from area snapshots
    pub fn build(mut items: Vec<KdItem>) -> Self {
        let mut nodes: Vec<KdNode> = Vec::with_capacity(items.len());
        let mut stack = vec![BuildTask {
            start: 0,
            end: items.len(),
            depth: 0,
            parent: KD_NULL,
            is_left: false,
        }];

        while let Some(task) = stack.pop() {
            if task.start >= task.end {
                continue;
            }

            let axis = task.depth % 2;
            let slice = &mut items[task.start..task.end];
            let median = slice.len() / 2;
            slice.select_nth_unstable_by(median, |a, b| a.key(axis).total_cmp(&b.key(axis)));
            let item = &slice[median];

            let index = nodes.len() as u32;
            nodes.push(KdNode {
                handle: item.handle,
                center: item.center,
                bounds: item.bounds,
                split: item.key(axis) * 0.5,
                axis: axis as u8,
                left: KD_NULL,
                right: KD_NULL,
            });

            if task.parent != KD_NULL {
                let parent = &mut nodes[task.parent as usize];
                if task.is_left {
                    parent.left = index;
                } else {
                    parent.right = index;
                }
            }

            let mid = task.start + median;
            stack.push(BuildTask {
                start: mid + 1,
                end: task.end,
                depth: task.depth + 1,
                parent: index,
                is_left: false,
            });
            stack.push(BuildTask {
                start: task.start,
                end: mid,
                depth: task.depth + 1,
                parent: index,
                is_left: true,
            });
        }

        // Children are always created after their parent
        for i in (0..nodes.len()).rev() {
            let (left, right) = (nodes[i].left, nodes[i].right);
            let mut bounds = nodes[i].bounds;
            if left != KD_NULL {
                bounds.expand(&nodes[left as usize].bounds);
            }
            if right != KD_NULL {
                bounds.expand(&nodes[right as usize].bounds);
            }
            nodes[i].bounds = bounds;
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First area that exactly contains `pos`
    pub fn find_containing(&self, mesh: &NavMesh, pos: &Vec3) -> Option<AreaHandle> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.contains_point(pos) {
                continue;
            }

            if let Some(area) = mesh.area(node.handle) {
                if area.contains(pos) {
                    return Some(node.handle);
                }
            }

            if node.right != KD_NULL {
                stack.push(node.right);
            }
            if node.left != KD_NULL {
                stack.push(node.left);
            }
        }
        None
    }

    /// Area whose center is closest to `pos` (squared 3D distance)
    pub fn find_nearest(&self, pos: &Vec3) -> Option<AreaHandle> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best: Option<AreaHandle> = None;
        let mut best_dist = f32::MAX;
        let mut stack = vec![(0u32, self.nodes[0].bounds.distance_squared(pos))];

        while let Some((index, lower_bound)) = stack.pop() {
            if lower_bound >= best_dist {
                continue;
            }
            let node = &self.nodes[index as usize];

            let dist = pos.distance_squared(node.center);
            if dist < best_dist {
                best_dist = dist;
                best = Some(node.handle);
            }

            let value = if node.axis == 0 { pos.x } else { pos.y };
            let (near, far) = if value < node.split {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };

            // Far side first so the near side is explored first
            for child in [far, near] {
                if child != KD_NULL {
                    let bound = self.nodes[child as usize].bounds.distance_squared(pos);
                    if bound < best_dist {
                        stack.push((child, bound));
                    }
                }
            }
        }
        best
    }

    /// Containing area when one exists, nearest area otherwise
    pub fn find_area(&self, mesh: &NavMesh, pos: &Vec3) -> FindAreaResult {
        if let Some(area) = self.find_containing(mesh, pos) {
            return FindAreaResult {
                area: Some(area),
                is_exact: true,
            };
        }
        FindAreaResult {
            area: self.find_nearest(pos),
            is_exact: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::{create_grid_mesh, Lcg};

    #[test]
    fn test_aabb_distance() {
        let aabb = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(aabb.distance_squared(&Vec3::new(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(aabb.distance_squared(&Vec3::new(3.0, 0.5, 0.5)), 4.0);
        assert!(aabb.contains_point(&Vec3::new(1.0, 1.0, 1.0)));
        assert!(!Aabb::empty().is_valid());
    }

    #[test]
    fn test_containing_matches_every_interior_point() {
        let mesh = create_grid_mesh(9, 7, 50.0);
        let tree = KdTree::from_mesh(&mesh);
        assert_eq!(tree.len(), mesh.area_count());

        for (handle, area) in mesh.iter() {
            let c = area.center();
            let probe = Vec3::new(c.x + 11.0, c.y - 7.0, c.z + 10.0);
            assert_eq!(tree.find_containing(&mesh, &probe), Some(handle));
        }
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let mesh = create_grid_mesh(12, 10, 40.0);
        let tree = KdTree::from_mesh(&mesh);
        let mut rng = Lcg::new(7);

        for _ in 0..500 {
            let p = Vec3::new(
                rng.range(-400.0, 900.0),
                rng.range(-400.0, 800.0),
                rng.range(-300.0, 300.0),
            );
            let found = tree.find_nearest(&p).unwrap();
            let found_dist = p.distance_squared(mesh.area(found).unwrap().center());
            let brute = mesh
                .areas()
                .iter()
                .map(|a| p.distance_squared(a.center()))
                .fold(f32::MAX, f32::min);
            assert_eq!(found_dist, brute);
        }
    }

    #[test]
    fn test_find_area_outside_mesh_is_not_exact() {
        let mesh = create_grid_mesh(3, 3, 100.0);
        let tree = KdTree::from_mesh(&mesh);
        let result = tree.find_area(&mesh, &Vec3::new(-500.0, 50.0, 0.0));
        assert!(!result.is_exact);
        assert!(result.area.is_some());

        let empty = KdTree::build(Vec::new());
        assert!(empty.find_nearest(&Vec3::ZERO).is_none());
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let mesh = create_grid_mesh(200, 200, 10.0);
        let tree = KdTree::from_mesh(&mesh);
        let p = Vec3::new(1234.5, 777.7, 0.0);
        let hit = tree.find_containing(&mesh, &p).unwrap();
        assert!(mesh.area(hit).unwrap().contains(&p));
    }
}
