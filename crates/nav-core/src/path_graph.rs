//! A* over the area adjacency graph
//!
//! Scratch nodes are stamped with a query id instead of being cleared between
//! searches. Improved nodes are pushed again and stale heap entries are skipped
//! on pop, so the first time the goal is popped its cost is optimal for any
//! consistent heuristic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::area::AreaHandle;
use crate::cost_model::{adjacent_costs, CostContext};
use crate::edge_cache::EdgeCache;
use crate::hazard::HazardLedger;
use crate::nav_mesh::NavMesh;
use crate::status::{Status, StatusResult};

/// Graph the solver runs on
pub trait SearchGraph {
    fn node_count(&self) -> usize;

    /// Appends `(neighbor, edge cost)` pairs for `node`
    fn neighbors(&mut self, node: AreaHandle, out: &mut Vec<(AreaHandle, f32)>);

    /// Lower bound on the cost from `node` to `goal`
    fn heuristic(&self, node: AreaHandle, goal: AreaHandle) -> f32;
}

/// Solved sequence of areas
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedPath {
    pub areas: Vec<AreaHandle>,
    pub cost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Found(SolvedPath),
    StartEndSame,
    /// Goal unreachable; `partial` leads to the reached area closest to it
    NoSolution { partial: Option<SolvedPath> },
}

impl PathOutcome {
    pub fn status(&self) -> Status {
        match self {
            PathOutcome::Found(_) => Status::Success,
            PathOutcome::StartEndSame => Status::StartEndSame,
            PathOutcome::NoSolution { .. } => Status::NoSolution,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    g: f32,
    f: f32,
    parent: Option<AreaHandle>,
    query_id: u32,
}

impl Default for SearchNode {
    fn default() -> Self {
        Self {
            g: f32::MAX,
            f: f32::MAX,
            parent: None,
            query_id: 0,
        }
    }
}

/// Open-list entry
#[derive(Debug, Clone, Copy)]
struct HeapNode {
    area: AreaHandle,
    f: f32,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl Eq for HeapNode {}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; NaN sorts last
        match other.f.partial_cmp(&self.f) {
            Some(ordering) => ordering,
            None => {
                if other.f.is_nan() && !self.f.is_nan() {
                    Ordering::Greater
                } else if !other.f.is_nan() && self.f.is_nan() {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            }
        }
    }
}

/// Reusable solver state
#[derive(Debug, Default)]
pub struct PathSolver {
    nodes: Vec<SearchNode>,
    open: BinaryHeap<HeapNode>,
    neighbors: Vec<(AreaHandle, f32)>,
    query_id: u32,
}

impl PathSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the last query
    pub fn query_id(&self) -> u32 {
        self.query_id
    }

    fn begin_query(&mut self, node_count: usize) {
        if self.nodes.len() != node_count {
            self.nodes.clear();
            self.nodes.resize(node_count, SearchNode::default());
            self.query_id = 0;
        }
        self.query_id = self.query_id.wrapping_add(1);
        if self.query_id == 0 {
            self.nodes.fill(SearchNode::default());
            self.query_id = 1;
        }
        self.open.clear();
    }

    fn node_mut(&mut self, area: AreaHandle) -> &mut SearchNode {
        let query_id = self.query_id;
        let node = &mut self.nodes[area.index()];
        if node.query_id != query_id {
            *node = SearchNode {
                query_id,
                ..SearchNode::default()
            };
        }
        node
    }

    fn reconstruct(&self, end: AreaHandle) -> SolvedPath {
        let mut areas = vec![end];
        let mut current = end;
        while let Some(parent) = self.nodes[current.index()].parent {
            areas.push(parent);
            current = parent;
        }
        areas.reverse();
        SolvedPath {
            areas,
            cost: self.nodes[end.index()].g,
        }
    }

    /// Finds the cheapest path from `start` to `goal`
    pub fn solve<G: SearchGraph>(
        &mut self,
        graph: &mut G,
        start: AreaHandle,
        goal: AreaHandle,
    ) -> StatusResult<PathOutcome> {
        let count = graph.node_count();
        if start.index() >= count || goal.index() >= count {
            return Err(Status::InvalidParam);
        }
        if start == goal {
            return Ok(PathOutcome::StartEndSame);
        }

        self.begin_query(count);

        let start_h = graph.heuristic(start, goal);
        let node = self.node_mut(start);
        node.g = 0.0;
        node.f = start_h;
        self.open.push(HeapNode {
            area: start,
            f: start_h,
        });

        let mut best = (start, start_h);

        while let Some(HeapNode { area, f }) = self.open.pop() {
            if area == goal {
                return Ok(PathOutcome::Found(self.reconstruct(goal)));
            }

            let current = self.nodes[area.index()];
            if f > current.f {
                continue;
            }

            let mut neighbors = std::mem::take(&mut self.neighbors);
            neighbors.clear();
            graph.neighbors(area, &mut neighbors);

            for &(next, edge_cost) in &neighbors {
                if next.index() >= count || !edge_cost.is_finite() || edge_cost <= 0.0 {
                    continue;
                }
                let g = current.g + edge_cost;
                if g >= self.node_mut(next).g {
                    continue;
                }
                let h = graph.heuristic(next, goal);
                let node = self.node_mut(next);
                node.g = g;
                node.f = g + h;
                node.parent = Some(area);
                self.open.push(HeapNode {
                    area: next,
                    f: g + h,
                });
                if h < best.1 {
                    best = (next, h);
                }
            }

            self.neighbors = neighbors;
        }

        let partial = (best.0 != start).then(|| self.reconstruct(best.0));
        Ok(PathOutcome::NoSolution { partial })
    }
}

/// The navigation mesh seen through the cost model
pub struct MeshGraph<'a, 'c> {
    pub mesh: &'a NavMesh,
    pub edges: &'a mut EdgeCache,
    pub hazards: &'a HazardLedger,
    pub ctx: &'a CostContext<'c>,
}

impl SearchGraph for MeshGraph<'_, '_> {
    fn node_count(&self) -> usize {
        self.mesh.area_count()
    }

    fn neighbors(&mut self, node: AreaHandle, out: &mut Vec<(AreaHandle, f32)>) {
        adjacent_costs(self.mesh, self.edges, self.hazards, self.ctx, node, out);
    }

    fn heuristic(&self, node: AreaHandle, goal: AreaHandle) -> f32 {
        match (self.mesh.area(node), self.mesh.area(goal)) {
            (Some(a), Some(b)) => a.center().distance(b.center()),
            _ => 0.0,
        }
    }
}
