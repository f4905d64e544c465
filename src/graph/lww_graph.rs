//! Last-Writer-Wins element graph.
//!
//! Two [`LwwElementSet`]s, one of vertices and one of directed edges. Edges
//! may only be added between existing vertices, and removing a vertex
//! tombstones every incident edge with the same timestamp.
//!
//! The edge view is restricted to edges whose endpoints are both present.
//! Concurrent `add_edge` / `remove_vertex` on different replicas can leave an
//! added edge pointing at a tombstoned vertex after merge; such an edge stays
//! in the replicated state but is never reported, so no replica ever observes
//! a dangling edge.

use super::edge::Edge;
use super::search::depth_first_path;
use crate::config::{GraphConfig, IsolatedVertexPolicy, Traversal};
use crate::crdt::{LwwElementSet, Merge};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::{debug, trace};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, C: Serialize",
    deserialize = "T: Deserialize<'de>, C: Deserialize<'de>"
))]
pub struct LwwElementGraph<T: Eq + Hash, C = Timestamp> {
    vertices: LwwElementSet<T, C>,
    edges: LwwElementSet<Edge<T>, C>,
    /// Local behaviour only, never shipped with state.
    #[serde(skip)]
    config: GraphConfig,
}

impl<T: Eq + Hash, C> Default for LwwElementGraph<T, C> {
    fn default() -> Self {
        LwwElementGraph {
            vertices: LwwElementSet::default(),
            edges: LwwElementSet::default(),
            config: GraphConfig::default(),
        }
    }
}

/// Equality of replicated state; the local config is not compared.
impl<T: Eq + Hash, C: PartialEq> PartialEq for LwwElementGraph<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.edges == other.edges
    }
}

impl<T: Eq + Hash, C: Eq> Eq for LwwElementGraph<T, C> {}

impl<T, C> LwwElementGraph<T, C>
where
    T: Eq + Hash + Clone,
    C: Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: GraphConfig) -> Self {
        LwwElementGraph {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn vertex_set(&self) -> &LwwElementSet<T, C> {
        &self.vertices
    }

    pub fn edge_set(&self) -> &LwwElementSet<Edge<T>, C> {
        &self.edges
    }

    pub fn vertices(&self) -> HashSet<T> {
        self.vertices.effective_members()
    }

    pub fn edges(&self) -> HashSet<Edge<T>> {
        self.effective_edges().cloned().collect()
    }

    fn effective_edges(&self) -> impl Iterator<Item = &Edge<T>> {
        self.edges.members().filter(move |edge| {
            self.vertices.contains(&edge.from) && self.vertices.contains(&edge.to)
        })
    }

    /// Edges that are live in the edge set but hidden because an endpoint is
    /// absent. Only concurrent histories produce these.
    pub fn masked_edges(&self) -> Vec<Edge<T>> {
        self.edges
            .members()
            .filter(|edge| !self.vertices.contains(&edge.from) || !self.vertices.contains(&edge.to))
            .cloned()
            .collect()
    }

    pub fn exists_vertex(&self, vertex: &T) -> bool {
        self.vertices.contains(vertex)
    }

    pub fn exists_edge(&self, edge: &Edge<T>) -> bool {
        self.edges.contains(edge) && self.exists_vertex(&edge.from) && self.exists_vertex(&edge.to)
    }

    pub fn add_vertex(&mut self, vertex: T, timestamp: C) {
        self.vertices.add(vertex, timestamp);
    }

    /// Remove `vertex` and every edge touching it, all at `timestamp`.
    ///
    /// Returns `false` if the vertex was not present or was added after
    /// `timestamp`. Incident edges added after `timestamp` keep no tombstone
    /// and stay masked until the vertex returns.
    pub fn remove_vertex(&mut self, vertex: T, timestamp: C) -> bool {
        if !self.vertices.remove(vertex.clone(), timestamp.clone()) {
            return false;
        }

        // Raw membership: edges already hidden by the other endpoint are retired too
        let incident: Vec<Edge<T>> = self
            .edges
            .members()
            .filter(|edge| edge.contains(&vertex))
            .cloned()
            .collect();
        if !incident.is_empty() {
            debug!(edges = incident.len(), "cascade-removing edges of removed vertex");
        }
        for edge in incident {
            self.edges.remove(edge, timestamp.clone());
        }

        self.verify_invariants();

        true
    }

    /// Add `edge` if both endpoints exist. Returns `false` otherwise, leaving
    /// the graph untouched.
    pub fn add_edge(&mut self, edge: Edge<T>, timestamp: C) -> bool {
        if !self.exists_vertex(&edge.from) || !self.exists_vertex(&edge.to) {
            debug!("rejected edge with missing endpoint");
            return false;
        }
        self.edges.add(edge, timestamp);
        true
    }

    pub fn add_edge_between(&mut self, from: T, to: T, timestamp: C) -> bool {
        self.add_edge(Edge::new(from, to), timestamp)
    }

    /// Remove `edge`; rejected like [`LwwElementSet::remove`] when absent or
    /// added after `timestamp`. With [`IsolatedVertexPolicy::Prune`] each
    /// endpoint left without incident edges is removed at the same timestamp.
    pub fn remove_edge(&mut self, edge: Edge<T>, timestamp: C) -> bool {
        if !self.exists_edge(&edge) || !self.edges.remove(edge.clone(), timestamp.clone()) {
            return false;
        }

        if self.config.isolated_vertices == IsolatedVertexPolicy::Prune {
            let Edge { from, to } = edge;
            let endpoints = if from == to { vec![from] } else { vec![from, to] };
            for endpoint in endpoints {
                let isolated = !self.effective_edges().any(|e| e.contains(&endpoint));
                if isolated {
                    debug!("pruning vertex left without edges");
                    self.remove_vertex(endpoint, timestamp.clone());
                }
            }
        }

        self.verify_invariants();

        true
    }

    /// Opposite endpoint of every edge touching `vertex`, regardless of
    /// direction. A self-loop yields `vertex` once. Order is unspecified.
    pub fn vertices_connected_to(&self, vertex: &T) -> Vec<T> {
        self.effective_edges()
            .filter_map(|edge| edge.other_endpoint(vertex).cloned())
            .collect()
    }

    /// Edges leaving `vertex`.
    pub fn edges_from(&self, vertex: &T) -> Vec<Edge<T>> {
        self.effective_edges()
            .filter(|edge| edge.from == *vertex)
            .cloned()
            .collect()
    }

    /// Any path from `from` to `to`, root first. `None` when either vertex is
    /// absent or `to` is unreachable.
    pub fn path(&self, from: &T, to: &T) -> Option<Vec<T>> {
        if !self.exists_vertex(from) || !self.exists_vertex(to) {
            return None;
        }
        let adjacency = self.adjacency();
        depth_first_path(from, to, |vertex| {
            adjacency.get(vertex).cloned().unwrap_or_default()
        })
    }

    fn adjacency(&self) -> HashMap<T, Vec<T>> {
        let mut adjacency: HashMap<T, Vec<T>> = HashMap::new();
        for edge in self.effective_edges() {
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .push(edge.to.clone());
            if self.config.traversal == Traversal::Undirected && !edge.is_self_loop() {
                adjacency
                    .entry(edge.to.clone())
                    .or_default()
                    .push(edge.from.clone());
            }
        }
        adjacency
    }

    /// TigerStyle: Verify all invariants hold
    ///
    /// # Invariants
    /// - Every reported edge has both endpoints among the reported vertices
    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self) {
        let vertices = self.vertices();
        debug_assert!(
            self.edges()
                .iter()
                .all(|edge| vertices.contains(&edge.from) && vertices.contains(&edge.to)),
            "Invariant violated: edge view contains a dangling edge"
        );
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    pub fn verify_invariants(&self) {}
}

impl<T, C> Merge for LwwElementGraph<T, C>
where
    T: Eq + Hash + Clone,
    C: Ord + Clone,
{
    fn merge_from(&mut self, other: &Self) {
        self.vertices.merge_from(&other.vertices);
        self.edges.merge_from(&other.edges);
        trace!(
            vertex_entries = self.vertices.adds().len(),
            edge_entries = self.edges.adds().len(),
            "merged graph state"
        );

        self.verify_invariants();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Graph = LwwElementGraph<u32>;

    fn ts(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    fn sorted<I: IntoIterator<Item = u32>>(items: I) -> Vec<u32> {
        let mut v: Vec<_> = items.into_iter().collect();
        v.sort();
        v
    }

    fn graph_with_edge(from: u32, to: u32, at: Timestamp) -> Graph {
        let mut graph = Graph::new();
        graph.add_vertex(from, at);
        graph.add_vertex(to, at);
        assert!(graph.add_edge_between(from, to, at));
        graph
    }

    #[test]
    fn test_add_vertex() {
        let mut graph = Graph::new();
        graph.add_vertex(1, ts(1));
        assert_eq!(graph.vertices().len(), 1);
        graph.add_vertex(2, ts(1));
        assert_eq!(graph.vertices().len(), 2);
    }

    #[test]
    fn test_remove_vertex() {
        let mut graph = Graph::new();
        graph.add_vertex(1, ts(1));
        assert!(graph.remove_vertex(1, ts(1)));
        assert!(graph.vertices().is_empty(), "tie resolves to removed");
        assert!(!graph.remove_vertex(1, ts(2)), "already absent");
    }

    #[test]
    fn test_remove_vertex_cascades_to_edges() {
        let mut graph = graph_with_edge(1, 2, ts(10));
        assert!(graph.remove_vertex(1, ts(20)));

        assert_eq!(sorted(graph.vertices()), vec![2]);
        assert!(graph.edges().is_empty());
        assert_eq!(
            graph.edge_set().removes().timestamp_of(&Edge::new(1, 2)),
            Some(&ts(20)),
            "cascade uses the vertex timestamp"
        );
    }

    #[test]
    fn test_stale_remove_vertex_is_rejected() {
        let mut graph = graph_with_edge(1, 2, ts(10));
        let before = graph.clone();

        assert!(!graph.remove_vertex(1, ts(5)));
        assert_eq!(graph, before, "nothing recorded");
        assert!(graph.exists_vertex(&1));
        assert!(graph.exists_edge(&Edge::new(1, 2)));
    }

    #[test]
    fn test_cascade_skips_edges_newer_than_removal() {
        let mut graph = Graph::new();
        graph.add_vertex(1, ts(1));
        graph.add_vertex(2, ts(1));
        assert!(graph.add_edge_between(1, 2, ts(10)));

        assert!(graph.remove_vertex(1, ts(5)));
        assert!(graph.edge_set().removes().is_empty(), "no stale edge tombstone");
        assert!(graph.edges().is_empty());
        assert_eq!(graph.masked_edges(), vec![Edge::new(1, 2)]);
    }

    #[test]
    fn test_stale_remove_edge_is_rejected() {
        let mut graph = graph_with_edge(1, 2, ts(10));
        let before = graph.clone();

        assert!(!graph.remove_edge(Edge::new(1, 2), ts(5)));
        assert_eq!(graph, before, "nothing recorded and nothing pruned");
        assert_eq!(sorted(graph.vertices()), vec![1, 2]);
    }

    #[test]
    fn test_add_edge_requires_endpoints() {
        let mut graph = Graph::new();
        assert!(!graph.add_edge(Edge::new(1, 2), ts(1)));
        assert!(graph.vertices().is_empty());
        assert!(graph.edges().is_empty());
        assert!(graph.edge_set().adds().is_empty());

        graph.add_vertex(1, ts(1));
        assert!(!graph.add_edge(Edge::new(1, 2), ts(1)));

        graph.add_vertex(2, ts(1));
        assert!(graph.add_edge(Edge::new(1, 2), ts(1)));
        assert!(graph.exists_edge(&Edge::new(1, 2)));
    }

    #[test]
    fn test_remove_edge_prunes_isolated_vertices() {
        let mut graph = graph_with_edge(1, 2, ts(1));
        assert!(graph.remove_edge(Edge::new(1, 2), ts(2)));
        assert!(graph.edges().is_empty());
        assert!(graph.vertices().is_empty(), "both endpoints lost their only edge");
    }

    #[test]
    fn test_remove_edge_keeps_connected_endpoint() {
        let mut graph = graph_with_edge(1, 2, ts(1));
        graph.add_vertex(3, ts(1));
        assert!(graph.add_edge_between(2, 3, ts(1)));

        assert!(graph.remove_edge(Edge::new(1, 2), ts(2)));
        assert_eq!(sorted(graph.vertices()), vec![2, 3]);
    }

    #[test]
    fn test_remove_edge_keep_policy() {
        let config = GraphConfig::default().with_isolated_vertices(IsolatedVertexPolicy::Keep);
        let mut graph = Graph::with_config(config);
        graph.add_vertex(1, ts(1));
        graph.add_vertex(2, ts(1));
        assert!(graph.add_edge_between(1, 2, ts(1)));

        assert!(graph.remove_edge(Edge::new(1, 2), ts(2)));
        assert!(graph.edges().is_empty());
        assert_eq!(sorted(graph.vertices()), vec![1, 2]);
    }

    #[test]
    fn test_remove_absent_edge() {
        let mut graph = graph_with_edge(1, 2, ts(1));
        assert!(!graph.remove_edge(Edge::new(2, 1), ts(2)), "direction matters");
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_remove_self_loop() {
        let mut graph = Graph::new();
        graph.add_vertex(1, ts(1));
        assert!(graph.add_edge_between(1, 1, ts(1)));
        assert_eq!(graph.vertices_connected_to(&1), vec![1]);

        assert!(graph.remove_edge(Edge::new(1, 1), ts(2)));
        assert!(graph.vertices().is_empty());
    }

    #[test]
    fn test_exists_vertex() {
        let mut graph = Graph::new();
        assert!(!graph.exists_vertex(&1));
        graph.add_vertex(1, ts(1));
        assert!(graph.exists_vertex(&1));
    }

    #[test]
    fn test_vertices_connected_to() {
        let mut graph = Graph::new();
        graph.add_vertex(1, ts(1));
        assert!(graph.vertices_connected_to(&1).is_empty());

        graph.add_vertex(2, ts(1));
        assert!(graph.add_edge_between(1, 2, ts(1)));
        assert_eq!(graph.vertices_connected_to(&1), vec![2]);

        graph.add_vertex(3, ts(1));
        assert!(graph.add_edge_between(3, 1, ts(1)));
        assert_eq!(sorted(graph.vertices_connected_to(&1)), vec![2, 3], "both directions");
    }

    #[test]
    fn test_edges_from_is_directional() {
        let mut graph = Graph::new();
        for v in 1..=3 {
            graph.add_vertex(v, ts(1));
        }
        assert!(graph.edges_from(&1).is_empty());

        assert!(graph.add_edge_between(1, 2, ts(1)));
        assert!(graph.add_edge_between(1, 3, ts(1)));
        assert!(graph.add_edge_between(3, 2, ts(1)));

        assert_eq!(graph.edges_from(&1).len(), 2);
        assert_eq!(graph.edges_from(&2).len(), 0);
        assert_eq!(graph.edges_from(&3), vec![Edge::new(3, 2)]);
    }

    #[test]
    fn test_path() {
        let mut graph = Graph::new();
        assert!(graph.path(&1, &3).is_none(), "empty graph");

        for v in 1..=4 {
            graph.add_vertex(v, ts(1));
        }
        assert!(graph.add_edge_between(1, 2, ts(2)));
        assert!(graph.path(&1, &3).is_none());

        assert!(graph.add_edge_between(2, 3, ts(3)));
        assert_eq!(graph.path(&1, &3), Some(vec![1, 2, 3]));
        assert!(graph.path(&1, &4).is_none(), "4 is isolated");

        assert!(graph.remove_vertex(2, ts(10)));
        assert!(graph.path(&1, &3).is_none());
    }

    #[test]
    fn test_path_ignores_direction_by_default() {
        let mut graph = Graph::new();
        for v in 1..=3 {
            graph.add_vertex(v, ts(1));
        }
        assert!(graph.add_edge_between(2, 1, ts(1)));
        assert!(graph.add_edge_between(3, 2, ts(1)));
        assert_eq!(graph.path(&1, &3), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_path_directed_traversal() {
        let config = GraphConfig::default().with_traversal(Traversal::Directed);
        let mut graph = Graph::with_config(config);
        for v in 1..=3 {
            graph.add_vertex(v, ts(1));
        }
        assert!(graph.add_edge_between(1, 2, ts(1)));
        assert!(graph.add_edge_between(3, 2, ts(1)));

        assert!(graph.path(&1, &3).is_none());
        assert_eq!(graph.path(&3, &2), Some(vec![3, 2]));
    }

    #[test]
    fn test_path_to_self_and_absent_vertices() {
        let mut graph = Graph::new();
        graph.add_vertex(1, ts(1));
        assert_eq!(graph.path(&1, &1), Some(vec![1]));
        assert!(graph.path(&9, &1).is_none());
        assert!(graph.path(&1, &9).is_none());
    }

    #[test]
    fn test_merge_graphs() {
        let mut first = graph_with_edge(1, 2, ts(1));
        let mut second = graph_with_edge(2, 3, ts(1));

        first.merge_from(&second);
        assert!(first.path(&1, &3).is_some());

        assert!(second.remove_edge(Edge::new(2, 3), ts(100)));
        first.merge_from(&second);
        assert!(first.path(&1, &3).is_none());

        // The other side pruned 2 and 3 at the removal timestamp
        assert_eq!(sorted(first.vertices()), vec![1]);
        assert!(first.edges().is_empty(), "1->2 lost its endpoint");
    }

    #[test]
    fn test_concurrent_edge_add_and_vertex_remove_masks_edge() {
        let base = graph_with_edge(1, 2, ts(1));

        let mut a = base.clone();
        let mut b = base.clone();
        a.add_vertex(3, ts(2));
        assert!(a.add_edge_between(2, 3, ts(5)));
        assert!(b.remove_vertex(2, ts(3)));

        let ab = a.merged(&b);
        let ba = b.merged(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.vertices(), ba.vertices());
        assert_eq!(ab.edges(), ba.edges());

        assert_eq!(sorted(ab.vertices()), vec![1, 3]);
        assert!(ab.edges().is_empty(), "edge 2->3 references a removed vertex");
        assert_eq!(ab.masked_edges(), vec![Edge::new(2, 3)]);

        // Re-adding the vertex brings the surviving edge back
        let mut revived = ab.clone();
        revived.add_vertex(2, ts(10));
        assert!(revived.exists_edge(&Edge::new(2, 3)));
        assert!(!revived.exists_edge(&Edge::new(1, 2)));
    }

    #[test]
    fn test_merge_ignores_config() {
        let keep = GraphConfig::default().with_isolated_vertices(IsolatedVertexPolicy::Keep);
        let a = Graph::with_config(keep);
        let b = Graph::new();
        assert_eq!(a, b);
        assert_eq!(a.merged(&b).config(), &keep);
    }
}
