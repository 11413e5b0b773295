//! Classical graph algorithms over a [`Graph`] snapshot.
//!
//! Every function here is pure: it reads the graph it is handed and returns a
//! fresh result. Callers holding a [`crate::GraphStore`] should run them on a
//! snapshot so the store lock is not held for the duration of the search.
//!
//! Predecessor vectors are indexed by node id and are [`Graph::node_bound`]
//! long. A node that is its own predecessor is either the root or was not
//! reached; ids of removed nodes are always self-predecessors.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

use crate::graph::{Graph, NodeId};

/// Which way edges may be walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// Only from source to target.
    Directed,
    /// In either direction.
    #[default]
    Undirected,
}

/// Min-heap entry. The sequence number makes ties pop in push order so runs
/// are deterministic for a fixed edge order.
type HeapEntry = Reverse<(OrderedFloat<f64>, u64, NodeId)>;

/// Calls `f(neighbor, weight)` for each edge leaving `node`, in edge-id order.
/// Parallel edges are reported individually.
#[inline]
fn for_each_neighbor(graph: &Graph, node: NodeId, traversal: Traversal, mut f: impl FnMut(NodeId, f64)) {
    for &edge_id in graph.out_edges(node) {
        if let Some(edge) = graph.edge(edge_id) {
            f(edge.target, edge.weight);
        }
    }
    if traversal == Traversal::Undirected {
        for &edge_id in graph.in_edges(node) {
            if let Some(edge) = graph.edge(edge_id) {
                f(edge.source, edge.weight);
            }
        }
    }
}

#[inline]
fn self_predecessors(graph: &Graph) -> Vec<NodeId> {
    (0..graph.node_bound()).collect()
}

/// Single-source Dijkstra.
///
/// Returns the predecessor vector of the shortest-path tree rooted at `from`.
/// When `to` is given the search stops as soon as `to` is settled, and only
/// settled nodes keep their predecessor; everything else reports itself.
/// A relaxation only wins on a strictly shorter distance, so between equal
/// paths the one found through the first relaxed edge is kept.
pub fn shortest_path(
    graph: &Graph,
    from: NodeId,
    to: Option<NodeId>,
    traversal: Traversal,
) -> Vec<NodeId> {
    let mut pred = self_predecessors(graph);
    if !graph.contains_node(from) {
        tracing::debug!(node = from, "shortest path from unknown node");
        return pred;
    }

    let n = graph.node_bound();
    let mut dist = vec![f64::INFINITY; n];
    let mut settled = vec![false; n];
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut seq = 0u64;

    dist[from] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0), seq, from)));

    while let Some(Reverse((OrderedFloat(d), _, u))) = heap.pop() {
        if settled[u] || d > dist[u] {
            continue;
        }
        settled[u] = true;
        if Some(u) == to {
            break;
        }
        for_each_neighbor(graph, u, traversal, |v, w| {
            let candidate = d + w;
            if !settled[v] && candidate < dist[v] {
                dist[v] = candidate;
                pred[v] = u;
                seq += 1;
                heap.push(Reverse((OrderedFloat(candidate), seq, v)));
            }
        });
    }

    for (node, done) in settled.iter().enumerate() {
        if !done {
            pred[node] = node;
        }
    }
    pred
}

/// Minimum spanning tree of the component containing `root` (Prim), with
/// edges treated as undirected. Nodes outside that component are
/// self-predecessors.
pub fn spanning_tree(graph: &Graph, root: NodeId) -> Vec<NodeId> {
    let mut pred = self_predecessors(graph);
    if !graph.contains_node(root) {
        tracing::debug!(node = root, "spanning tree from unknown node");
        return pred;
    }

    let n = graph.node_bound();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut seq = 0u64;

    best[root] = 0.0;
    heap.push(Reverse((OrderedFloat(0.0), seq, root)));

    while let Some(Reverse((OrderedFloat(w), _, u))) = heap.pop() {
        if in_tree[u] || w > best[u] {
            continue;
        }
        in_tree[u] = true;
        for_each_neighbor(graph, u, Traversal::Undirected, |v, weight| {
            if !in_tree[v] && weight < best[v] {
                best[v] = weight;
                pred[v] = u;
                seq += 1;
                heap.push(Reverse((OrderedFloat(weight), seq, v)));
            }
        });
    }
    pred
}

/// Number of tree edges encoded in a predecessor vector.
pub fn tree_edge_count(pred: &[NodeId]) -> usize {
    pred.iter().enumerate().filter(|(node, p)| *node != **p).count()
}

/// Walks a predecessor vector back from `target` and returns the path from
/// the root to `target`. A target that is its own predecessor (the root, or a
/// node that was never reached) yields just `[target]`; an out-of-range
/// target yields an empty path.
pub fn path_to(pred: &[NodeId], target: NodeId) -> Vec<NodeId> {
    if target >= pred.len() {
        return Vec::new();
    }
    let mut path = vec![target];
    let mut current = target;
    while pred[current] != current {
        current = pred[current];
        path.push(current);
        if path.len() > pred.len() {
            // malformed vector with a cycle
            return Vec::new();
        }
    }
    path.reverse();
    path
}

/// Union-find with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}

/// Weakly connected components. Component ids are dense, starting at 0, and
/// numbered in order of each component's lowest node id. Removed node slots
/// map to `None`.
pub fn connected_components(graph: &Graph) -> Vec<Option<usize>> {
    let n = graph.node_bound();
    let mut sets = DisjointSet::new(n);
    for edge in graph.edges() {
        sets.union(edge.source, edge.target);
    }

    let mut label_of_root: Vec<Option<usize>> = vec![None; n];
    let mut next = 0;
    let mut components = vec![None; n];
    for node in graph.node_ids() {
        let root = sets.find(node);
        let label = *label_of_root[root].get_or_insert_with(|| {
            next += 1;
            next - 1
        });
        components[node] = Some(label);
    }
    components
}

/// Number of distinct components among live nodes.
pub fn component_count(components: &[Option<usize>]) -> usize {
    components.iter().flatten().max().map(|m| m + 1).unwrap_or(0)
}

/// Per-source accumulation for Brandes' algorithm.
fn brandes_from(graph: &Graph, source: NodeId, traversal: Traversal) -> Vec<f64> {
    let n = graph.node_bound();
    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0_f64; n];
    let mut preds: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    let mut order: Vec<NodeId> = Vec::with_capacity(graph.node_count());
    let mut settled = vec![false; n];
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut seq = 0u64;

    dist[source] = 0.0;
    sigma[source] = 1.0;
    heap.push(Reverse((OrderedFloat(0.0), seq, source)));

    while let Some(Reverse((OrderedFloat(d), _, u))) = heap.pop() {
        if settled[u] || d > dist[u] {
            continue;
        }
        settled[u] = true;
        order.push(u);
        for_each_neighbor(graph, u, traversal, |v, w| {
            if settled[v] {
                return;
            }
            let candidate = d + w;
            if candidate < dist[v] {
                dist[v] = candidate;
                sigma[v] = sigma[u];
                preds[v].clear();
                preds[v].push(u);
                seq += 1;
                heap.push(Reverse((OrderedFloat(candidate), seq, v)));
            } else if candidate == dist[v] {
                sigma[v] += sigma[u];
                preds[v].push(u);
            }
        });
    }

    let mut delta = vec![0.0_f64; n];
    let mut contribution = vec![0.0_f64; n];
    for &w in order.iter().rev() {
        for &v in &preds[w] {
            if sigma[w] > 0.0 {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
        }
        if w != source {
            contribution[w] = delta[w];
        }
    }
    contribution
}

/// Raw (unnormalized) betweenness centrality by Brandes' algorithm over
/// weighted shortest paths.
///
/// For [`Traversal::Undirected`] every unordered pair is counted once, so the
/// per-source sums are halved. Sources are processed in parallel.
/// Cost is O(V·E + V² log V).
pub fn betweenness_centrality(graph: &Graph, traversal: Traversal) -> Vec<f64> {
    let n = graph.node_bound();
    let sources: Vec<NodeId> = graph.node_ids().collect();

    let mut scores = sources
        .par_iter()
        .map(|&s| brandes_from(graph, s, traversal))
        .reduce(
            || vec![0.0; n],
            |mut acc, part| {
                for (a, p) in acc.iter_mut().zip(part) {
                    *a += p;
                }
                acc
            },
        );

    if traversal == Traversal::Undirected {
        for score in &mut scores {
            *score /= 2.0;
        }
    }
    scores
}

/// Scales raw betweenness scores into `[0, 1]` by the number of ordered
/// (directed) or unordered (undirected) pairs not involving the node.
pub fn normalize_betweenness(scores: &mut [f64], node_count: usize, traversal: Traversal) {
    if node_count < 3 {
        return;
    }
    let pairs = ((node_count - 1) * (node_count - 2)) as f64;
    let scale = match traversal {
        Traversal::Directed => pairs,
        Traversal::Undirected => pairs / 2.0,
    };
    for score in scores {
        *score /= scale;
    }
}

/// Incident edge count (in + out) of a node; 0 for unknown ids.
#[inline]
pub fn degree(graph: &Graph, node: NodeId) -> usize {
    graph.node_degree(node)
}

/// `histogram[d]` is the number of live nodes with degree `d`.
pub fn degree_histogram(graph: &Graph) -> Vec<usize> {
    let mut histogram = Vec::new();
    for node in graph.node_ids() {
        let d = graph.node_degree(node);
        if histogram.len() <= d {
            histogram.resize(d + 1, 0);
        }
        histogram[d] += 1;
    }
    histogram
}

/// Connected nodes reachable from `start` ignoring direction, in BFS order.
pub fn reachable_from(graph: &Graph, start: NodeId) -> Vec<NodeId> {
    if !graph.contains_node(start) {
        return Vec::new();
    }
    let mut seen = vec![false; graph.node_bound()];
    let mut queue = VecDeque::from([start]);
    let mut order = Vec::new();
    seen[start] = true;
    while let Some(u) = queue.pop_front() {
        order.push(u);
        for_each_neighbor(graph, u, Traversal::Undirected, |v, _| {
            if !seen[v] {
                seen[v] = true;
                queue.push_back(v);
            }
        });
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weighted_triangle() -> Graph {
        let mut g = Graph::new();
        for _ in 0..3 {
            g.add_node();
        }
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(1, 2, 1.0).unwrap();
        g.add_edge(0, 2, 5.0).unwrap();
        g
    }

    fn two_triangles() -> Graph {
        let mut g = Graph::new();
        for _ in 0..6 {
            g.add_node();
        }
        for (a, b) in [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
            g.add_edge(a, b, 1.0).unwrap();
        }
        g
    }

    #[test]
    fn test_shortest_path_prefers_cheaper_detour() {
        let g = weighted_triangle();
        let pred = shortest_path(&g, 0, Some(2), Traversal::Undirected);
        assert_eq!(pred[2], 1);
        assert_eq!(pred[1], 0);
        assert_eq!(pred[0], 0);
        assert_eq!(path_to(&pred, 2), vec![0, 1, 2]);
    }

    #[test]
    fn test_shortest_path_to_self() {
        let g = weighted_triangle();
        let pred = shortest_path(&g, 1, Some(1), Traversal::Undirected);
        assert_eq!(pred[1], 1);
        assert_eq!(path_to(&pred, 1), vec![1]);
    }

    #[test]
    fn test_shortest_path_unreachable_is_sentinel() {
        let g = two_triangles();
        let pred = shortest_path(&g, 0, None, Traversal::Undirected);
        for node in 3..6 {
            assert_eq!(pred[node], node);
            assert!(path_to(&pred, node).len() <= 1);
        }
    }

    #[test]
    fn test_shortest_path_directed_respects_direction() {
        let g = weighted_triangle();
        let pred = shortest_path(&g, 2, None, Traversal::Directed);
        assert_eq!(pred, vec![0, 1, 2]);
    }

    #[test]
    fn test_parallel_edges_are_independent_candidates() {
        let mut g = Graph::new();
        g.add_node();
        g.add_node();
        g.add_node();
        g.add_edge(0, 1, 10.0).unwrap();
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(0, 2, 3.0).unwrap();
        g.add_edge(1, 2, 1.0).unwrap();
        let pred = shortest_path(&g, 0, None, Traversal::Directed);
        assert_eq!(path_to(&pred, 2), vec![0, 1, 2]);

        let tree = spanning_tree(&g, 0);
        assert_eq!(tree[1], 0);
        assert_eq!(tree[2], 1);
    }

    #[test]
    fn test_spanning_tree_has_n_minus_one_edges() {
        let g = weighted_triangle();
        let tree = spanning_tree(&g, 0);
        assert_eq!(tree_edge_count(&tree), 2);
        // heavy edge 0-2 is excluded
        assert_eq!(tree[2], 1);
        for node in 0..3 {
            assert_eq!(path_to(&tree, node)[0], 0);
        }
    }

    #[test]
    fn test_spanning_tree_disconnected() {
        let g = two_triangles();
        let tree = spanning_tree(&g, 4);
        assert_eq!(tree_edge_count(&tree), 2);
        for node in 0..3 {
            assert_eq!(tree[node], node);
        }
    }

    #[test]
    fn test_components_two_triangles() {
        let g = two_triangles();
        let components = connected_components(&g);
        assert_eq!(component_count(&components), 2);
        let first = components.iter().filter(|c| **c == Some(0)).count();
        let second = components.iter().filter(|c| **c == Some(1)).count();
        assert_eq!((first, second), (3, 3));
    }

    #[test]
    fn test_components_skip_removed_nodes() {
        let mut g = two_triangles();
        g.remove_node(0);
        let components = connected_components(&g);
        assert_eq!(components[0], None);
        assert_eq!(components[1], Some(0));
    }

    #[test]
    fn test_betweenness_path_graph() {
        let mut g = Graph::new();
        for _ in 0..3 {
            g.add_node();
        }
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(1, 2, 1.0).unwrap();
        let scores = betweenness_centrality(&g, Traversal::Undirected);
        assert_eq!(scores, vec![0.0, 1.0, 0.0]);

        let directed = betweenness_centrality(&g, Traversal::Directed);
        assert_eq!(directed, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_betweenness_star_normalized() {
        let mut g = Graph::new();
        let hub = g.add_node();
        for _ in 0..4 {
            let leaf = g.add_node();
            g.add_edge(hub, leaf, 1.0).unwrap();
        }
        let mut scores = betweenness_centrality(&g, Traversal::Undirected);
        assert_eq!(scores[hub], 6.0);
        normalize_betweenness(&mut scores, g.node_count(), Traversal::Undirected);
        assert!((scores[hub] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degree_histogram() {
        let g = weighted_triangle();
        assert_eq!(degree(&g, 0), 2);
        assert_eq!(degree_histogram(&g), vec![0, 0, 3]);
    }

    #[test]
    fn test_reachable_from() {
        let g = two_triangles();
        let mut reach = reachable_from(&g, 3);
        reach.sort_unstable();
        assert_eq!(reach, vec![3, 4, 5]);
    }
}
