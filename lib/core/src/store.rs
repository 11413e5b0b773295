use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::algorithms::{self, Traversal};
use crate::graph::{EdgeId, Graph, NodeId};
use crate::vector::{Point3, Vec3};
use crate::Result;

/// Shared, mutex-protected graph.
///
/// Single operations lock internally for their own duration. Compound
/// sequences that must be observed atomically (a layout commit, a render
/// snapshot, a generator populating the graph) take [`GraphStore::lock`] and
/// work on the returned guard; the lock is released when the guard drops.
/// The lock is not reentrant: calling a `GraphStore` method while holding a
/// guard from the same store on the same thread deadlocks.
///
/// The version is mirrored into an atomic on every guard release, so
/// [`GraphStore::version`] never blocks.
pub struct GraphStore {
    graph: Mutex<Graph>,
    version: AtomicU64,
}

/// Exclusive access to the graph. Dropping it unlocks the store.
pub struct GraphGuard<'a> {
    graph: MutexGuard<'a, Graph>,
    version: &'a AtomicU64,
}

impl Deref for GraphGuard<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.graph
    }
}

impl DerefMut for GraphGuard<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }
}

impl Drop for GraphGuard<'_> {
    fn drop(&mut self) {
        self.version.fetch_max(self.graph.version(), Ordering::Release);
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::from_graph(Graph::new())
    }

    pub fn from_graph(graph: Graph) -> Self {
        let version = graph.version();
        Self {
            graph: Mutex::new(graph),
            version: AtomicU64::new(version),
        }
    }

    /// Convenience for the common shared-ownership case.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Acquires the store lock.
    #[inline]
    pub fn lock(&self) -> GraphGuard<'_> {
        GraphGuard {
            graph: self.graph.lock(),
            version: &self.version,
        }
    }

    /// Acquires the store lock if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<GraphGuard<'_>> {
        self.graph.try_lock().map(|graph| GraphGuard {
            graph,
            version: &self.version,
        })
    }

    /// Latest committed version. Lock-free.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Deep copy of the entire graph, taken under the lock.
    pub fn snapshot(&self) -> Graph {
        self.lock().clone()
    }

    /// Copies the current graph into `target`. This is the per-frame render
    /// path: the lock is held for the copy only.
    pub fn snapshot_into(&self, target: &mut Graph) {
        let guard = self.lock();
        target.clone_from(&guard);
    }

    /// Replaces the whole graph. The stored version continues past both the
    /// current and the incoming version.
    pub fn replace(&self, mut graph: Graph) {
        let mut guard = self.lock();
        let floor = guard.version().max(graph.version());
        graph.advance_version_past(floor);
        graph.advance_generation_past(guard.generation());
        *guard = graph;
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.lock().node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.lock().edge_count()
    }

    pub fn add_node(&self) -> NodeId {
        self.lock().add_node()
    }

    pub fn add_edge(&self, source: NodeId, target: NodeId, weight: f64) -> Result<EdgeId> {
        self.lock().add_edge(source, target, weight)
    }

    pub fn remove_node(&self, id: NodeId) -> bool {
        self.lock().remove_node(id)
    }

    pub fn remove_edge(&self, id: EdgeId) -> bool {
        self.lock().remove_edge(id)
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    pub fn node_position(&self, id: NodeId) -> Option<Point3> {
        self.lock().node_position(id)
    }

    pub fn set_node_position(&self, id: NodeId, position: Point3) -> Result<()> {
        self.lock().set_node_position(id, position)
    }

    pub fn move_nodes(&self, delta: Vec3) {
        self.lock().move_nodes(delta)
    }

    pub fn randomize_positions(&self, scale: f64) {
        self.lock().randomize_positions(scale)
    }

    pub fn clear_velocities(&self) {
        self.lock().clear_velocities()
    }

    pub fn locate(&self) -> (Point3, f64) {
        self.lock().locate()
    }

    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.lock().has_edge(source, target)
    }

    pub fn node_degree(&self, id: NodeId) -> usize {
        self.lock().node_degree(id)
    }

    pub fn node_component(&self, id: NodeId) -> Option<usize> {
        self.lock().node_component(id)
    }

    /// Recomputes component ids. Union-find is linear, so this runs under the
    /// lock rather than on a snapshot.
    pub fn set_components(&self) {
        self.lock().set_components()
    }

    /// Predecessor vector of the shortest path tree from `from`, searched on a
    /// snapshot.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Vec<NodeId> {
        let snapshot = self.snapshot();
        algorithms::shortest_path(&snapshot, from, Some(to), Traversal::Undirected)
    }

    pub fn spanning_tree(&self, root: NodeId) -> Vec<NodeId> {
        let snapshot = self.snapshot();
        algorithms::spanning_tree(&snapshot, root)
    }

    pub fn betweenness_centrality(&self) -> Vec<f64> {
        let snapshot = self.snapshot();
        algorithms::betweenness_centrality(&snapshot, Traversal::Undirected)
    }
}

impl Clone for GraphStore {
    /// Independent store holding a deep copy of the current graph, version
    /// included.
    fn clone(&self) -> Self {
        Self::from_graph(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_version_mirrors_guard_release() {
        let store = GraphStore::new();
        assert_eq!(store.version(), 0);
        {
            let mut g = store.lock();
            g.add_node();
            g.add_node();
        }
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let store = GraphStore::new();
        let a = store.add_node();
        let b = store.add_node();
        store.add_edge(a, b, 1.0).unwrap();

        let snapshot = store.snapshot();
        store.remove_node(a);
        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.edge_count(), 1);
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_snapshot_into_reuses_target() {
        let store = GraphStore::new();
        store.add_node();
        let mut copy = Graph::new();
        store.snapshot_into(&mut copy);
        assert_eq!(copy.node_count(), 1);
        assert_eq!(copy.version(), store.version());
    }

    #[test]
    fn test_replace_keeps_version_monotonic() {
        let store = GraphStore::new();
        for _ in 0..5 {
            store.add_node();
        }
        let before = store.version();
        let generation = store.lock().generation();
        store.replace(Graph::new());
        assert!(store.version() > before);
        assert!(store.lock().generation() > generation);
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_clone_copies_version() {
        let store = GraphStore::new();
        store.add_node();
        let copy = store.clone();
        assert_eq!(copy.version(), store.version());
        copy.add_node();
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_concurrent_mutation_and_snapshots() {
        let store = Arc::new(GraphStore::new());
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut g = store.lock();
                    let a = g.add_node();
                    let b = g.add_node();
                    g.add_edge(a, b, 1.0).unwrap();
                    if a % 3 == 0 {
                        g.remove_node(a);
                    }
                }
            })
        };

        let mut last = 0;
        for _ in 0..200 {
            let snapshot = store.snapshot();
            assert!(snapshot.version() >= last);
            last = snapshot.version();
            for edge in snapshot.edges() {
                assert!(snapshot.contains_node(edge.source));
                assert!(snapshot.contains_node(edge.target));
            }
        }
        writer.join().unwrap();
    }
}
