// Graph model - nodes, edges, adjacency index and the snapshot value type
use ahash::AHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::PathBuf;

use crate::algorithms::{self, Traversal};
use crate::vector::{Point3, Vec3};
use crate::{Error, Result};

pub type NodeId = usize;
pub type EdgeId = usize;
pub type MaterialId = u32;

pub const MATERIAL_DEFAULT: MaterialId = 0;
pub const MATERIAL_SELECTED: MaterialId = 1;

/// Radius reported by [`Graph::locate`] when there is nothing to frame.
pub const DEFAULT_BOUNDING_RADIUS: f64 = 1.0;

/// How a node is drawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Shape,
    Image { path: PathBuf },
}

/// Ordered key/value metadata. Insertion order is preserved and setting an
/// existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the previous value for `key`, if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => Some(std::mem::replace(v, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub position: Point3,
    pub velocity: Vec3,
    pub size: f64,
    pub kind: NodeKind,
    pub label: String,
    pub material: MaterialId,
    pub attributes: Attributes,
}

impl Node {
    #[inline]
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            position: Point3::ZERO,
            velocity: Vec3::ZERO,
            size: 1.0,
            kind: NodeKind::Shape,
            label: String::new(),
            material: MATERIAL_DEFAULT,
            attributes: Attributes::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    pub material: MaterialId,
    pub label: String,
}

impl Edge {
    #[inline]
    #[must_use]
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, weight: f64) -> Self {
        Self {
            id,
            source,
            target,
            weight,
            material: MATERIAL_DEFAULT,
            label: String::new(),
        }
    }

    /// The endpoint opposite `node`, or `None` if `node` is not an endpoint.
    #[inline]
    pub fn opposite(&self, node: NodeId) -> Option<NodeId> {
        if self.source == node {
            Some(self.target)
        } else if self.target == node {
            Some(self.source)
        } else {
            None
        }
    }
}

type EdgeList = SmallVec<[EdgeId; 4]>;

/// The complete graph state: nodes, edges, attributes, adjacency index and
/// the version counter.
///
/// `Graph` is a plain value. Cloning it yields an independent deep copy, which
/// is exactly what a render snapshot is. Shared, concurrently mutated access
/// goes through [`crate::GraphStore`].
///
/// Ids are handed out monotonically and never reused until [`Graph::clear`],
/// so a live node keeps its id for the whole session. Slots of removed nodes
/// and edges stay empty.
#[derive(Debug, Clone)]
pub struct Graph {
    version: u64,
    /// Bumped whenever ids may be handed out again.
    generation: u64,
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    node_count: usize,
    edge_count: usize,
    out_edges: Vec<EdgeList>,
    in_edges: Vec<EdgeList>,
    /// Multiplicity of each directed (source, target) pair.
    pairs: AHashMap<(NodeId, NodeId), u32>,
    /// Component id per node slot, filled in by [`Graph::set_components`] and
    /// dropped by any structural mutation.
    components: Option<Vec<Option<usize>>>,
    attributes: Attributes,
    texture_node_mode: String,
}

const DEFAULT_TEXTURE_NODE_MODE: &str = "rotate";

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            version: 0,
            generation: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
            node_count: 0,
            edge_count: 0,
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            pairs: AHashMap::new(),
            components: None,
            attributes: Attributes::new(),
            texture_node_mode: DEFAULT_TEXTURE_NODE_MODE.to_string(),
        }
    }

    #[inline]
    fn touch(&mut self) {
        self.version += 1;
    }

    /// Monotonic change counter; bumps on every mutation that invalidates
    /// cached render artifacts.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Moves the version strictly past `floor`.
    pub(crate) fn advance_version_past(&mut self, floor: u64) {
        self.version = self.version.max(floor) + 1;
    }

    /// Changes when the graph is cleared or replaced, i.e. whenever an id
    /// seen earlier may now name a different node. Work that captured ids
    /// must not be applied across a generation change.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn advance_generation_past(&mut self, floor: u64) {
        self.generation = self.generation.max(floor) + 1;
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Upper bound (exclusive) of node ids handed out so far. Predecessor
    /// vectors and per-node score vectors are this long.
    #[inline]
    pub fn node_bound(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn contains_node(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id), Some(Some(_)))
    }

    #[inline]
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        matches!(self.edges.get(id), Some(Some(_)))
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    #[inline]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.nodes.get_mut(id).and_then(Option::as_mut) {
            Some(node) => Ok(node),
            None => {
                tracing::debug!(node = id, "invalid node reference");
                Err(Error::NodeNotFound(id))
            }
        }
    }

    fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge> {
        match self.edges.get_mut(id).and_then(Option::as_mut) {
            Some(edge) => Ok(edge),
            None => {
                tracing::debug!(edge = id, "invalid edge reference");
                Err(Error::EdgeNotFound(id))
            }
        }
    }

    /// Live node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes().map(|n| n.id)
    }

    /// Live edge ids in ascending (creation) order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges().map(|e| e.id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter_map(Option::as_ref)
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter_map(Option::as_ref)
    }

    // ---- structural mutation ----

    pub fn add_node(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Some(Node::new(id)));
        self.out_edges.push(EdgeList::new());
        self.in_edges.push(EdgeList::new());
        self.node_count += 1;
        self.invalidate_components();
        self.touch();
        id
    }

    /// Adds a node carrying `label`.
    pub fn add_labeled_node(&mut self, label: impl Into<String>) -> NodeId {
        let id = self.add_node();
        if let Some(Some(node)) = self.nodes.get_mut(id) {
            node.label = label.into();
        }
        id
    }

    /// Adds a directed edge. Parallel edges are allowed.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, weight: f64) -> Result<EdgeId> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight(weight));
        }
        for endpoint in [source, target] {
            if !self.contains_node(endpoint) {
                tracing::debug!(node = endpoint, "edge endpoint does not exist");
                return Err(Error::NodeNotFound(endpoint));
            }
        }

        let id = self.edges.len();
        self.edges.push(Some(Edge::new(id, source, target, weight)));
        self.out_edges[source].push(id);
        self.in_edges[target].push(id);
        *self.pairs.entry((source, target)).or_insert(0) += 1;
        self.edge_count += 1;
        self.invalidate_components();
        self.touch();
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> bool {
        let Some(edge) = self.edges.get_mut(id).and_then(Option::take) else {
            tracing::debug!(edge = id, "remove of unknown edge ignored");
            return false;
        };
        self.unlink_edge(&edge);
        self.invalidate_components();
        self.touch();
        true
    }

    fn unlink_edge(&mut self, edge: &Edge) {
        self.out_edges[edge.source].retain(|e| *e != edge.id);
        self.in_edges[edge.target].retain(|e| *e != edge.id);
        let key = (edge.source, edge.target);
        if let Some(count) = self.pairs.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.pairs.remove(&key);
            }
        }
        self.edge_count -= 1;
    }

    /// Removes the node and every edge incident to it.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.contains_node(id) {
            tracing::debug!(node = id, "remove of unknown node ignored");
            return false;
        }

        let mut incident: Vec<EdgeId> = self.out_edges[id].iter().copied().collect();
        incident.extend(self.in_edges[id].iter().copied());
        incident.sort_unstable();
        incident.dedup();
        for edge_id in incident {
            if let Some(edge) = self.edges[edge_id].take() {
                self.unlink_edge(&edge);
            }
        }

        self.nodes[id] = None;
        self.out_edges[id].clear();
        self.in_edges[id].clear();
        self.node_count -= 1;
        self.invalidate_components();
        self.touch();
        true
    }

    /// Removes every node and edge and resets graph attributes and the
    /// texture-node mode. The version keeps increasing so consumers never
    /// mistake the empty graph for an older state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.out_edges.clear();
        self.in_edges.clear();
        self.pairs.clear();
        self.node_count = 0;
        self.edge_count = 0;
        self.components = None;
        self.attributes = Attributes::new();
        self.texture_node_mode = DEFAULT_TEXTURE_NODE_MODE.to_string();
        self.generation += 1;
        self.touch();
    }

    // ---- positional mutation ----

    pub fn node_position(&self, id: NodeId) -> Option<Point3> {
        self.node(id).map(|n| n.position)
    }

    pub fn set_node_position(&mut self, id: NodeId, position: Point3) -> Result<()> {
        self.node_mut(id)?.position = position;
        self.touch();
        Ok(())
    }

    pub fn set_node_velocity(&mut self, id: NodeId, velocity: Vec3) -> Result<()> {
        self.node_mut(id)?.velocity = velocity;
        Ok(())
    }

    /// Shifts every node by `delta`.
    pub fn move_nodes(&mut self, delta: Vec3) {
        for node in self.nodes.iter_mut().flatten() {
            node.position += delta;
        }
        self.touch();
    }

    /// Scatters every node uniformly inside the cube `[-scale, scale]^3`.
    pub fn randomize_positions(&mut self, scale: f64) {
        let mut rng = rand::rng();
        self.randomize_positions_with(&mut rng, scale);
    }

    pub fn randomize_positions_with<R: Rng>(&mut self, rng: &mut R, scale: f64) {
        let scale = if scale.is_finite() { scale.abs() } else { 0.0 };
        for node in self.nodes.iter_mut().flatten() {
            node.position = if scale > 0.0 {
                Point3::new(
                    rng.random_range(-scale..=scale),
                    rng.random_range(-scale..=scale),
                    rng.random_range(-scale..=scale),
                )
            } else {
                Point3::ZERO
            };
        }
        self.touch();
    }

    /// Zeroes all velocities. Velocities are not rendered, so this does not
    /// bump the version.
    pub fn clear_velocities(&mut self) {
        for node in self.nodes.iter_mut().flatten() {
            node.velocity = Vec3::ZERO;
        }
    }

    /// Writes a batch of layout results. Entries naming nodes that no longer
    /// exist are skipped. Returns how many nodes were updated; the version is
    /// bumped once if any position was written.
    pub fn commit_motion(&mut self, updates: &[(NodeId, Point3, Vec3)]) -> usize {
        let mut written = 0;
        for &(id, position, velocity) in updates {
            if let Some(Some(node)) = self.nodes.get_mut(id) {
                node.position = position;
                node.velocity = velocity;
                written += 1;
            }
        }
        if written > 0 {
            self.touch();
        }
        written
    }

    // ---- attribute mutation ----

    pub fn set_node_label(&mut self, id: NodeId, label: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.label = label.into();
        self.touch();
        Ok(())
    }

    pub fn set_node_size(&mut self, id: NodeId, size: f64) -> Result<()> {
        self.node_mut(id)?.size = size;
        self.touch();
        Ok(())
    }

    pub fn set_node_kind(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        self.node_mut(id)?.kind = kind;
        self.touch();
        Ok(())
    }

    pub fn set_node_material(&mut self, id: NodeId, material: MaterialId) -> Result<()> {
        self.node_mut(id)?.material = material;
        self.touch();
        Ok(())
    }

    pub fn set_node_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.node_mut(id)?.attributes.set(key, value);
        self.touch();
        Ok(())
    }

    pub fn node_attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.node(id).and_then(|n| n.attributes.get(key))
    }

    pub fn set_edge_label(&mut self, id: EdgeId, label: impl Into<String>) -> Result<()> {
        self.edge_mut(id)?.label = label.into();
        self.touch();
        Ok(())
    }

    pub fn set_edge_weight(&mut self, id: EdgeId, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight(weight));
        }
        self.edge_mut(id)?.weight = weight;
        self.touch();
        Ok(())
    }

    pub fn set_edge_material(&mut self, id: EdgeId, material: MaterialId) -> Result<()> {
        self.edge_mut(id)?.material = material;
        self.touch();
        Ok(())
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.set(key, value);
        self.touch();
    }

    /// `"align"` (camera-facing image nodes) or `"rotate"`.
    pub fn texture_node_mode(&self) -> &str {
        &self.texture_node_mode
    }

    pub fn set_texture_node_mode(&mut self, mode: impl Into<String>) {
        self.texture_node_mode = mode.into();
        self.touch();
    }

    // ---- adjacency queries ----

    #[inline]
    pub fn out_edges(&self, id: NodeId) -> &[EdgeId] {
        self.out_edges.get(id).map(|l| l.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn in_edges(&self, id: NodeId) -> &[EdgeId] {
        self.in_edges.get(id).map(|l| l.as_slice()).unwrap_or(&[])
    }

    /// True if at least one directed edge `source -> target` exists.
    #[inline]
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.pairs.contains_key(&(source, target))
    }

    /// True if edges exist in both directions between `a` and `b`.
    #[inline]
    pub fn is_bidirectional(&self, a: NodeId, b: NodeId) -> bool {
        self.has_edge(a, b) && self.has_edge(b, a)
    }

    /// Whether the reverse of this edge also exists.
    pub fn edge_is_bidirectional(&self, id: EdgeId) -> bool {
        self.edge(id)
            .map(|e| self.is_bidirectional(e.source, e.target))
            .unwrap_or(false)
    }

    /// Number of incident edges (in + out). A self-loop counts twice.
    #[inline]
    pub fn node_degree(&self, id: NodeId) -> usize {
        self.out_edges(id).len() + self.in_edges(id).len()
    }

    // ---- geometry ----

    /// Bounding sphere of all node positions: the centroid and the largest
    /// distance from it. Falls back to [`DEFAULT_BOUNDING_RADIUS`] when there
    /// are fewer than two nodes or all nodes coincide.
    pub fn locate(&self) -> (Point3, f64) {
        if self.node_count == 0 {
            return (Point3::ZERO, DEFAULT_BOUNDING_RADIUS);
        }

        let mut sum = Vec3::ZERO;
        for node in self.nodes() {
            sum += node.position;
        }
        let center = sum / self.node_count as f64;
        if self.node_count == 1 || !center.is_finite() {
            let center = if center.is_finite() { center } else { Point3::ZERO };
            return (center, DEFAULT_BOUNDING_RADIUS);
        }

        let radius = self
            .nodes()
            .map(|n| n.position.distance(&center))
            .fold(0.0_f64, f64::max);
        if radius > 0.0 && radius.is_finite() {
            (center, radius)
        } else {
            (center, DEFAULT_BOUNDING_RADIUS)
        }
    }

    // ---- algorithms ----

    #[inline]
    fn invalidate_components(&mut self) {
        self.components = None;
    }

    /// Recomputes and stores the component id of every node.
    pub fn set_components(&mut self) {
        self.components = Some(algorithms::connected_components(self));
        self.touch();
    }

    /// Component id of `id` from the last [`Graph::set_components`], or
    /// `None` once the structure has changed since.
    pub fn node_component(&self, id: NodeId) -> Option<usize> {
        self.components.as_ref()?.get(id).copied().flatten()
    }

    /// Dijkstra from `from`, stopping once `to` is settled. See
    /// [`algorithms::shortest_path`].
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Vec<NodeId> {
        algorithms::shortest_path(self, from, Some(to), Traversal::Undirected)
    }

    pub fn spanning_tree(&self, root: NodeId) -> Vec<NodeId> {
        algorithms::spanning_tree(self, root)
    }

    pub fn betweenness_centrality(&self) -> Vec<f64> {
        algorithms::betweenness_centrality(self, Traversal::Undirected)
    }

    pub fn degree_histogram(&self) -> Vec<usize> {
        algorithms::degree_histogram(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Graph, [NodeId; 3]) {
        let mut g = Graph::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        g.add_edge(a, b, 1.0).unwrap();
        g.add_edge(b, c, 1.0).unwrap();
        g.add_edge(c, a, 1.0).unwrap();
        (g, [a, b, c])
    }

    #[test]
    fn test_add_and_count() {
        let (g, _) = triangle();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.version(), 6);
    }

    #[test]
    fn test_remove_node_cascades() {
        let (mut g, [a, b, c]) = triangle();
        assert!(g.remove_node(b));
        assert_eq!(g.edge_count(), 1);
        assert!(g.edges().all(|e| e.source != b && e.target != b));
        assert!(g.has_edge(c, a));
        assert!(!g.has_edge(a, b));
        assert_eq!(g.node_degree(a), 1);
    }

    #[test]
    fn test_invalid_references_are_noops() {
        let (mut g, [a, _, _]) = triangle();
        let before = g.version();
        assert!(!g.remove_node(42));
        assert!(!g.remove_edge(42));
        assert!(matches!(g.add_edge(a, 42, 1.0), Err(Error::NodeNotFound(42))));
        assert!(g.set_node_position(42, Point3::ZERO).is_err());
        assert_eq!(g.version(), before);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn test_rejects_bad_weight() {
        let (mut g, [a, b, _]) = triangle();
        assert!(matches!(g.add_edge(a, b, -1.0), Err(Error::InvalidWeight(_))));
        assert!(g.add_edge(a, b, f64::NAN).is_err());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut g = Graph::new();
        let a = g.add_node();
        g.remove_node(a);
        let b = g.add_node();
        assert_ne!(a, b);
        assert_eq!(g.node_bound(), 2);
    }

    #[test]
    fn test_bidirectional_and_parallel_edges() {
        let mut g = Graph::new();
        let a = g.add_node();
        let b = g.add_node();
        let e1 = g.add_edge(a, b, 1.0).unwrap();
        let e2 = g.add_edge(a, b, 2.0).unwrap();
        assert!(!g.is_bidirectional(a, b));
        let back = g.add_edge(b, a, 1.0).unwrap();
        assert!(g.edge_is_bidirectional(e1));
        assert!(g.edge_is_bidirectional(back));

        g.remove_edge(e1);
        assert!(g.has_edge(a, b));
        g.remove_edge(e2);
        assert!(!g.has_edge(a, b));
        assert!(!g.edge_is_bidirectional(back));
    }

    #[test]
    fn test_locate_degenerate_cases() {
        let mut g = Graph::new();
        assert_eq!(g.locate(), (Point3::ZERO, DEFAULT_BOUNDING_RADIUS));

        let a = g.add_node();
        g.set_node_position(a, Point3::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(g.locate(), (Point3::new(5.0, 5.0, 5.0), DEFAULT_BOUNDING_RADIUS));

        let b = g.add_node();
        g.set_node_position(b, Point3::new(5.0, 5.0, 5.0)).unwrap();
        assert_eq!(g.locate().1, DEFAULT_BOUNDING_RADIUS);
    }

    #[test]
    fn test_locate_bounding_sphere() {
        let mut g = Graph::new();
        let a = g.add_node();
        let b = g.add_node();
        g.set_node_position(a, Point3::new(-2.0, 0.0, 0.0)).unwrap();
        g.set_node_position(b, Point3::new(4.0, 0.0, 0.0)).unwrap();
        let (center, radius) = g.locate();
        assert_eq!(center, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(radius, 3.0);
    }

    #[test]
    fn test_velocity_clear_does_not_bump_version() {
        let (mut g, [a, _, _]) = triangle();
        g.set_node_velocity(a, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let before = g.version();
        g.clear_velocities();
        assert_eq!(g.version(), before);
        assert_eq!(g.node(a).unwrap().velocity, Vec3::ZERO);
    }

    #[test]
    fn test_clone_is_deep() {
        let (mut g, [a, _, _]) = triangle();
        let snapshot = g.clone();
        g.set_node_label(a, "changed").unwrap();
        g.remove_node(a);
        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(snapshot.node(a).unwrap().label, "");
        assert!(snapshot.version() < g.version());
    }

    #[test]
    fn test_attributes_keep_order() {
        let mut attrs = Attributes::new();
        attrs.set("b", "1");
        attrs.set("a", "2");
        assert_eq!(attrs.set("b", "3"), Some("1".to_string()));
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(attrs.get("b"), Some("3"));
    }

    #[test]
    fn test_components_invalidated_by_structure() {
        let (mut g, [a, _, _]) = triangle();
        g.set_components();
        assert_eq!(g.node_component(a), Some(0));
        g.add_node();
        assert_eq!(g.node_component(a), None);
        g.set_components();
        assert_eq!(g.node_component(a), Some(0));
        g.set_node_position(a, Point3::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(g.node_component(a), Some(0));
    }

    #[test]
    fn test_bulk_insert_keeps_components_stale_until_recomputed() {
        let mut g = Graph::new();
        let mut prev = g.add_node();
        for _ in 0..20_000 {
            let n = g.add_node();
            g.add_edge(prev, n, 1.0).unwrap();
            prev = n;
        }
        assert_eq!(g.node_component(0), None);
        g.set_components();
        assert!(g.node_ids().all(|n| g.node_component(n) == Some(0)));
        g.remove_edge(0);
        assert_eq!(g.node_component(prev), None);
    }

    #[test]
    fn test_clear_resets_texture_node_mode() {
        let (mut g, _) = triangle();
        g.set_texture_node_mode("billboard");
        g.set_attribute("title", "old");
        g.clear();
        assert_eq!(g.texture_node_mode(), "rotate");
        assert!(g.attributes().get("title").is_none());
    }

    #[test]
    fn test_commit_motion_skips_removed_nodes() {
        let (mut g, [a, b, _]) = triangle();
        g.remove_node(b);
        let p = Point3::new(1.0, 2.0, 3.0);
        let written = g.commit_motion(&[(a, p, Vec3::ZERO), (b, p, Vec3::ZERO)]);
        assert_eq!(written, 1);
        assert_eq!(g.node_position(a), Some(p));
        assert!(!g.contains_node(b));
    }
}
