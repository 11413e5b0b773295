// Working copy of the fields a layout iteration reads and writes
use ahash::AHashMap;
use hyphae_core::{Graph, NodeId, Point3, Vec3};

/// A spring between two frame indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub weight: f64,
}

/// Positions, velocities and springs copied out of the graph so forces can be
/// computed without holding the store lock.
///
/// Nodes are addressed by dense frame index; `ids[i]` maps back to the graph.
#[derive(Debug, Clone, Default)]
pub struct LayoutFrame {
    pub ids: Vec<NodeId>,
    pub positions: Vec<Point3>,
    pub velocities: Vec<Vec3>,
    pub springs: Vec<Spring>,
    /// Graph version the frame was captured at.
    pub version: u64,
    pub generation: u64,
}

impl LayoutFrame {
    /// Copies the layout-relevant state of `graph`. Self-loops carry no force
    /// and are left out.
    pub fn capture(graph: &Graph) -> Self {
        let mut index_of: AHashMap<NodeId, usize> = AHashMap::with_capacity(graph.node_count());
        let mut ids = Vec::with_capacity(graph.node_count());
        let mut positions = Vec::with_capacity(graph.node_count());
        let mut velocities = Vec::with_capacity(graph.node_count());

        for node in graph.nodes() {
            index_of.insert(node.id, ids.len());
            ids.push(node.id);
            positions.push(node.position);
            velocities.push(node.velocity);
        }

        let springs = graph
            .edges()
            .filter(|e| e.source != e.target)
            .filter_map(|e| {
                Some(Spring {
                    a: *index_of.get(&e.source)?,
                    b: *index_of.get(&e.target)?,
                    weight: e.weight,
                })
            })
            .collect();

        Self {
            ids,
            positions,
            velocities,
            springs,
            version: graph.version(),
            generation: graph.generation(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Writes positions and velocities back. Nodes removed since the capture
    /// are skipped; nodes added since are untouched and join the next frame.
    /// Nothing is written if the graph was cleared or replaced meanwhile.
    pub fn commit(&self, graph: &mut Graph) -> usize {
        if graph.generation() != self.generation {
            tracing::debug!("graph was reset during the iteration, frame dropped");
            return 0;
        }
        let updates: Vec<(NodeId, Point3, Vec3)> = self
            .ids
            .iter()
            .zip(&self.positions)
            .zip(&self.velocities)
            .filter(|((_, p), v)| p.is_finite() && v.is_finite())
            .map(|((&id, &p), &v)| (id, p, v))
            .collect();
        if updates.len() < self.ids.len() {
            tracing::warn!(
                skipped = self.ids.len() - updates.len(),
                "non-finite layout result discarded"
            );
        }
        graph.commit_motion(&updates)
    }

    /// Deterministic unit direction used to push apart two coincident nodes.
    pub fn separation_direction(i: usize, j: usize) -> Vec3 {
        // golden-angle spiral on the unit sphere, keyed by the pair
        let (lo, hi) = (i.min(j), i.max(j));
        let seed = lo.wrapping_mul(31).wrapping_add(hi) as f64;
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        let theta = golden * seed;
        let z = 1.0 - 2.0 * ((seed * 0.618_033_988_75).fract());
        let r = (1.0 - z * z).max(0.0).sqrt();
        let dir = Vec3::new(r * theta.cos(), r * theta.sin(), z);
        if i < j {
            dir
        } else {
            -dir
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_skips_self_loops() {
        let mut g = Graph::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge(a, b, 2.0).unwrap();
        g.add_edge(a, a, 1.0).unwrap();
        let frame = LayoutFrame::capture(&g);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.springs, vec![Spring { a: 0, b: 1, weight: 2.0 }]);
    }

    #[test]
    fn test_commit_skips_removed_and_non_finite() {
        let mut g = Graph::new();
        let a = g.add_node();
        let b = g.add_node();
        let c = g.add_node();
        let mut frame = LayoutFrame::capture(&g);
        frame.positions[0] = Point3::new(1.0, 1.0, 1.0);
        frame.positions[2] = Point3::new(f64::NAN, 0.0, 0.0);
        g.remove_node(b);
        assert_eq!(frame.commit(&mut g), 1);
        assert_eq!(g.node_position(a), Some(Point3::new(1.0, 1.0, 1.0)));
        assert_eq!(g.node_position(c), Some(Point3::ZERO));
    }

    #[test]
    fn test_commit_after_clear_is_dropped() {
        let mut g = Graph::new();
        g.add_node();
        let mut frame = LayoutFrame::capture(&g);
        frame.positions[0] = Point3::new(5.0, 5.0, 5.0);
        g.clear();
        let fresh = g.add_node();
        assert_eq!(frame.commit(&mut g), 0);
        assert_eq!(g.node_position(fresh), Some(Point3::ZERO));
    }

    #[test]
    fn test_separation_direction_is_antisymmetric_unit() {
        let d = LayoutFrame::separation_direction(2, 5);
        let e = LayoutFrame::separation_direction(5, 2);
        assert!((d.length() - 1.0).abs() < 1e-9);
        assert_eq!(d, -e);
    }
}
