//! Random graph generators.
//!
//! Each generator clears the graph it is given and repopulates it. Run them on
//! a [`crate::GraphGuard`] so the whole population is one critical section:
//!
//! ```rust
//! use hyphae_core::{GraphStore, generators::Generator};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let store = GraphStore::new();
//! let mut rng = StdRng::seed_from_u64(7);
//! Generator::ErdosRenyi { nodes: 20, probability: 0.1 }
//!     .populate(&mut store.lock(), &mut rng)
//!     .unwrap();
//! assert_eq!(store.node_count(), 20);
//! ```

use ahash::AHashSet;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, NodeId};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Generator {
    /// G(n, p): every unordered pair is joined with probability `probability`.
    ErdosRenyi { nodes: usize, probability: f64 },
    /// Preferential attachment: each new node links to `edges_per_node`
    /// distinct existing nodes chosen proportionally to their degree.
    BarabasiAlbert { nodes: usize, edges_per_node: usize },
    /// Ring lattice where each node links to its `neighbors` nearest nodes
    /// (`neighbors / 2` per side), then every edge is rewired with
    /// probability `rewire_probability`.
    WattsStrogatz {
        nodes: usize,
        neighbors: usize,
        rewire_probability: f64,
    },
}

impl Generator {
    pub fn validate(&self) -> Result<()> {
        let probability_ok = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        match *self {
            Generator::ErdosRenyi { probability, .. } if !probability_ok(probability) => {
                Err(Error::InvalidConfig(format!(
                    "edge probability must be in [0, 1], got {probability}"
                )))
            }
            Generator::BarabasiAlbert { nodes, edges_per_node } if edges_per_node == 0 || edges_per_node >= nodes.max(1) => {
                Err(Error::InvalidConfig(format!(
                    "edges per node must be in [1, {}), got {edges_per_node}",
                    nodes
                )))
            }
            Generator::WattsStrogatz { nodes, neighbors, rewire_probability } => {
                if !probability_ok(rewire_probability) {
                    return Err(Error::InvalidConfig(format!(
                        "rewire probability must be in [0, 1], got {rewire_probability}"
                    )));
                }
                if neighbors % 2 != 0 || neighbors >= nodes {
                    return Err(Error::InvalidConfig(format!(
                        "neighbors must be even and below the node count, got {neighbors} for {nodes} nodes"
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Clears `graph` and fills it with a freshly generated topology.
    pub fn populate<R: Rng>(&self, graph: &mut Graph, rng: &mut R) -> Result<()> {
        self.validate()?;
        graph.clear();
        match *self {
            Generator::ErdosRenyi { nodes, probability } => erdos_renyi(graph, nodes, probability, rng),
            Generator::BarabasiAlbert { nodes, edges_per_node } => {
                barabasi_albert(graph, nodes, edges_per_node, rng)
            }
            Generator::WattsStrogatz { nodes, neighbors, rewire_probability } => {
                watts_strogatz(graph, nodes, neighbors, rewire_probability, rng)
            }
        }
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            generator = ?self,
            "generated graph"
        );
        Ok(())
    }
}

fn add_nodes(graph: &mut Graph, count: usize) -> Vec<NodeId> {
    (0..count).map(|_| graph.add_node()).collect()
}

fn link(graph: &mut Graph, a: NodeId, b: NodeId) {
    // endpoints were just created, so this cannot fail
    let _ = graph.add_edge(a, b, 1.0);
}

fn erdos_renyi<R: Rng>(graph: &mut Graph, nodes: usize, probability: f64, rng: &mut R) {
    let ids = add_nodes(graph, nodes);
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            if rng.random_bool(probability) {
                link(graph, ids[i], ids[j]);
            }
        }
    }
}

fn barabasi_albert<R: Rng>(graph: &mut Graph, nodes: usize, m: usize, rng: &mut R) {
    let ids = add_nodes(graph, nodes);
    // every endpoint occurrence, so sampling from it is degree-proportional
    let mut endpoints: Vec<NodeId> = Vec::new();

    // seed with a star over the first m + 1 nodes so every node has degree > 0
    let seed = (m + 1).min(ids.len());
    for &node in ids.iter().take(seed).skip(1) {
        link(graph, node, ids[0]);
        endpoints.push(node);
        endpoints.push(ids[0]);
    }

    for &node in ids.iter().skip(seed) {
        let mut targets = AHashSet::with_capacity(m);
        while targets.len() < m {
            if let Some(&candidate) = endpoints.choose(rng) {
                targets.insert(candidate);
            }
        }
        let mut targets: Vec<NodeId> = targets.into_iter().collect();
        targets.sort_unstable();
        for target in targets {
            link(graph, node, target);
            endpoints.push(node);
            endpoints.push(target);
        }
    }
}

fn watts_strogatz<R: Rng>(
    graph: &mut Graph,
    nodes: usize,
    neighbors: usize,
    rewire_probability: f64,
    rng: &mut R,
) {
    let ids = add_nodes(graph, nodes);
    let n = ids.len();
    let mut present: AHashSet<(NodeId, NodeId)> = AHashSet::new();
    let key = |a: NodeId, b: NodeId| if a < b { (a, b) } else { (b, a) };

    let mut lattice = Vec::with_capacity(n * neighbors / 2);
    for i in 0..n {
        for offset in 1..=neighbors / 2 {
            let j = (i + offset) % n;
            lattice.push((i, j));
            present.insert(key(i, j));
        }
    }

    for (i, j) in lattice {
        let mut target = j;
        if rng.random_bool(rewire_probability) {
            // a node already adjacent to everything keeps its lattice edge
            for _ in 0..n {
                let candidate = rng.random_range(0..n);
                if candidate != i && !present.contains(&key(i, candidate)) {
                    present.remove(&key(i, j));
                    present.insert(key(i, candidate));
                    target = candidate;
                    break;
                }
            }
        }
        link(graph, ids[i], ids[target]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{component_count, connected_components};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_erdos_renyi_extremes() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut g = Graph::new();
        Generator::ErdosRenyi { nodes: 10, probability: 1.0 }
            .populate(&mut g, &mut rng)
            .unwrap();
        assert_eq!(g.edge_count(), 45);

        Generator::ErdosRenyi { nodes: 10, probability: 0.0 }
            .populate(&mut g, &mut rng)
            .unwrap();
        assert_eq!(g.node_count(), 10);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_barabasi_albert_edge_count_and_connectivity() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut g = Graph::new();
        Generator::BarabasiAlbert { nodes: 50, edges_per_node: 2 }
            .populate(&mut g, &mut rng)
            .unwrap();
        // star seed over 3 nodes, then 2 edges for each of the other 47
        assert_eq!(g.edge_count(), 2 + 47 * 2);
        assert_eq!(component_count(&connected_components(&g)), 1);
    }

    #[test]
    fn test_watts_strogatz_keeps_edge_count() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut g = Graph::new();
        Generator::WattsStrogatz { nodes: 30, neighbors: 4, rewire_probability: 0.3 }
            .populate(&mut g, &mut rng)
            .unwrap();
        assert_eq!(g.edge_count(), 60);
        assert!(g.edges().all(|e| e.source != e.target));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut g = Graph::new();
        let bad = Generator::WattsStrogatz { nodes: 4, neighbors: 3, rewire_probability: 0.1 };
        assert!(matches!(bad.populate(&mut g, &mut rng), Err(Error::InvalidConfig(_))));
        let bad = Generator::ErdosRenyi { nodes: 4, probability: 2.0 };
        assert!(bad.validate().is_err());
        let bad = Generator::BarabasiAlbert { nodes: 3, edges_per_node: 3 };
        assert!(bad.validate().is_err());
    }
}
