// Serializable form of a whole graph, used by archives
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use hyphae_core::{Attributes, Edge, Graph, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DOCUMENT_FORMAT: u32 = 1;

/// Every node, edge and graph attribute of a committed graph.
///
/// Ids in the document are the ids the graph had when it was saved. Loading
/// hands out fresh ids, preserving node and edge order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub format: u32,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub texture_node_mode: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphDocument {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            format: DOCUMENT_FORMAT,
            created_at: Utc::now(),
            version: graph.version(),
            attributes: graph.attributes().clone(),
            texture_node_mode: Some(graph.texture_node_mode().to_string()),
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().cloned().collect(),
        }
    }

    /// Rebuilds a graph. Fails if an edge names a node that is not in the
    /// document.
    pub fn into_graph(self) -> Result<Graph> {
        if self.format != DOCUMENT_FORMAT {
            return Err(anyhow!("unsupported graph document format {}", self.format));
        }

        let mut graph = Graph::new();
        for (key, value) in self.attributes.iter() {
            graph.set_attribute(key, value);
        }
        if let Some(mode) = self.texture_node_mode {
            graph.set_texture_node_mode(mode);
        }

        let mut ids: HashMap<NodeId, NodeId> = HashMap::with_capacity(self.nodes.len());
        for node in self.nodes {
            let id = graph.add_labeled_node(node.label);
            ids.insert(node.id, id);
            graph.set_node_position(id, node.position)?;
            graph.set_node_velocity(id, node.velocity)?;
            graph.set_node_size(id, node.size)?;
            graph.set_node_kind(id, node.kind)?;
            graph.set_node_material(id, node.material)?;
            for (key, value) in node.attributes.iter() {
                graph.set_node_attribute(id, key, value)?;
            }
        }

        for edge in self.edges {
            let (source, target) = match (ids.get(&edge.source), ids.get(&edge.target)) {
                (Some(&s), Some(&t)) => (s, t),
                _ => {
                    return Err(anyhow!(
                        "edge {} references missing node ({} -> {})",
                        edge.id,
                        edge.source,
                        edge.target
                    ))
                }
            };
            let id = graph.add_edge(source, target, edge.weight)?;
            graph.set_edge_material(id, edge.material)?;
            if !edge.label.is_empty() {
                graph.set_edge_label(id, edge.label)?;
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyphae_core::{NodeKind, Point3};

    #[test]
    fn test_document_rebuilds_equivalent_graph() {
        let mut g = Graph::new();
        let a = g.add_labeled_node("a");
        let dead = g.add_node();
        let b = g.add_labeled_node("b");
        g.remove_node(dead);
        g.set_node_position(b, Point3::new(1.0, 2.0, 3.0)).unwrap();
        g.set_node_kind(a, NodeKind::Image { path: "a.png".into() }).unwrap();
        g.set_node_attribute(a, "color", "red").unwrap();
        let e = g.add_edge(a, b, 2.5).unwrap();
        g.set_edge_label(e, "ab").unwrap();
        g.set_attribute("name", "demo");
        g.set_texture_node_mode("align");

        let json = serde_json::to_string(&GraphDocument::from_graph(&g)).unwrap();
        let doc: GraphDocument = serde_json::from_str(&json).unwrap();
        let loaded = doc.into_graph().unwrap();

        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.edge_count(), 1);
        let ids: Vec<_> = loaded.node_ids().collect();
        assert_eq!(loaded.node(ids[0]).unwrap().label, "a");
        assert_eq!(loaded.node_attribute(ids[0], "color"), Some("red"));
        assert_eq!(loaded.node_position(ids[1]), Some(Point3::new(1.0, 2.0, 3.0)));
        assert!(matches!(loaded.node(ids[0]).unwrap().kind, NodeKind::Image { .. }));
        let edge = loaded.edges().next().unwrap();
        assert_eq!((edge.source, edge.target, edge.weight), (ids[0], ids[1], 2.5));
        assert_eq!(edge.label, "ab");
        assert_eq!(loaded.attributes().get("name"), Some("demo"));
        assert_eq!(loaded.texture_node_mode(), "align");
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let mut g = Graph::new();
        let a = g.add_node();
        let b = g.add_node();
        g.add_edge(a, b, 1.0).unwrap();
        let mut doc = GraphDocument::from_graph(&g);
        doc.nodes.pop();
        assert!(doc.into_graph().is_err());
    }
}
