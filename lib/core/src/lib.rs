//! # hyphae Core
//!
//! Core library for the hyphae graph layout engine.
//!
//! This crate provides the shared graph state and the algorithms that run
//! over it:
//!
//! - [`Graph`] - Nodes, edges, attributes and adjacency index; cloning it is a snapshot
//! - [`GraphStore`] - Mutex-protected, versioned graph shared between threads
//! - [`algorithms`] - Shortest path, spanning tree, components, betweenness centrality
//! - [`generators`] - Erdős–Rényi, Barabási–Albert and Watts–Strogatz graphs
//!
//! ## Example
//!
//! ```rust
//! use hyphae_core::{GraphStore, Point3};
//!
//! let store = GraphStore::new();
//! let a = store.add_node();
//! let b = store.add_node();
//! let c = store.add_node();
//! store.add_edge(a, b, 1.0).unwrap();
//! store.add_edge(b, c, 1.0).unwrap();
//! store.add_edge(a, c, 5.0).unwrap();
//! store.set_node_position(a, Point3::new(1.0, 0.0, 0.0)).unwrap();
//!
//! // render path: copy under the lock, draw from the copy
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.version(), store.version());
//!
//! let pred = store.shortest_path(a, c);
//! assert_eq!(hyphae_core::algorithms::path_to(&pred, c), vec![a, b, c]);
//! ```

pub mod algorithms;
pub mod error;
pub mod generators;
pub mod graph;
pub mod store;
pub mod vector;

pub use algorithms::Traversal;
pub use error::{Error, Result};
pub use generators::Generator;
pub use graph::{
    Attributes, Edge, EdgeId, Graph, MaterialId, Node, NodeId, NodeKind, DEFAULT_BOUNDING_RADIUS,
    MATERIAL_DEFAULT, MATERIAL_SELECTED,
};
pub use store::{GraphGuard, GraphStore};
pub use vector::{Point3, Vec3};
