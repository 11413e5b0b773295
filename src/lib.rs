//! # hyphae
//!
//! A concurrent graph store with background force-directed layout, edge
//! bundling and classical graph algorithms.
//!
//! A renderer copies the whole graph out of the store once per frame while
//! layout threads keep relaxing node positions. Every layout iteration
//! commits its result under one brief lock, so a snapshot never holds a
//! half-updated layout.
//!
//! ## Quick Start
//!
//! ```rust
//! use hyphae::prelude::*;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let store = GraphStore::shared();
//! let generator = Generator::BarabasiAlbert { nodes: 50, edges_per_node: 2 };
//! generator.populate(&mut store.lock(), &mut StdRng::seed_from_u64(7)).unwrap();
//!
//! let controller = LayoutController::new(store.clone());
//! controller.set_layout_type(LayoutKind::Dynamic);
//! controller.reset_layout();
//!
//! // render loop: copy out, draw from the copy
//! let frame = store.snapshot();
//! assert_eq!(frame.node_count(), 50);
//!
//! controller.stop_layout();
//! let view = controller.recenter();
//! assert!(view.node_radius > 0.0);
//! ```
//!
//! ## Crate Structure
//!
//! hyphae is composed of several crates:
//!
//! - `hyphae-core` - Graph model, `GraphStore`, algorithms, generators
//! - `hyphae-layout` - Static and dynamic layout engines, edge bundler, controller
//! - `hyphae-storage` - DOT export and checksummed archives
//!
//! ## Features
//!
//! - **Versioned store**: one counter tells consumers when cached render state is stale
//! - **Fruchterman–Reingold**: static layout that converges and stops on its own
//! - **ARF**: continuous layout that follows edits without restarting
//! - **Edge bundling**: routes published atomically per tick
//! - **Algorithms**: Dijkstra, Prim, union-find components, Brandes betweenness

// Re-export core types
pub use hyphae_core::{
    algorithms, generators, Attributes, Edge, EdgeId, Error, Generator, Graph, GraphGuard,
    GraphStore, MaterialId, Node, NodeId, NodeKind, Point3, Result, Traversal, Vec3,
};

// Re-export layout
pub use hyphae_layout::{
    ArfParameters, BundlerConfig, DynamicLayout, EdgeBundler, FruchtermanReingoldConfig,
    LayoutConfig, LayoutController, LayoutEngine, LayoutKind, LayoutSignals, StaticLayout,
    ViewFrame,
};

// Re-export storage
pub use hyphae_storage::{GraphArchive, GraphExport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Error, Generator, Graph, GraphArchive, GraphExport, GraphStore, LayoutConfig,
        LayoutController, LayoutEngine, LayoutKind, NodeId, Point3, Result, Vec3,
    };
}
