//! # hyphae Layout
//!
//! Background layout computation over a shared [`hyphae_core::GraphStore`].
//!
//! - [`StaticLayout`] - Fruchterman–Reingold, runs to convergence then stops
//! - [`DynamicLayout`] - ARF forces with velocity integration, runs until stopped
//! - [`EdgeBundler`] - force-directed bundling of edge routes
//! - [`LayoutController`] - switches strategies so only one engine writes at a time
//!
//! Every engine iteration copies what it needs out of the store under a brief
//! lock, computes forces without the lock, and commits the new positions
//! under a second brief lock. `stop()` joins the worker thread.
//!
//! ## Example
//!
//! ```rust
//! use hyphae_core::GraphStore;
//! use hyphae_layout::{LayoutController, LayoutKind};
//!
//! let store = GraphStore::shared();
//! let a = store.add_node();
//! let b = store.add_node();
//! store.add_edge(a, b, 1.0).unwrap();
//!
//! let controller = LayoutController::new(store.clone());
//! controller.set_layout_type(LayoutKind::Dynamic);
//! controller.reset_layout();
//! controller.stop_layout();
//! assert!(controller.layout_is_stopped());
//! ```

mod background;
pub mod bundler;
pub mod config;
pub mod controller;
pub mod dynamic_layout;
pub mod engine;
pub mod frame;
pub mod static_layout;

pub use bundler::{EdgeBundler, RouteSet};
pub use config::{ArfParameters, BundlerConfig, FruchtermanReingoldConfig, LayoutConfig};
pub use controller::{LayoutController, ViewFrame};
pub use dynamic_layout::{ArfSimulation, DynamicLayout};
pub use engine::{LayoutEngine, LayoutKind, LayoutSignals, LayoutState};
pub use frame::{LayoutFrame, Spring};
pub use static_layout::{FruchtermanReingold, StaticLayout};
