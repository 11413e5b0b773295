//! # hyphae Storage
//!
//! Getting graphs out of the process: DOT export through [`GraphExport`] and
//! gzip-compressed, SHA-256 checksummed JSON archives through
//! [`GraphArchive`]. Both write from a snapshot of committed state.

pub mod archive;
pub mod document;
pub mod dot;

pub use archive::{ArchiveDescription, GraphArchive};
pub use document::GraphDocument;
pub use dot::{from_dot, to_dot, GraphExport};
