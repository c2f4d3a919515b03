//! qp-mf library - Manifest Store
//!
//! Tracks scraping and generation progress as a tree of manifest nodes:
//! global → series → season → episode. Only leaves are written by scrapers;
//! every other node's status is derived from its children by a bottom-up fold
//! that is recomputed from the current children on each call.

pub mod aggregate;
pub mod coordinate;
pub mod error;
pub mod node;
pub mod store;

pub use coordinate::{Coordinate, Level};
pub use error::{ManifestError, Result};
pub use node::{ContentRecord, GenerationRecord, ManifestNode, NodeStatus, StatusCounts};
pub use store::ManifestStore;
