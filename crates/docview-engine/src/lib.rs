//! Builds a tree of view nodes from a decorated text document and keeps it
//! up to date with the fewest possible node replacements.
//!
//! A pass runs in two phases: [`ViewTree::update`] rebuilds the changed
//! ranges and reconciles them into the existing tree, then
//! [`ViewTree::sync`] pushes the flagged nodes to a [`HostSync`].

pub mod builder;
pub mod changes;
pub mod composition;
pub mod decoration;
pub mod error;
pub mod host;
pub mod locate;
pub mod options;
mod reconcile;
pub mod text;
pub mod tree;
pub mod view;

// Re-export key types for easier usage
pub use builder::{AdjacencyContext, AdjacencyPolicy, BuiltContent, DefaultAdjacency, NoBuffers};
pub use changes::{ChangedRange, from_delta, map_pos};
pub use composition::{CompositionInput, CompositionState};
pub use decoration::*;
pub use error::BuildError;
pub use host::{HostRecord, HostSync, RecordingHost, SyncReport};
pub use locate::RenderLocation;
pub use options::ViewOptions;
pub use text::TextSource;
pub use tree::{UpdateSummary, ViewTree};
pub use view::{DirtyFlags, HostHandle, NodeId, NodeKind, ViewNode};
pub use xi_rope::Rope;
