//! # View nodes
//!
//! The typed node tree lives in one [`Nodes`] arena. Nodes reference their
//! children by [`NodeId`] and keep a non-owning parent link for dirty
//! propagation and offset walks.

mod arena;
mod cursor;
mod dump;
mod invariants;
mod node;
mod ops;

pub use arena::Nodes;
pub use cursor::{ChildCursor, child_pos};
pub use node::{DirtyFlags, HostHandle, NodeId, NodeKind, ViewNode};
