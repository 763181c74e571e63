use bitflags::bitflags;
use slotmap::new_key_type;

use crate::decoration::{Attrs, MarkDecoration, Widget};

new_key_type! {
    /// Stable handle of a node in the view arena.
    pub struct NodeId;
}

/// Opaque id of the external render node a view node is synced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

bitflags! {
    /// What the sync phase has to look at.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u8 {
        /// Some descendant needs syncing.
        const CHILD_LIST = 1;
        /// The node's own content or child list changed.
        const SELF = 1 << 1;
        /// Line attributes changed.
        const ATTRIBUTES = 1 << 2;
        /// Part of a live composition. Frozen leaves are not diffed or updated.
        const COMPOSITION = 1 << 3;

        const DIRTY = Self::CHILD_LIST.bits() | Self::SELF.bits() | Self::ATTRIBUTES.bits();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root of the tree; children are blocks.
    Document,
    /// One visual line of inline content.
    Line { attrs: Attrs },
    /// A block-level replacement.
    BlockWidget {
        widget: Widget,
        start_side: i8,
        end_side: i8,
    },
    Mark { mark: MarkDecoration },
    Text { text: String },
    /// Inline replacement. `side` is only meaningful when the length is zero.
    Widget { widget: Widget, side: i8 },
    /// Zero-length cursor landing spot: `-1` before its widget, `1` after.
    WidgetBuffer { side: i8 },
    /// Frozen mirror of text being composed by an input method.
    Composition { text: String },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "Document",
            NodeKind::Line { .. } => "Line",
            NodeKind::BlockWidget { .. } => "BlockWidget",
            NodeKind::Mark { .. } => "Mark",
            NodeKind::Text { .. } => "Text",
            NodeKind::Widget { .. } => "Widget",
            NodeKind::WidgetBuffer { .. } => "WidgetBuffer",
            NodeKind::Composition { .. } => "Composition",
        }
    }

    /// Nodes that own children.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Document | NodeKind::Line { .. } | NodeKind::Mark { .. }
        )
    }

    pub fn is_block(&self) -> bool {
        matches!(self, NodeKind::Line { .. } | NodeKind::BlockWidget { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ViewNode {
    pub(crate) kind: NodeKind,
    pub(crate) length: usize,
    pub(crate) break_after: bool,
    pub(crate) flags: DirtyFlags,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) host: Option<HostHandle>,
}

impl ViewNode {
    pub(crate) fn new(kind: NodeKind, length: usize) -> Self {
        Self {
            kind,
            length,
            break_after: false,
            flags: DirtyFlags::SELF,
            children: Vec::new(),
            parent: None,
            host: None,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Document positions covered, excluding the line break after it.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn break_after(&self) -> bool {
        self.break_after
    }

    /// Length plus the trailing line break.
    pub fn extent(&self) -> usize {
        self.length + usize::from(self.break_after)
    }

    pub fn flags(&self) -> DirtyFlags {
        self.flags
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.intersects(DirtyFlags::DIRTY)
    }

    pub fn is_frozen(&self) -> bool {
        self.flags.contains(DirtyFlags::COMPOSITION)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn host(&self) -> Option<HostHandle> {
        self.host
    }

    /// The text of a `Text` or `Composition` leaf.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text { text } | NodeKind::Composition { text } => Some(text),
            _ => None,
        }
    }
}
