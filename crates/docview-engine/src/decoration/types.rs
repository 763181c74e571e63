use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type Attrs = BTreeMap<String, String>;

/// Merges `source` into `target`. `class` values are space-joined and
/// `style` values `;`-joined; any other attribute is overwritten.
pub fn combine_attrs(source: &Attrs, target: &mut Attrs) {
    for (name, value) in source {
        let joined = match (name.as_str(), target.get(name)) {
            ("class", Some(existing)) => format!("{existing} {value}"),
            ("style", Some(existing)) => format!("{existing};{value}"),
            _ => value.clone(),
        };
        target.insert(name.clone(), joined);
    }
}

/// An inline styling span. Two marks are equal when their tag and
/// attributes are, which is what lets adjacent `Mark` nodes merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkDecoration {
    pub tag: String,
    #[serde(default)]
    pub attributes: Attrs,
    /// Whether text inserted at either edge extends the mark.
    #[serde(default)]
    pub inclusive: bool,
}

impl MarkDecoration {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Attrs::new(),
            inclusive: false,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn inclusive(mut self) -> Self {
        self.inclusive = true;
        self
    }
}

impl PartialEq for MarkDecoration {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.attributes == other.attributes
    }
}

impl Eq for MarkDecoration {}

/// Externally rendered content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub kind: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub editable: bool,
}

impl Widget {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            editable: false,
        }
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    /// Whether the two widgets render the same thing.
    pub fn compare(&self, other: &Widget) -> bool {
        self.kind == other.kind && self.key == other.key
    }
}

/// A replacement of a document range (possibly empty) by a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDecoration {
    pub widget: Widget,
    #[serde(default)]
    pub block: bool,
    #[serde(default)]
    pub start_side: i8,
    #[serde(default)]
    pub end_side: i8,
}

impl PointDecoration {
    /// A zero-width inline widget drawn before (`side < 0`) or after
    /// (`side > 0`) its position.
    pub fn widget(widget: Widget, side: i8) -> Self {
        Self {
            widget,
            block: false,
            start_side: side,
            end_side: side,
        }
    }

    /// An inline widget replacing its range.
    pub fn replace(widget: Widget) -> Self {
        Self {
            widget,
            block: false,
            start_side: 1,
            end_side: -1,
        }
    }

    pub fn block(widget: Widget, start_side: i8, end_side: i8) -> Self {
        Self {
            widget,
            block: true,
            start_side,
            end_side,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDecoration {
    #[serde(default)]
    pub attributes: Attrs,
}

impl LineDecoration {
    pub fn class(class: impl Into<String>) -> Self {
        let mut attributes = Attrs::new();
        attributes.insert("class".into(), class.into());
        Self { attributes }
    }
}

/// What a point event asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoration {
    Replace(PointDecoration),
    Line(LineDecoration),
}

/// Where a decoration came from. Restricted sources may not produce block
/// effects or replace line breaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecorationOrigin {
    #[default]
    Trusted,
    Restricted,
}
