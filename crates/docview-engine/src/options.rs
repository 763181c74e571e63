use serde::{Deserialize, Serialize};

/// Tunables for building and reconciling the view tree.
///
/// This is the `[view]` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    /// Longest text a `Text` node may grow to by merging.
    pub max_join_len: usize,
    /// Longest run of text the builder puts in one `Text` node.
    pub text_chunk: usize,
    /// Insert cursor landing buffers around non-editable inline widgets.
    pub widget_buffers: bool,
    /// Character an input layer uses in place of line breaks inside a
    /// composition. Compositions containing it are never grafted.
    pub line_break_placeholder: char,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            max_join_len: 256,
            text_chunk: 512,
            widget_buffers: true,
            line_break_placeholder: '\u{FFFF}',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ViewOptions::default();
        assert_eq!(options.max_join_len, 256);
        assert_eq!(options.text_chunk, 512);
        assert!(options.widget_buffers);
        assert_eq!(options.line_break_placeholder, '\u{FFFF}');
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options: ViewOptions = toml::from_str("text_chunk = 64").unwrap();
        assert_eq!(options.text_chunk, 64);
        assert_eq!(options.max_join_len, 256);
        assert!(options.widget_buffers);
    }
}
