use anyhow::{Context, Result};
use docview_engine::{
    DecorationSet, NodeKind, RecordingHost, Rope, SyncReport, TextSource, ViewOptions, ViewTree,
    from_delta,
};
use ratatui::text::Line;
use std::ops::Range;
use std::path::{Path, PathBuf};
use xi_rope::delta::Builder;

use crate::render;

/// An open document, its view tree and the host mirror it is synced into.
pub struct App {
    pub document_path: PathBuf,
    rope: Rope,
    decorations: DecorationSet,
    tree: ViewTree,
    host: RecordingHost,
    cursor: usize,
    pub status: String,
    pub modified: bool,
}

impl App {
    pub fn open(
        document_path: PathBuf,
        decorations_path: Option<&Path>,
        options: ViewOptions,
    ) -> Result<Self> {
        let text = std::fs::read_to_string(&document_path)
            .with_context(|| format!("Failed to read document {}", document_path.display()))?;
        let decorations = match decorations_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read decorations {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Failed to parse decorations {}", path.display()))?
            }
            None => DecorationSet::new(),
        };
        Self::new(document_path, &text, decorations, options)
    }

    pub fn new(
        document_path: PathBuf,
        text: &str,
        decorations: DecorationSet,
        options: ViewOptions,
    ) -> Result<Self> {
        let rope = Rope::from(text);
        let mut tree = ViewTree::new(&rope, &decorations, options)?;
        let mut host = RecordingHost::default();
        let report = tree.sync(&mut host);
        log::info!(
            "opened {} ({} bytes, {} host nodes)",
            document_path.display(),
            rope.len(),
            report.created.len()
        );
        Ok(Self {
            document_path,
            rope,
            decorations,
            tree,
            host,
            cursor: 0,
            status: String::from("ready"),
            modified: false,
        })
    }

    pub fn text(&self) -> String {
        String::from(&self.rope)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert(&mut self, text: &str) -> Result<()> {
        let at = self.cursor;
        self.apply(at..at, text)?;
        self.cursor = at + text.len();
        Ok(())
    }

    pub fn backspace(&mut self) -> Result<()> {
        if let Some(prev) = self.rope.prev_codepoint_offset(self.cursor) {
            let at = self.cursor;
            self.apply(prev..at, "")?;
            self.cursor = prev;
        }
        Ok(())
    }

    pub fn delete_forward(&mut self) -> Result<()> {
        if let Some(next) = self.rope.next_codepoint_offset(self.cursor) {
            let at = self.cursor;
            self.apply(at..next, "")?;
        }
        Ok(())
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.rope.prev_codepoint_offset(self.cursor) {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.rope.next_codepoint_offset(self.cursor) {
            self.cursor = next;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = self.rope.line_start(self.cursor);
    }

    pub fn move_end(&mut self) {
        self.cursor = self.rope.line_end(self.cursor);
    }

    /// Re-reconciles the whole document without changing it.
    pub fn refresh(&mut self) -> Result<()> {
        self.tree
            .refresh(&self.rope, &self.decorations, 0, self.rope.len())?;
        let report = self.tree.sync(&mut self.host);
        self.status = describe("refresh", &report);
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        std::fs::write(&self.document_path, self.text())
            .with_context(|| format!("Failed to write {}", self.document_path.display()))?;
        self.modified = false;
        self.status = format!("saved {}", self.document_path.display());
        Ok(())
    }

    /// Replaces `range` with `text` and runs one update and sync pass.
    fn apply(&mut self, range: Range<usize>, text: &str) -> Result<()> {
        let mut builder = Builder::new(self.rope.len());
        builder.replace(range, Rope::from(text));
        let delta = builder.build();
        let changes = from_delta(&delta);
        let rope = delta.apply(&self.rope);

        let mut decorations = self.decorations.clone();
        decorations.map_changes(&changes);
        let summary = self.tree.update(&rope, &decorations, &changes)?;
        self.rope = rope;
        self.decorations = decorations;

        let report = self.tree.sync(&mut self.host);
        log::debug!("edit {changes:?} rebuilt {:?}", summary.ranges);
        self.status = describe("edit", &report);
        self.modified = true;
        Ok(())
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        match self.tree.nodes()[self.tree.root()].host() {
            Some(root) => render::host_lines(&self.host, root),
            None => Vec::new(),
        }
    }

    /// Where the cursor lands in the view tree.
    pub fn cursor_info(&self) -> String {
        let location = self.tree.locate(self.cursor, 1);
        let node = &self.tree.nodes()[location.node];
        let what = match node.kind() {
            NodeKind::Text { .. } | NodeKind::Composition { .. } => "text",
            NodeKind::Widget { .. } | NodeKind::BlockWidget { .. } => "widget",
            NodeKind::Line { .. } => "empty line",
            other => other.name(),
        };
        format!("pos {} in {what}+{}", self.cursor, location.offset)
    }
}

fn describe(what: &str, report: &SyncReport) -> String {
    format!(
        "{what}: {} created, {} updated, {} relisted, {} released",
        report.created.len(),
        report.updated.len(),
        report.relisted.len(),
        report.released.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docview_engine::MarkDecoration;
    use pretty_assertions::assert_eq;

    fn app(text: &str, decorations: DecorationSet) -> App {
        App::new(PathBuf::from("test.txt"), text, decorations, ViewOptions::default()).unwrap()
    }

    fn screen(app: &App) -> Vec<String> {
        app.lines().iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn typing_updates_the_screen() {
        let mut app = app("ab\ncd", DecorationSet::new());
        app.move_right();
        app.insert("X").unwrap();

        assert_eq!(app.text(), "aXb\ncd");
        assert_eq!(app.cursor(), 2);
        assert_eq!(screen(&app), vec!["aXb", "cd"]);
        assert_eq!(app.status, "edit: 0 created, 1 updated, 0 relisted, 0 released");
        assert!(app.modified);
    }

    #[test]
    fn backspace_at_line_start_joins_lines() {
        let mut app = app("ab\ncd", DecorationSet::new());
        app.move_right();
        app.move_right();
        app.move_right();
        app.backspace().unwrap();

        assert_eq!(app.text(), "abcd");
        assert_eq!(screen(&app), vec!["abcd"]);
    }

    #[test]
    fn enter_splits_a_line() {
        let mut app = app("abcd", DecorationSet::new());
        app.move_end();
        app.move_left();
        app.insert("\n").unwrap();

        assert_eq!(screen(&app), vec!["abc", "d"]);
        assert!(app.cursor_info().starts_with("pos 4 in text"));
    }

    #[test]
    fn decorations_follow_edits() {
        let decorations = DecorationSet::new().mark(2, 4, MarkDecoration::new("em"));
        let mut app = app("a cd e", decorations);
        app.insert("zz").unwrap();

        assert_eq!(app.decorations.marks[0].from, 4);
        assert_eq!(app.decorations.marks[0].to, 6);
        assert_eq!(screen(&app), vec!["zza cd e"]);
    }

    #[test]
    fn refresh_changes_nothing() {
        let mut app = app("ab\ncd", DecorationSet::new());
        app.refresh().unwrap();
        assert_eq!(app.status, "refresh: 0 created, 0 updated, 0 relisted, 0 released");
    }

    #[test]
    fn open_and_save_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let doc = dir.path().join("doc.txt");
        let deco = dir.path().join("doc.toml");
        std::fs::write(&doc, "hello\nworld").unwrap();
        std::fs::write(&deco, "[[marks]]\nfrom = 0\nto = 5\ntag = \"strong\"\n").unwrap();

        let mut app = App::open(doc.clone(), Some(&deco), ViewOptions::default()).unwrap();
        assert_eq!(screen(&app), vec!["hello", "world"]);
        app.move_end();
        app.insert("!").unwrap();
        app.save().unwrap();

        assert_eq!(std::fs::read_to_string(&doc).unwrap(), "hello!\nworld");
        assert!(!app.modified);
    }

    #[test]
    fn missing_document_is_an_error() {
        let err = App::open(PathBuf::from("/nonexistent/doc.txt"), None, ViewOptions::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to read document"));
    }
}
