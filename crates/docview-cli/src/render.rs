//! Turns the host mirror into terminal lines.
//!
//! Rendering reads only the [`RecordingHost`], never the view tree, so what
//! appears on screen is exactly what the sync phase delivered.

use docview_engine::{HostHandle, HostRecord, RecordingHost};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

pub fn host_lines(host: &RecordingHost, root: HostHandle) -> Vec<Line<'static>> {
    let Some(document) = host.get(root) else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    for &block in &document.children {
        let Some(record) = host.get(block) else {
            continue;
        };
        let mut spans = Vec::new();
        if record.kind == "BlockWidget" {
            spans.push(Span::styled(
                format!("[[{}]]", record.content),
                Style::default().fg(Color::Magenta),
            ));
        } else {
            collect_spans(host, &record.children, Style::default(), &mut spans);
        }
        let line = Line::from(spans);
        lines.push(match &record.class {
            Some(_) => line.style(Style::default().add_modifier(Modifier::BOLD)),
            None => line,
        });
    }
    lines
}

fn collect_spans(
    host: &RecordingHost,
    children: &[HostHandle],
    style: Style,
    spans: &mut Vec<Span<'static>>,
) {
    for &child in children {
        let Some(record) = host.get(child) else {
            continue;
        };
        match record.kind {
            "Text" => spans.push(Span::styled(record.content.clone(), style)),
            "Composition" => spans.push(Span::styled(
                record.content.clone(),
                style.add_modifier(Modifier::UNDERLINED),
            )),
            "Mark" => collect_spans(host, &record.children, style.patch(mark_style(record)), spans),
            "Widget" => spans.push(Span::styled(
                format!("[{}]", record.content),
                style.fg(Color::Cyan),
            )),
            // Buffers only exist for cursor placement.
            _ => {}
        }
    }
}

fn mark_style(record: &HostRecord) -> Style {
    match record.content.as_str() {
        "em" | "i" => Style::default().add_modifier(Modifier::ITALIC),
        "strong" | "b" => Style::default().add_modifier(Modifier::BOLD),
        "code" => Style::default().fg(Color::Yellow),
        _ => Style::default().add_modifier(Modifier::UNDERLINED),
    }
}
