// chatpane - A terminal chat client for a local completion backend
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Conversation view. Each frame it lays messages out top to bottom,
//! appends the autoscroll spacer, and publishes the resulting
//! [`FrameLayout`] for the scroll logic to measure.

use super::markdown::{hard_line_breaks, render_markdown_safe};
use crate::app::{App, RenderKey};
use crate::layout::FrameLayout;
use crate::session::{Message, Role};
use crate::ui::theme;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Paragraph, Wrap};

/// User messages longer than this are collapsed until expanded with Ctrl+O.
pub const COLLAPSED_LINES: usize = 12;

const SPINNER_FRAMES: &[char] = &[
    '\u{280B}', '\u{2819}', '\u{2839}', '\u{2838}', '\u{283C}', '\u{2834}', '\u{2826}', '\u{2827}',
    '\u{2807}', '\u{280F}',
];

#[must_use]
pub fn is_collapsible(message: &Message) -> bool {
    message.role == Role::User && message.content.lines().count() > COLLAPSED_LINES
}

/// Wrapped height of `lines` at `width` columns.
fn wrapped_height(lines: &[Line<'static>], width: u16) -> usize {
    Paragraph::new(Text::from(lines.to_vec())).wrap(Wrap { trim: false }).line_count(width)
}

fn render_message(message: &Message, expanded: bool) -> Vec<Line<'static>> {
    let mut out = Vec::new();
    match message.role {
        Role::User => {
            out.push(Line::from(Span::styled(
                "You",
                Style::default().fg(theme::ROLE_USER).add_modifier(Modifier::BOLD),
            )));
            let hidden = if expanded || !is_collapsible(message) {
                0
            } else {
                message.content.lines().count() - COLLAPSED_LINES
            };
            let shown = if hidden == 0 {
                message.content.clone()
            } else {
                message.content.lines().take(COLLAPSED_LINES).collect::<Vec<_>>().join("\n")
            };
            out.extend(render_markdown_safe(&hard_line_breaks(&shown), Some(theme::USER_MSG_BG)));
            if hidden > 0 {
                out.push(Line::from(Span::styled(
                    format!("... {hidden} more lines (Ctrl+O to expand)"),
                    Style::default().fg(theme::DIM),
                )));
            }
        }
        Role::Assistant => {
            out.push(Line::from(Span::styled(
                "Assistant",
                Style::default().fg(theme::ROLE_ASSISTANT).add_modifier(Modifier::BOLD),
            )));
            out.extend(render_markdown_safe(&message.content, None));
        }
    }
    out.push(Line::default());
    out
}

fn thinking_lines(spinner_frame: usize) -> Vec<Line<'static>> {
    let ch = SPINNER_FRAMES[spinner_frame % SPINNER_FRAMES.len()];
    vec![
        Line::from(Span::styled(
            "Assistant",
            Style::default().fg(theme::ROLE_ASSISTANT).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(format!("{ch} Thinking..."), Style::default().fg(theme::DIM))),
        Line::default(),
    ]
}

fn intro_lines(app: &App) -> Vec<Line<'static>> {
    if !app.session.messages().is_empty() {
        return vec![Line::default()];
    }
    let pad = "  ";
    vec![
        Line::default(),
        Line::from(Span::styled(
            format!("{pad}chatpane"),
            Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(vec![
            Span::styled(format!("{pad}Model: "), Style::default().fg(theme::DIM)),
            Span::styled(app.session.model().to_owned(), Style::default().fg(theme::ACCENT)),
        ]),
        Line::from(Span::styled(
            format!("{pad}Backend: {}", app.api.base_url()),
            Style::default().fg(theme::DIM),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!("{pad}Tips: Enter to send, Shift+Enter for newline, Esc to stop a reply, Ctrl+C to quit"),
            Style::default().fg(theme::DIM),
        )),
        Line::default(),
    ]
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn render(frame: &mut Frame, area: Rect, app: &mut App) {
    let width = area.width;
    let mut all_lines = intro_lines(app);
    let list_offset = wrapped_height(&all_lines, width);
    let mut builder = FrameLayout::builder(f64::from(area.height), list_offset as f64);

    let App { session, handles, render_cache, expanded, spinner_frame, .. } = &mut *app;
    for message in session.messages() {
        let handle = handles.handle_for(&message.id);
        let height = if message.content.is_empty() && session.streaming().is_streaming(&message.id) {
            // Spinner changes every frame; not worth caching.
            let lines = thinking_lines(*spinner_frame);
            let height = wrapped_height(&lines, width);
            all_lines.extend(lines);
            height
        } else {
            let is_expanded = expanded.contains(&message.id);
            let key = RenderKey::new(&message.content, width, is_expanded);
            if let Some((lines, height)) = render_cache.get(&message.id, &key) {
                all_lines.extend_from_slice(lines);
                height
            } else {
                let lines = render_message(message, is_expanded);
                let height = wrapped_height(&lines, width);
                all_lines.extend_from_slice(&lines);
                render_cache.store(&message.id, key, lines, height);
                height
            }
        };
        builder = builder.element(handle, height as f64);
    }
    let live = || session.messages().iter().map(|m| m.id.as_str());
    handles.retain(live());
    render_cache.retain(live());

    let spacer_rows = app.scroll.spacer_height().max(0.0).round() as usize;
    all_lines.extend(std::iter::repeat_n(Line::default(), spacer_rows));
    let mut layout = builder.padding(spacer_rows as f64).build();

    // Ease the rendered offset toward the target.
    let max_scroll = layout.max_scroll() as usize;
    if app.auto_scroll {
        app.scroll_target = max_scroll;
    }
    app.scroll_target = app.scroll_target.min(max_scroll);
    let target = app.scroll_target as f32;
    let delta = target - app.scroll_pos;
    if delta.abs() < 0.01 {
        app.scroll_pos = target;
    } else {
        app.scroll_pos += delta * 0.5;
    }
    app.scroll_offset = (app.scroll_pos.round() as usize).min(max_scroll);
    if app.scroll_offset >= max_scroll && !app.scroll.state().has_submitted {
        app.auto_scroll = true;
    }
    layout.set_scroll_top(app.scroll_offset as f64);
    app.layout = Some(layout);

    let offset = u16::try_from(app.scroll_offset).unwrap_or(u16::MAX);
    let paragraph = Paragraph::new(Text::from(all_lines)).wrap(Wrap { trim: false });
    frame.render_widget(paragraph.scroll((offset, 0)), area);

    if app.scroll.show_scroll_to_bottom() && area.height > 0 {
        let marker_area = Rect { y: area.bottom() - 1, height: 1, ..area };
        let marker = Line::from(Span::styled(
            "\u{2193} new content (Ctrl+B) ",
            Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(Paragraph::new(marker).alignment(Alignment::Right), marker_area);
    }
}
