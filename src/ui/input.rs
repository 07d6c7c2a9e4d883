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

use crate::app::{App, InputState};
use crate::ui::theme;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

/// Horizontal padding to match header/footer inset.
const INPUT_PAD: u16 = 2;

/// Prompt prefix width: "❯ " = 2 columns
const PROMPT_WIDTH: u16 = 2;

const MAX_INPUT_HEIGHT: u16 = 12;

fn content_width(area_width: u16) -> usize {
    usize::from(area_width.saturating_sub(INPUT_PAD * 2).saturating_sub(PROMPT_WIDTH))
}

#[allow(clippy::cast_possible_truncation)]
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let padded = Rect {
        x: area.x + INPUT_PAD,
        y: area.y,
        width: area.width.saturating_sub(INPUT_PAD * 2),
        height: area.height,
    };
    let prompt = || Span::styled(format!("{} ", theme::PROMPT_CHAR), Style::default().fg(theme::ACCENT));

    if app.input.is_empty() && app.input.lines.len() == 1 {
        let placeholder = if app.session.is_streaming() {
            "Streaming reply... (Esc to stop)"
        } else {
            "Type a message..."
        };
        let line = Line::from(vec![prompt(), Span::styled(placeholder, Style::default().fg(theme::DIM))]);
        frame.render_widget(Paragraph::new(line), padded);
        frame.set_cursor_position((padded.x + PROMPT_WIDTH, padded.y));
        return;
    }

    let lines: Vec<Line> = app
        .input
        .lines
        .iter()
        .enumerate()
        .map(|(row, text)| {
            let prefix = if row == 0 { prompt() } else { Span::raw("  ") };
            Line::from(vec![prefix, Span::raw(text.clone())])
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), padded);

    if let Some((col, row)) = cursor_offset(&app.input, content_width(area.width)) {
        let x = padded.x + PROMPT_WIDTH + col as u16;
        let y = padded.y + row as u16;
        if x < padded.right() && y < padded.bottom() {
            frame.set_cursor_position((x, y));
        }
    }
}

/// Cursor position as (column, visual row) relative to the text start.
fn cursor_offset(input: &InputState, width: usize) -> Option<(usize, usize)> {
    if width == 0 {
        return None;
    }
    let rows_above: usize = input.wrapped_rows(width).iter().take(input.cursor_row).sum();
    Some((input.cursor_col % width, rows_above + input.cursor_col / width))
}

/// Rows the input needs at `area_width`, capped so the chat stays visible.
#[allow(clippy::cast_possible_truncation)]
pub fn visual_line_count(app: &App, area_width: u16) -> u16 {
    let width = content_width(area_width);
    let rows: usize = if width == 0 {
        app.input.lines.len()
    } else {
        app.input.wrapped_rows(width).iter().sum()
    };
    (rows.min(usize::from(MAX_INPUT_HEIGHT)) as u16).max(1)
}
