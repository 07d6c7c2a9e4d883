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

use crate::app::{App, AppStatus};
use crate::ui::theme;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

const HEADER_PAD: u16 = 2;

const SPINNER_FRAMES: &[char] = &[
    '\u{280B}', '\u{2819}', '\u{2839}', '\u{2838}', '\u{283C}', '\u{2834}', '\u{2826}', '\u{2827}',
    '\u{2807}', '\u{280F}',
];

pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let padded = Rect {
        x: area.x + HEADER_PAD,
        y: area.y,
        width: area.width.saturating_sub(HEADER_PAD * 2),
        height: area.height,
    };
    frame.render_widget(Paragraph::new(header_line(app)), padded);
}

fn header_line(app: &App) -> Line<'static> {
    let sep = || Span::styled("  \u{2502}  ", Style::default().fg(theme::DIM));
    let model = app.session.model().to_owned();
    let provider =
        app.catalog.models().iter().find(|m| m.id == model).map(|m| m.provider);
    let chat = match app.session.chat_id() {
        Some(id) => id.to_owned(),
        None if app.session.persists() => "new".to_owned(),
        None => "ephemeral".to_owned(),
    };

    let mut spans = vec![
        Span::styled("chatpane", Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD)),
        sep(),
        Span::styled("Model: ", Style::default().fg(theme::DIM)),
        Span::styled(model, Style::default().fg(theme::provider_color(provider))),
        sep(),
        Span::styled("Chat: ", Style::default().fg(theme::DIM)),
        Span::styled(chat, Style::default().fg(Color::White)),
        sep(),
    ];
    spans.push(status_span(app));
    Line::from(spans)
}

fn status_span(app: &App) -> Span<'static> {
    match app.status {
        AppStatus::Ready => Span::styled("ready", Style::default().fg(theme::DIM)),
        AppStatus::Loading => Span::styled("loading chat...", Style::default().fg(theme::STATUS_WARN)),
        AppStatus::Streaming => {
            let ch = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
            Span::styled(format!("{ch} streaming"), Style::default().fg(theme::STATUS_STREAMING))
        }
        AppStatus::Error => Span::styled("error", Style::default().fg(theme::STATUS_ERROR)),
    }
}
