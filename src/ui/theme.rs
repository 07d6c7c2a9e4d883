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

use crate::api::types::Provider;
use ratatui::style::Color;

// Accent
pub const ACCENT: Color = Color::Rgb(86, 156, 214);

// UI chrome
pub const DIM: Color = Color::DarkGray;
pub const PROMPT_CHAR: &str = "❯";
pub const SEPARATOR_CHAR: &str = "─";

// Role header colors
pub const ROLE_USER: Color = Color::Gray;
pub const ROLE_ASSISTANT: Color = ACCENT;

pub const USER_MSG_BG: Color = Color::Rgb(40, 44, 52);

// Status colors
pub const STATUS_STREAMING: Color = Color::Cyan;
pub const STATUS_ERROR: Color = Color::Red;
pub const STATUS_WARN: Color = Color::Yellow;

/// Color for a model, by the provider serving it.
pub fn provider_color(provider: Option<Provider>) -> Color {
    match provider {
        Some(Provider::Ollama) => Color::Green,
        Some(Provider::Openai) => Color::Magenta,
        Some(Provider::Anthropic) => Color::Rgb(217, 119, 87),
        Some(Provider::Google) => Color::Blue,
        Some(Provider::Groq) => Color::Yellow,
        Some(Provider::Unknown) | None => Color::White,
    }
}
