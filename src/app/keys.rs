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

use super::{App, AppStatus, cancel_stream, new_chat, submit_input, toggle_expanded};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Rows moved by PageUp/PageDown when no frame has been drawn yet.
const FALLBACK_PAGE_ROWS: usize = 10;

fn is_ctrl_shortcut(modifiers: KeyModifiers) -> bool {
    modifiers.contains(KeyModifiers::CONTROL) && !modifiers.contains(KeyModifiers::ALT)
}

fn is_ctrl_char_shortcut(key: KeyEvent, expected: char) -> bool {
    is_ctrl_shortcut(key.modifiers)
        && matches!(key.code, KeyCode::Char(c) if c.eq_ignore_ascii_case(&expected))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn page_rows(app: &App) -> isize {
    use crate::layout::LayoutSurface as _;
    let rows = app
        .layout
        .as_ref()
        .map_or(FALLBACK_PAGE_ROWS, |l| (l.viewport_height() as usize).saturating_sub(2).max(1));
    rows as isize
}

/// Global shortcuts that work regardless of input contents.
fn handle_shortcuts(app: &mut App, key: KeyEvent) -> bool {
    if is_ctrl_char_shortcut(key, 'c') {
        app.should_quit = true;
    } else if is_ctrl_char_shortcut(key, 'n') {
        new_chat(app);
    } else if is_ctrl_char_shortcut(key, 'o') {
        toggle_expanded(app);
    } else if is_ctrl_char_shortcut(key, 'b') {
        let surface = app.layout.as_ref().map(|l| l as &dyn crate::layout::LayoutSurface);
        if let Some(command) = app.scroll.scroll_to_bottom(surface) {
            super::apply_scroll_command(app, command);
        }
        app.auto_scroll = true;
        app.user_scrolled = true;
    } else if is_ctrl_char_shortcut(key, 'l') {
        app.force_redraw = true;
    } else {
        return false;
    }
    true
}

pub(super) fn handle_key(app: &mut App, key: KeyEvent) {
    if handle_shortcuts(app, key) {
        return;
    }
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            if app.status == AppStatus::Streaming {
                cancel_stream(app);
            }
        }
        (KeyCode::Enter, m) if !m.contains(KeyModifiers::SHIFT) && !m.contains(KeyModifiers::ALT) => {
            submit_input(app);
        }
        (KeyCode::Enter, _) => app.input.insert_newline(),

        // Chat scrolling
        (KeyCode::Up, m) if m.contains(KeyModifiers::CONTROL) => app.scroll_by(-1),
        (KeyCode::Down, m) if m.contains(KeyModifiers::CONTROL) => app.scroll_by(1),
        (KeyCode::PageUp, _) => app.scroll_by(-page_rows(app)),
        (KeyCode::PageDown, _) => app.scroll_by(page_rows(app)),

        // Input navigation; Up/Down at the edge scroll the chat instead
        (KeyCode::Left, _) => app.input.move_left(),
        (KeyCode::Right, _) => app.input.move_right(),
        (KeyCode::Up, _) => {
            if !app.input.move_up() {
                app.scroll_by(-1);
            }
        }
        (KeyCode::Down, _) => {
            if !app.input.move_down() {
                app.scroll_by(1);
            }
        }
        (KeyCode::Home, _) => app.input.move_home(),
        (KeyCode::End, _) => app.input.move_end(),

        (KeyCode::Backspace, _) => app.input.delete_char_before(),
        (KeyCode::Delete, _) => app.input.delete_char_after(),
        (KeyCode::Tab, _) => app.input.insert_str("    "),
        (KeyCode::Char(c), m) if !is_ctrl_shortcut(m) => app.input.insert_char(c),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn app() -> App {
        App::new(&AppConfig::default(), None)
    }

    #[test]
    fn typing_and_shift_enter_compose_multiline_text() {
        let mut app = app();
        handle_key(&mut app, key(KeyCode::Char('h'), KeyModifiers::NONE));
        handle_key(&mut app, key(KeyCode::Char('I'), KeyModifiers::SHIFT));
        handle_key(&mut app, key(KeyCode::Enter, KeyModifiers::SHIFT));
        handle_key(&mut app, key(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(app.input.text(), "hI\nx");
    }

    #[test]
    fn ctrl_c_quits_and_is_not_typed() {
        let mut app = app();
        handle_key(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }

    #[test]
    fn ctrl_up_scrolls_chat_without_moving_cursor() {
        let mut app = app();
        app.scroll_target = 5;
        handle_key(&mut app, key(KeyCode::Up, KeyModifiers::CONTROL));
        assert_eq!(app.scroll_target, 4);
        assert!(!app.auto_scroll);
    }

    #[test]
    fn plain_up_on_first_line_scrolls_chat() {
        let mut app = app();
        app.scroll_target = 3;
        handle_key(&mut app, key(KeyCode::Up, KeyModifiers::NONE));
        assert_eq!(app.scroll_target, 2);
    }

    #[test]
    fn page_keys_use_fallback_without_layout() {
        let mut app = app();
        app.scroll_target = 25;
        handle_key(&mut app, key(KeyCode::PageUp, KeyModifiers::NONE));
        assert_eq!(app.scroll_target, 15);
        handle_key(&mut app, key(KeyCode::PageDown, KeyModifiers::NONE));
        assert_eq!(app.scroll_target, 25);
    }

    #[test]
    fn ctrl_b_resumes_following_bottom() {
        let mut app = app();
        app.scroll_by(-3);
        handle_key(&mut app, key(KeyCode::Char('b'), KeyModifiers::CONTROL));
        assert!(app.auto_scroll);
    }

    #[test]
    fn esc_outside_streaming_is_ignored() {
        let mut app = app();
        handle_key(&mut app, key(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(app.status, AppStatus::Ready);
        assert!(app.status_note.is_none());
    }
}
