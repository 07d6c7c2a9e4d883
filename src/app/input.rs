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

/// Multi-line message composer. Cursor columns count chars, not bytes.
#[derive(Debug)]
pub struct InputState {
    pub lines: Vec<String>,
    pub cursor_row: usize,
    pub cursor_col: usize,
}

impl Default for InputState {
    fn default() -> Self {
        Self { lines: vec![String::new()], cursor_row: 0, cursor_col: 0 }
    }
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(String::is_empty)
    }

    /// Take the composed message, leaving the composer empty.
    ///
    /// Returns `None` (and keeps the text) when it is only whitespace.
    pub fn take_message(&mut self) -> Option<String> {
        let text = self.text();
        if text.trim().is_empty() {
            return None;
        }
        *self = Self::default();
        Some(text)
    }

    fn current_len(&self) -> usize {
        self.lines[self.cursor_row].chars().count()
    }

    fn cursor_byte(&self) -> usize {
        char_to_byte_index(&self.lines[self.cursor_row], self.cursor_col)
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.cursor_byte();
        self.lines[self.cursor_row].insert(at, c);
        self.cursor_col += 1;
    }

    pub fn insert_newline(&mut self) {
        let at = self.cursor_byte();
        let rest = self.lines[self.cursor_row].split_off(at);
        self.cursor_row += 1;
        self.lines.insert(self.cursor_row, rest);
        self.cursor_col = 0;
    }

    /// Insert pasted text; `\r\n` and lone `\r` both count as one line break.
    pub fn insert_str(&mut self, s: &str) {
        let normalized = s.replace("\r\n", "\n").replace('\r', "\n");
        for c in normalized.chars() {
            if c == '\n' {
                self.insert_newline();
            } else {
                self.insert_char(c);
            }
        }
    }

    pub fn delete_char_before(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
            let at = self.cursor_byte();
            self.lines[self.cursor_row].remove(at);
        } else if self.cursor_row > 0 {
            let tail = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.current_len();
            self.lines[self.cursor_row].push_str(&tail);
        }
    }

    pub fn delete_char_after(&mut self) {
        if self.cursor_col < self.current_len() {
            let at = self.cursor_byte();
            self.lines[self.cursor_row].remove(at);
        } else if self.cursor_row + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_row + 1);
            self.lines[self.cursor_row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.current_len();
        }
    }

    pub fn move_right(&mut self) {
        if self.cursor_col < self.current_len() {
            self.cursor_col += 1;
        } else if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = 0;
        }
    }

    /// Returns `false` when already on the first line.
    pub fn move_up(&mut self) -> bool {
        if self.cursor_row == 0 {
            return false;
        }
        self.cursor_row -= 1;
        self.cursor_col = self.cursor_col.min(self.current_len());
        true
    }

    /// Returns `false` when already on the last line.
    pub fn move_down(&mut self) -> bool {
        if self.cursor_row + 1 >= self.lines.len() {
            return false;
        }
        self.cursor_row += 1;
        self.cursor_col = self.cursor_col.min(self.current_len());
        true
    }

    pub fn move_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_col = self.current_len();
    }

    /// Rows each logical line occupies when wrapped at `width` columns.
    #[must_use]
    pub fn wrapped_rows(&self, width: usize) -> Vec<usize> {
        self.lines
            .iter()
            .map(|line| if width == 0 { 1 } else { line.chars().count() / width + 1 })
            .collect()
    }
}

fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}
