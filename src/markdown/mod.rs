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

mod blocks;
mod repair;

pub use blocks::split_blocks;
pub use repair::repair_incomplete;

/// Accumulates a streamed reply and keeps a renderable version of it.
///
/// The raw buffer only ever grows until [`reset`](Self::reset). Each chunk
/// re-runs the repair pass over the whole buffer, so a marker opened in one
/// chunk and closed in a later one renders exactly as the complete text.
#[derive(Debug, Default)]
pub struct StreamingMarkdownAssembler {
    raw: String,
    blocks: Vec<String>,
    rendered: String,
}

impl StreamingMarkdownAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &str) -> &str {
        if chunk.is_empty() {
            return &self.rendered;
        }
        self.raw.push_str(chunk);
        let repaired = repair_incomplete(&self.raw);
        self.blocks = split_blocks(&repaired);
        self.rendered = self.blocks.concat();
        &self.rendered
    }

    pub fn reset(&mut self) {
        self.raw.clear();
        self.blocks.clear();
        self.rendered.clear();
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    #[must_use]
    pub fn rendered(&self) -> &str {
        &self.rendered
    }
}
