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

//! Line-oriented event protocol spoken by the chat backend.
//!
//! The body is plain text split on `\n`. `event: <type>` lines declare the
//! type of the next data line; `data: <payload>` lines carry either the
//! `[DONE]` sentinel or a JSON object `{content?, chat_id?}`.

use serde::Deserialize;

pub const EVENT_PREFIX: &str = "event: ";
pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";
pub const CHAT_CREATED_EVENT: &str = "chat_created";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Created { chat_id: String },
    Delta { text: String },
    Done,
}

#[derive(Debug, Default, Deserialize)]
struct DataPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    chat_id: Option<String>,
}

/// Reassembles text lines from arbitrarily split byte chunks.
///
/// Splitting happens on raw bytes, so a multi-byte UTF-8 sequence cut in half
/// by the network is only decoded once its line is complete.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            lines.push(decode_line(line));
        }
        lines
    }

    /// Flush a final unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(decode_line(std::mem::take(&mut self.pending)))
    }
}

fn decode_line(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!("stream line is not valid UTF-8; decoding lossily");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

/// Tracks the declared event type across lines and turns data lines into
/// [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct EventParser {
    event_type: String,
}

impl EventParser {
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn parse_line(&mut self, line: &str) -> Option<StreamEvent> {
        if let Some(kind) = line.strip_prefix(EVENT_PREFIX) {
            kind.trim().clone_into(&mut self.event_type);
            return None;
        }
        let data = line.strip_prefix(DATA_PREFIX)?;
        if data.trim_end() == DONE_SENTINEL {
            return Some(StreamEvent::Done);
        }

        let payload: DataPayload = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!("discarding malformed stream payload: {err}");
                return None;
            }
        };

        if self.event_type == CHAT_CREATED_EVENT
            && let Some(chat_id) = payload.chat_id
        {
            self.event_type.clear();
            return Some(StreamEvent::Created { chat_id });
        }
        payload.content.filter(|text| !text.is_empty()).map(|text| StreamEvent::Delta { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_all(parser: &mut EventParser, text: &str) -> Vec<StreamEvent> {
        text.lines().filter_map(|line| parser.parse_line(line)).collect()
    }

    #[test]
    fn chat_created_fires_once_then_content_is_a_chunk() {
        let mut parser = EventParser::default();
        let events = parse_all(
            &mut parser,
            "event: chat_created\ndata: {\"chat_id\":\"abc\"}\n\ndata: {\"content\":\"hi\"}\n",
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Created { chat_id: "abc".to_owned() },
                StreamEvent::Delta { text: "hi".to_owned() },
            ]
        );
        assert_eq!(parser.event_type(), "");
    }

    #[test]
    fn chat_id_without_created_event_is_ignored() {
        let mut parser = EventParser::default();
        let events = parse_all(&mut parser, "data: {\"chat_id\":\"abc\"}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn created_event_without_chat_id_forwards_content() {
        let mut parser = EventParser::default();
        let events = parse_all(&mut parser, "event: chat_created\ndata: {\"content\":\"x\"}\n");
        assert_eq!(events, vec![StreamEvent::Delta { text: "x".to_owned() }]);
        assert_eq!(parser.event_type(), CHAT_CREATED_EVENT);
    }

    #[test]
    fn done_sentinel_is_recognized() {
        let mut parser = EventParser::default();
        assert_eq!(parser.parse_line("data: [DONE]"), Some(StreamEvent::Done));
    }

    #[test]
    fn malformed_json_is_discarded() {
        let mut parser = EventParser::default();
        assert_eq!(parser.parse_line("data: {\"content\": \"unterminated"), None);
        assert_eq!(parser.parse_line("data: 42"), None);
        assert_eq!(
            parser.parse_line("data: {\"content\":\"after\"}"),
            Some(StreamEvent::Delta { text: "after".to_owned() })
        );
    }

    #[test]
    fn empty_content_and_unknown_lines_produce_nothing() {
        let mut parser = EventParser::default();
        assert_eq!(parser.parse_line("data: {\"content\":\"\"}"), None);
        assert_eq!(parser.parse_line(": keep-alive"), None);
        assert_eq!(parser.parse_line(""), None);
    }

    #[test]
    fn decoder_reassembles_lines_split_across_chunks() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"data: {\"con").is_empty());
        let lines = decoder.push(b"tent\":\"hi\"}\r\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"content\":\"hi\"}".to_owned()]);
        assert_eq!(decoder.push(b"NE]\n"), vec!["data: [DONE]".to_owned()]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_keeps_multibyte_sequences_split_by_the_network() {
        let mut decoder = LineDecoder::default();
        let text = "data: {\"content\":\"héllo\"}\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).expect("é lead byte") + 1;
        assert!(decoder.push(&text[..split]).is_empty());
        let lines = decoder.push(&text[split..]);
        assert_eq!(lines, vec!["data: {\"content\":\"héllo\"}".to_owned()]);
    }

    #[test]
    fn decoder_flushes_trailing_line_without_newline() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("data: [DONE]"));
    }
}
