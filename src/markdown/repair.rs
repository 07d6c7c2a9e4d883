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

//! Repair of markdown cut off mid-construct.
//!
//! Only the trailing block can be incomplete: inline markers never span a
//! blank line or a fence, so everything before the last block boundary is
//! returned untouched.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Code(usize),
    Strong,
    StrongUnderscore,
    Strike,
    Emphasis,
    EmphasisUnderscore,
}

impl Marker {
    fn closer(self) -> Cow<'static, str> {
        match self {
            Self::Code(n) => Cow::Owned("`".repeat(n)),
            Self::Strong => Cow::Borrowed("**"),
            Self::StrongUnderscore => Cow::Borrowed("__"),
            Self::Strike => Cow::Borrowed("~~"),
            Self::Emphasis => Cow::Borrowed("*"),
            Self::EmphasisUnderscore => Cow::Borrowed("_"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Open {
    marker: Marker,
    run_start: usize,
    content_start: usize,
}

struct BlockScan {
    open_fence: Option<String>,
    tail_start: usize,
}

/// Close whatever the stream left open so partial output renders cleanly.
///
/// Balanced input comes back borrowed and unchanged.
pub fn repair_incomplete(text: &str) -> Cow<'_, str> {
    let scan = scan_blocks(text);
    if let Some(fence) = scan.open_fence {
        let mut out = String::with_capacity(text.len() + fence.len() + 1);
        out.push_str(text);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&fence);
        return Cow::Owned(out);
    }

    let (head, tail) = text.split_at(scan.tail_start);
    match repair_inline(tail) {
        Some(fixed) => Cow::Owned(format!("{head}{fixed}")),
        None => Cow::Borrowed(text),
    }
}

fn scan_blocks(text: &str) -> BlockScan {
    let mut fence: Option<(u8, usize)> = None;
    let mut tail_start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_end = offset + line.len();
        let body = line.trim_end_matches(['\n', '\r']);
        match fence {
            Some((ch, len)) => {
                if let Some((c, n, info)) = fence_marker(body)
                    && c == ch
                    && n >= len
                    && info.trim().is_empty()
                {
                    fence = None;
                    tail_start = line_end;
                }
            }
            None => {
                if let Some((c, n, _)) = fence_marker(body) {
                    fence = Some((c, n));
                } else if body.trim().is_empty() {
                    tail_start = line_end;
                }
            }
        }
        offset = line_end;
    }

    BlockScan {
        open_fence: fence.map(|(ch, n)| char::from(ch).to_string().repeat(n)),
        tail_start,
    }
}

fn fence_marker(line: &str) -> Option<(u8, usize, &str)> {
    let rest = line.trim_start_matches(' ');
    if line.len() - rest.len() > 3 {
        return None;
    }
    let ch = *rest.as_bytes().first()?;
    if ch != b'`' && ch != b'~' {
        return None;
    }
    let n = run_len(rest.as_bytes(), 0, ch);
    if n < 3 {
        return None;
    }
    let info = &rest[n..];
    if ch == b'`' && info.contains('`') {
        return None;
    }
    Some((ch, n, info))
}

fn run_len(bytes: &[u8], start: usize, ch: u8) -> usize {
    bytes[start..].iter().take_while(|b| **b == ch).count()
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn repair_inline(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut stack: Vec<Open> = Vec::new();
    let mut code: Option<Open> = None;
    let mut brackets: Vec<usize> = Vec::new();
    let mut url_start: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'`' {
            let n = run_len(bytes, i, b'`');
            match code {
                Some(open) if open.marker == Marker::Code(n) => code = None,
                Some(_) => {}
                None => {
                    code = Some(Open { marker: Marker::Code(n), run_start: i, content_start: i + n });
                }
            }
            i += n;
            continue;
        }
        if code.is_some() {
            i += 1;
            continue;
        }
        if b == b'\\' {
            i += 2;
            continue;
        }
        if url_start.is_some() {
            if b == b')' {
                url_start = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'[' => {
                brackets.push(i);
                i += 1;
            }
            b']' => {
                if brackets.pop().is_some() && bytes.get(i + 1) == Some(&b'(') {
                    url_start = Some(i);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            b'*' | b'_' | b'~' => {
                let n = run_len(bytes, i, b);
                toggle_delimiter(s, i, n, b, &mut stack);
                i += n;
            }
            _ => i += 1,
        }
    }

    // An unfinished `[label` is hidden until its closing bracket arrives.
    let mut end = s.len();
    if let Some(&first) = brackets.first() {
        end = if first > 0 && bytes[first - 1] == b'!' { first - 1 } else { first };
        stack.retain(|open| open.run_start < end);
        code = code.filter(|open| open.run_start < end);
    }

    // Openers with nothing after them are hidden rather than closed.
    loop {
        if let Some(open) = code {
            if is_blank(&s[open.content_start.min(end)..end]) {
                end = open.run_start;
                code = None;
                continue;
            }
            break;
        }
        match stack.last() {
            Some(open) if is_blank(&s[open.content_start.min(end)..end]) => {
                end = open.run_start;
                stack.pop();
            }
            _ => break,
        }
    }
    let url_open = url_start.is_some_and(|start| start < end);

    if code.is_none() && stack.is_empty() && !url_open && end == s.len() {
        return None;
    }

    let body = &s[..end];
    let trimmed = body.trim_end();
    let mut out = String::with_capacity(s.len() + 8);
    out.push_str(trimmed);
    if let Some(open) = code {
        out.push_str(&open.marker.closer());
    }
    if url_open {
        out.push(')');
    }
    for open in stack.iter().rev() {
        out.push_str(&open.marker.closer());
    }
    out.push_str(&body[trimmed.len()..]);
    Some(out)
}

fn toggle_delimiter(s: &str, start: usize, n: usize, b: u8, stack: &mut Vec<Open>) {
    let before = s[..start].chars().next_back();
    let after = s[start + n..].chars().next();
    // End of input counts as an opener: the rest of the run may still arrive.
    let can_open = after.is_none_or(|c| !c.is_whitespace());
    let can_close = before.is_some_and(|c| !c.is_whitespace());

    // List bullets and thematic breaks are not emphasis.
    if b != b'~' && at_line_start(s, start) && after.is_none_or(char::is_whitespace) {
        return;
    }
    let intraword =
        before.is_some_and(char::is_alphanumeric) && after.is_some_and(char::is_alphanumeric);
    if b == b'_' && intraword {
        return;
    }

    let markers: &[Marker] = match (b, n) {
        (b'*', 1) => &[Marker::Emphasis],
        (b'*', 2) => &[Marker::Strong],
        (b'*', 3) => &[Marker::Strong, Marker::Emphasis],
        (b'_', 1) => &[Marker::EmphasisUnderscore],
        (b'_', 2) => &[Marker::StrongUnderscore],
        (b'_', 3) => &[Marker::StrongUnderscore, Marker::EmphasisUnderscore],
        (b'~', 2) => &[Marker::Strike],
        _ => return,
    };

    // `2*3` is arithmetic unless it closes an earlier `*`.
    if b == b'*' && intraword && !markers.iter().any(|m| stack.iter().any(|open| open.marker == *m)) {
        return;
    }

    for &marker in markers {
        let existing = stack.iter().rposition(|open| open.marker == marker);
        match existing {
            Some(idx) if can_close => {
                stack.remove(idx);
            }
            _ if can_open => stack.push(Open { marker, run_start: start, content_start: start + n }),
            _ => {}
        }
    }
}

fn at_line_start(s: &str, pos: usize) -> bool {
    let line_start = s[..pos].rfind('\n').map_or(0, |i| i + 1);
    s[line_start..pos].bytes().all(|b| b == b' ')
}

#[cfg(test)]
mod tests {
    use super::repair_incomplete;
    use pretty_assertions::assert_eq;
    use std::borrow::Cow;

    fn repaired(text: &str) -> String {
        repair_incomplete(text).into_owned()
    }

    #[test]
    fn closes_unterminated_strong() {
        assert_eq!(repaired("**bo"), "**bo**");
        assert_eq!(repaired("hello __wor"), "hello __wor__");
    }

    #[test]
    fn balanced_input_is_borrowed_unchanged() {
        for text in ["**bold**", "plain text", "a `b` c", "~~x~~ and *y*", "[a](b)", ""] {
            assert!(matches!(repair_incomplete(text), Cow::Borrowed(_)), "{text}");
        }
    }

    #[test]
    fn closes_nested_markers_in_reverse_order() {
        assert_eq!(repaired("**bold *ital"), "**bold *ital***");
        assert_eq!(repaired("***both"), "***both***");
        assert_eq!(repaired("~~gone **now"), "~~gone **now**~~");
    }

    #[test]
    fn closes_inline_code_and_ignores_markers_inside() {
        assert_eq!(repaired("run `cargo **t"), "run `cargo **t`");
        assert_eq!(repaired("``a ` b"), "``a ` b``");
    }

    #[test]
    fn closes_open_fence_without_touching_its_body() {
        assert_eq!(repaired("```rust\nlet x = **y"), "```rust\nlet x = **y\n```");
        assert_eq!(repaired("~~~~\ncode\n"), "~~~~\ncode\n~~~~");
    }

    #[test]
    fn closed_fence_starts_a_fresh_tail() {
        assert_eq!(repaired("```\n**x\n```\nafter *it"), "```\n**x\n```\nafter *it*");
    }

    #[test]
    fn only_the_trailing_block_is_repaired() {
        assert_eq!(repaired("broken **one\n\nsecond *two"), "broken **one\n\nsecond *two*");
    }

    #[test]
    fn hides_unfinished_link_label() {
        assert_eq!(repaired("see [the docs"), "see ");
        assert_eq!(repaired("look ![alt"), "look ");
    }

    #[test]
    fn closes_unfinished_link_target() {
        assert_eq!(repaired("see [docs](http://ex.com/a_b"), "see [docs](http://ex.com/a_b)");
        assert_eq!(repaired("**see [docs](http://x"), "**see [docs](http://x)**");
    }

    #[test]
    fn dangling_openers_are_hidden() {
        assert_eq!(repaired("hello **"), "hello ");
        assert_eq!(repaired("hello *"), "hello ");
        assert_eq!(repaired("**bold** then `"), "**bold** then ");
    }

    #[test]
    fn closers_go_before_trailing_whitespace() {
        assert_eq!(repaired("**bold \n"), "**bold** \n");
    }

    #[test]
    fn leaves_non_emphasis_asterisks_and_underscores_alone() {
        for text in ["2 * 3 = 6", "* item one\n* item two", "snake_case_name", "---", "a \\*b"] {
            assert_eq!(repaired(text), text);
        }
    }

    #[test]
    fn asterisk_between_words_is_not_an_opener() {
        assert_eq!(repaired("2*3=6"), "2*3=6");
        assert_eq!(repaired("x*y and *more"), "x*y and *more*");
        // Still closes an emphasis opened earlier.
        assert_eq!(repaired("*semi*colon and **b"), "*semi*colon and **b**");
    }

    #[test]
    fn repairs_list_item_content() {
        assert_eq!(repaired("* item **two"), "* item **two**");
    }
}
