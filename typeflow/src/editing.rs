// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text navigation primitives for the caret model.

use unicode_segmentation::GraphemeCursor;

/// Code points the caret treats as hard line breaks.
pub fn is_line_break(c: char) -> bool {
    matches!(c, '\u{000A}' | '\u{000D}' | '\u{2028}' | '\u{2029}')
}

/// The next grapheme cluster boundary after `index`, if any.
pub fn next_grapheme(text: &str, index: usize) -> Option<usize> {
    if index >= text.len() {
        return None;
    }
    let mut cursor = GraphemeCursor::new(index, text.len(), true);
    cursor.next_boundary(text, 0).ok().flatten()
}

/// The previous grapheme cluster boundary before `index`, if any.
pub fn prev_grapheme(text: &str, index: usize) -> Option<usize> {
    if index == 0 {
        return None;
    }
    let index = index.min(text.len());
    let mut cursor = GraphemeCursor::new(index, text.len(), true);
    cursor.prev_boundary(text, 0).ok().flatten()
}

fn char_at(text: &str, index: usize) -> Option<char> {
    text.get(index..).and_then(|s| s.chars().next())
}

/// Advances by grapheme until a whitespace→non-whitespace transition or a
/// line break character, mirroring caret Ctrl+Right behavior.
pub fn next_word(text: &str, index: usize) -> usize {
    let mut position = index;
    let mut last_whitespace = char_at(text, position).is_some_and(char::is_whitespace);

    while let Some(next) = next_grapheme(text, position) {
        position = next;
        let Some(c) = char_at(text, next) else {
            break;
        };
        let whitespace = c.is_whitespace();
        if (!whitespace && last_whitespace) || is_line_break(c) {
            break;
        }
        last_whitespace = whitespace;
    }

    position
}

/// Retreats by grapheme until a non-whitespace→whitespace transition or a
/// line break character, mirroring caret Ctrl+Left behavior.
///
/// The position just past the cursor counts as whitespace, so a cursor in
/// the middle of a word stops at the word's start.
pub fn prev_word(text: &str, index: usize) -> usize {
    let mut position = index;
    let mut last_whitespace = true;

    while let Some(prev) = prev_grapheme(text, position) {
        let Some(c) = char_at(text, prev) else {
            break;
        };
        let whitespace = c.is_whitespace();
        if whitespace && !last_whitespace {
            break;
        }
        position = prev;
        if is_line_break(c) {
            break;
        }
        last_whitespace = whitespace;
    }

    position
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grapheme_steps_respect_clusters() {
        // "e" followed by a combining acute is one cluster.
        let text = "ae\u{0301}b";
        assert_eq!(next_grapheme(text, 0), Some(1));
        assert_eq!(next_grapheme(text, 1), Some(4));
        assert_eq!(prev_grapheme(text, 4), Some(1));
        assert_eq!(prev_grapheme(text, 1), Some(0));
        assert_eq!(next_grapheme(text, 5), None);
        assert_eq!(prev_grapheme(text, 0), None);
    }

    #[test]
    fn next_word_stops_after_whitespace_runs() {
        let text = "one  two three";
        // From inside "one": skip to the start of "two".
        assert_eq!(next_word(text, 0), 5);
        assert_eq!(next_word(text, 5), 9);
        // From the last word, run to the end of the text.
        assert_eq!(next_word(text, 9), text.len());
    }

    #[test]
    fn next_word_stops_at_line_breaks() {
        let text = "one\ntwo";
        assert_eq!(next_word(text, 0), 3);
        assert_eq!(next_word(text, 3), 4);
    }

    #[test]
    fn prev_word_stops_at_word_starts() {
        let text = "one  two three";
        assert_eq!(prev_word(text, text.len()), 9);
        assert_eq!(prev_word(text, 9), 5);
        // From inside a word, move to its start.
        assert_eq!(prev_word(text, 7), 5);
        assert_eq!(prev_word(text, 5), 0);
        assert_eq!(prev_word(text, 0), 0);
    }

    #[test]
    fn prev_word_stops_at_line_breaks() {
        let text = "one\ntwo";
        assert_eq!(prev_word(text, 5), 4);
        assert_eq!(prev_word(text, 4), 3);
    }
}
