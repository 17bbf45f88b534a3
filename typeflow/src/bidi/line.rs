// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A line cut from a paragraph: trailing whitespace handling, visual runs,
//! and logical↔visual index mappings.

use unicode_bidi::BidiClass;

use super::{
    is_bidi_control, is_trailing_ws_class, BidiError, BidiParagraph, Direction, MarkFlags, NOWHERE,
};

/// One maximal same-level segment of a line, in visual order.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BidiRun {
    /// Byte offset of the run's first logical character, line-relative.
    pub logical_start: usize,
    /// Whether the run's characters display right-to-left.
    pub rtl: bool,
    /// Cumulative visual end of the run, in bytes.
    pub visual_limit: usize,
    /// Positive values hold [`MarkFlags`] bits for inserted marks; negative
    /// values count the UTF-8 bytes of removed bidi controls in the run.
    pub insert_remove: i32,
}

impl BidiRun {
    pub fn mark_flags(&self) -> MarkFlags {
        if self.insert_remove > 0 {
            MarkFlags::from_bits_truncate(self.insert_remove as u8)
        } else {
            MarkFlags::empty()
        }
    }

    fn control_bytes(&self) -> usize {
        (-self.insert_remove).max(0) as usize
    }
}

/// Line-level bidi state for a byte range of a paragraph.
///
/// The levels, classes and text are views into the parent paragraph; the
/// line never mutates them. Trailing whitespace that L1 assigns the
/// paragraph level is represented by `trailing_ws_start` rather than by
/// rewriting the levels.
#[derive(Debug)]
pub struct BidiLine<'a> {
    text: &'a str,
    para_level: u8,
    direction: Direction,
    levels: &'a [u8],
    classes: &'a [BidiClass],
    trailing_ws_start: usize,
    runs: Vec<BidiRun>,
    control_bytes: usize,
    mark_count: usize,
    result_len: usize,
}

impl<'a> BidiLine<'a> {
    pub(super) fn new(
        para: &'a BidiParagraph<'_>,
        start: usize,
        limit: usize,
    ) -> Result<Self, BidiError> {
        let text = para.text();
        if start >= limit
            || limit > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(limit)
        {
            return Err(BidiError::InvalidRange);
        }
        if para.paragraph_index(start) != para.paragraph_index(limit - 1) {
            return Err(BidiError::CrossesParagraph);
        }

        let len = limit - start;
        let mut line = Self {
            text: &text[start..limit],
            para_level: para.para_level_at(start),
            direction: Direction::Mixed,
            levels: &para.levels()[start..limit],
            classes: &para.classes()[start..limit],
            trailing_ws_start: len,
            runs: Vec::new(),
            control_bytes: 0,
            mark_count: 0,
            result_len: len,
        };

        if para.remove_controls() {
            line.control_bytes = line
                .text
                .chars()
                .filter(|c| is_bidi_control(*c))
                .map(char::len_utf8)
                .sum();
            line.result_len -= line.control_bytes;
        }

        if para.direction() != Direction::Mixed {
            // The parent is uniform, so the line is too; its levels are all
            // implicitly at the paragraph level.
            line.direction = para.direction();
            let para_ws = para.trailing_ws_start();
            line.trailing_ws_start = if para_ws <= start {
                0
            } else if para_ws < limit {
                para_ws - start
            } else {
                len
            };
        } else {
            line.set_trailing_ws_start();
            line.recompute_direction();
            match line.direction {
                Direction::Ltr => {
                    line.para_level = (line.para_level + 1) & !1;
                    line.trailing_ws_start = 0;
                }
                Direction::Rtl => {
                    line.para_level |= 1;
                    line.trailing_ws_start = 0;
                }
                Direction::Mixed => {}
            }
        }

        line.compute_runs();
        line.apply_insert_points(para, start, limit);
        line.apply_control_removal(para);
        Ok(line)
    }

    /// L1: start of the trailing run of whitespace and removable codes,
    /// merged with a preceding run already at the paragraph level.
    fn set_trailing_ws_start(&mut self) {
        let len = self.len();
        // A line terminated by a block separator keeps all its levels.
        if self.classes[len - 1] == BidiClass::B {
            self.trailing_ws_start = len;
            return;
        }
        let mut start = len;
        while start > 0 && is_trailing_ws_class(self.classes[start - 1]) {
            start -= 1;
        }
        while start > 0 && self.levels[start - 1] == self.para_level {
            start -= 1;
        }
        self.trailing_ws_start = start;
    }

    fn recompute_direction(&mut self) {
        let len = self.len();
        let ws = self.trailing_ws_start;
        if ws == 0 {
            // All levels are at the paragraph level.
            self.direction = parity_direction(self.para_level);
            return;
        }
        let level = self.levels[0] & 1;
        if ws < len && (self.para_level & 1) != level {
            // The trailing whitespace differs from the first character.
            self.direction = Direction::Mixed;
            return;
        }
        self.direction = if self.levels[1..ws].iter().any(|l| (l & 1) != level) {
            Direction::Mixed
        } else {
            parity_direction(level)
        };
    }

    fn compute_runs(&mut self) {
        let len = self.len();
        if self.direction != Direction::Mixed {
            self.runs = vec![single_run(self.para_level, len)];
            return;
        }

        let limit = self.trailing_ws_start;
        let mut run_starts = Vec::new();
        let mut level = u8::MAX;
        for i in 0..limit {
            if self.levels[i] != level {
                run_starts.push(i);
                level = self.levels[i];
            }
        }

        if run_starts.len() == 1 && limit == len {
            // One non-whitespace run and no trailing whitespace run.
            self.runs = vec![single_run(self.levels[0], len)];
            return;
        }

        // Build the runs in logical order, with lengths in `visual_limit`.
        let mut min_level = u8::MAX;
        let mut max_level = 0;
        let mut runs: Vec<BidiRun> = Vec::with_capacity(run_starts.len() + 1);
        for (i, start) in run_starts.iter().copied().enumerate() {
            let end = run_starts.get(i + 1).copied().unwrap_or(limit);
            let level = self.levels[start];
            min_level = min_level.min(level);
            max_level = max_level.max(level);
            runs.push(BidiRun {
                logical_start: start,
                rtl: false,
                visual_limit: end - start,
                insert_remove: 0,
            });
        }
        if limit < len {
            // The trailing whitespace forms its own run at the paragraph
            // level, which is not reflected in the levels array.
            runs.push(BidiRun {
                logical_start: limit,
                rtl: false,
                visual_limit: len - limit,
                insert_remove: 0,
            });
            min_level = min_level.min(self.para_level);
        }

        self.reorder(&mut runs, min_level, max_level);

        let mut visual_limit = 0;
        for run in &mut runs {
            run.rtl = self.levels[run.logical_start] & 1 != 0;
            visual_limit += run.visual_limit;
            run.visual_limit = visual_limit;
        }
        if limit < len {
            // The trailing whitespace run takes the paragraph direction.
            if let Some(ws_run) = runs.iter_mut().find(|r| r.logical_start == limit) {
                ws_run.rtl = self.para_level & 1 != 0;
            }
        }
        self.runs = runs;
    }

    /// UBA L2 over whole runs. Runs still carry their lengths in
    /// `visual_limit` and sit in logical order.
    fn reorder(&self, runs: &mut [BidiRun], min_level: u8, max_level: u8) {
        if max_level <= (min_level | 1) {
            return;
        }
        // Reorder only down to the lowest odd level; an even lowest level is
        // handled by one final reversal of the entire array instead.
        let min_level = min_level + 1;

        // The trailing whitespace run never participates in the inner
        // passes; it is at the paragraph level, below every reordered one.
        let mut inner_count = runs.len();
        if self.trailing_ws_start < self.len() {
            inner_count -= 1;
        }

        for level in (min_level..max_level).rev() {
            let mut first = 0;
            loop {
                while first < inner_count
                    && self.levels[runs[first].logical_start] < level
                {
                    first += 1;
                }
                if first >= inner_count {
                    break;
                }
                let mut limit = first + 1;
                while limit < inner_count && self.levels[runs[limit].logical_start] >= level {
                    limit += 1;
                }
                runs[first..limit].reverse();
                if limit == inner_count {
                    break;
                }
                first = limit + 1;
            }
        }

        if min_level & 1 == 0 {
            // Lowest level is even: one full reversal, trailing whitespace
            // run included.
            runs.reverse();
        }
    }

    fn apply_insert_points(&mut self, para: &BidiParagraph<'_>, start: usize, limit: usize) {
        for point in para.insert_points() {
            if point.pos < start || point.pos >= limit {
                continue;
            }
            let run = self.run_containing(point.pos - start);
            self.runs[run].insert_remove |= point.flags.bits() as i32;
        }
        self.mark_count = self
            .runs
            .iter()
            .map(|r| {
                let flags = r.mark_flags();
                usize::from(flags.before()) + usize::from(flags.after())
            })
            .sum();
        self.result_len += self.mark_count;
        debug_assert!(
            self.mark_count == 0 || self.control_bytes == 0,
            "inserted marks and control removal are mutually exclusive"
        );
    }

    fn apply_control_removal(&mut self, para: &BidiParagraph<'_>) {
        if !para.remove_controls() || self.control_bytes == 0 {
            return;
        }
        for (i, c) in self.text.char_indices() {
            if is_bidi_control(c) {
                let run = self.run_containing(i);
                self.runs[run].insert_remove -= c.len_utf8() as i32;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Length of the reordered result: the line length minus removed
    /// control bytes plus one slot per inserted mark.
    pub fn result_len(&self) -> usize {
        self.result_len
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn para_level(&self) -> u8 {
        self.para_level
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn trailing_ws_start(&self) -> usize {
        self.trailing_ws_start
    }

    pub fn runs(&self) -> &[BidiRun] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Logical byte range and direction of the visual run at `index`.
    pub fn visual_run(&self, index: usize) -> (core::ops::Range<usize>, bool) {
        let run = &self.runs[index];
        let visual_start = if index == 0 {
            0
        } else {
            self.runs[index - 1].visual_limit
        };
        let length = run.visual_limit - visual_start;
        (run.logical_start..run.logical_start + length, run.rtl)
    }

    /// Level of the character at a byte index: the paragraph level inside
    /// the trailing whitespace or on uniform lines, the resolved level
    /// otherwise.
    pub fn level_at(&self, index: usize) -> u8 {
        if index >= self.len() {
            return 0;
        }
        if self.direction != Direction::Mixed || index >= self.trailing_ws_start {
            self.para_level
        } else {
            self.levels[index]
        }
    }

    /// The per-byte levels with L1 applied: the trailing whitespace reads
    /// as the paragraph level.
    pub fn resolved_levels(&self) -> Vec<u8> {
        let mut levels = self.levels.to_vec();
        for level in &mut levels[self.trailing_ws_start..] {
            *level = self.para_level;
        }
        levels
    }

    /// Maps a logical byte index to its position in visual order, adjusted
    /// for inserted marks and removed controls. An index inside a multi-byte
    /// character is treated as that character. Returns [`NOWHERE`] for
    /// out-of-range indices and for removed controls.
    pub fn visual_index(&self, logical: usize) -> usize {
        if logical >= self.len() {
            return NOWHERE;
        }
        let logical = self.char_start(logical);
        let visual = match self.direction {
            Direction::Ltr => logical,
            Direction::Rtl => self.len() - logical - self.char_len_at(logical),
            Direction::Mixed => {
                let mut found = NOWHERE;
                let mut visual_start = 0;
                for run in &self.runs {
                    let length = run.visual_limit - visual_start;
                    if logical >= run.logical_start && logical < run.logical_start + length {
                        let offset = logical - run.logical_start;
                        found = if run.rtl {
                            visual_start + length - offset - self.char_len_at(logical)
                        } else {
                            visual_start + offset
                        };
                        break;
                    }
                    visual_start = run.visual_limit;
                }
                if found == NOWHERE {
                    return NOWHERE;
                }
                found
            }
        };

        if self.mark_count > 0 {
            // Add the marks inserted before the visual position.
            let mut mark_found = 0;
            for run in &self.runs {
                let flags = run.mark_flags();
                if flags.before() {
                    mark_found += 1;
                }
                if visual < run.visual_limit {
                    return visual + mark_found;
                }
                if flags.after() {
                    mark_found += 1;
                }
            }
            return visual + mark_found;
        }
        if self.control_bytes > 0 {
            if is_bidi_control(self.char_at(logical)) {
                return NOWHERE;
            }
            // Subtract the control bytes that display before the position.
            let mut control_found = 0;
            let mut visual_start = 0;
            for run in &self.runs {
                let length = run.visual_limit - visual_start;
                if visual >= run.visual_limit {
                    control_found += run.control_bytes();
                    visual_start = run.visual_limit;
                    continue;
                }
                if run.insert_remove == 0 {
                    return visual - control_found;
                }
                // Count the controls of this run that are visually before
                // the target: logically before it in an LTR run, logically
                // after it in an RTL run.
                let (scan_start, scan_limit) = if run.rtl {
                    (
                        logical + self.char_len_at(logical),
                        run.logical_start + length,
                    )
                } else {
                    (run.logical_start, logical)
                };
                for c in self.text[scan_start..scan_limit].chars() {
                    if is_bidi_control(c) {
                        control_found += c.len_utf8();
                    }
                }
                return visual - control_found;
            }
        }
        visual
    }

    /// Maps a visual position to the logical byte index of the character
    /// covering it. Returns [`NOWHERE`] for out-of-range positions and for
    /// positions occupied by inserted marks.
    pub fn logical_index(&self, visual: usize) -> usize {
        if visual >= self.result_len {
            return NOWHERE;
        }
        let mut visual = visual;

        if self.mark_count == 0 && self.control_bytes == 0 {
            match self.direction {
                Direction::Ltr => return visual,
                Direction::Rtl => {
                    // The char covering visual byte v contains the mirrored
                    // logical byte.
                    return self.char_start(self.len() - 1 - visual);
                }
                Direction::Mixed => {}
            }
        } else if self.mark_count > 0 {
            // Remove the marks inserted before the position; a position on
            // a mark itself has no logical counterpart.
            let mut mark_found = 0;
            let mut visual_start = 0;
            let mut adjusted = false;
            for run in &self.runs {
                let length = run.visual_limit - visual_start;
                let flags = run.mark_flags();
                if flags.before() {
                    if visual <= visual_start + mark_found {
                        return NOWHERE;
                    }
                    mark_found += 1;
                }
                if visual < run.visual_limit + mark_found {
                    visual -= mark_found;
                    adjusted = true;
                    break;
                }
                if flags.after() {
                    if visual == visual_start + length + mark_found {
                        return NOWHERE;
                    }
                    mark_found += 1;
                }
                visual_start = run.visual_limit;
            }
            if !adjusted {
                return NOWHERE;
            }
        } else {
            // Walk the visual order, skipping removed controls, until the
            // compressed position falls inside a character.
            let mut control_found = 0;
            let mut visual_start = 0;
            let mut resolved = None;
            for run in &self.runs {
                let length = run.visual_limit - visual_start;
                let run_controls = run.control_bytes();
                let compressed_end = run.visual_limit - control_found - run_controls;
                if visual >= compressed_end {
                    control_found += run_controls;
                    visual_start = run.visual_limit;
                    continue;
                }
                if run_controls == 0 {
                    // Adjust back to the raw visual order and fall through
                    // to the run mapping below.
                    visual += control_found;
                    resolved = Some(NOWHERE);
                    break;
                }
                let run_start = run.logical_start;
                let run_end = run_start + length;
                let mut compressed = visual_start - control_found;
                if run.rtl {
                    let mut pos = run_end;
                    while pos > run_start {
                        let start = self.char_start(pos - 1);
                        let c = self.char_at(start);
                        if !is_bidi_control(c) {
                            if visual < compressed + c.len_utf8() {
                                return start;
                            }
                            compressed += c.len_utf8();
                        }
                        pos = start;
                    }
                } else {
                    for (offset, c) in self.text[run_start..run_end].char_indices() {
                        if is_bidi_control(c) {
                            continue;
                        }
                        if visual < compressed + c.len_utf8() {
                            return run_start + offset;
                        }
                        compressed += c.len_utf8();
                    }
                }
                return NOWHERE;
            }
            if resolved.is_none() {
                return NOWHERE;
            }
        }

        // Find the run covering the raw visual index: linear scan for small
        // run counts, binary search beyond that.
        let index = if self.runs.len() <= 10 {
            let mut i = 0;
            while visual >= self.runs[i].visual_limit {
                i += 1;
            }
            i
        } else {
            self.runs.partition_point(|run| run.visual_limit <= visual)
        };
        let run = &self.runs[index];
        let visual_start = if index == 0 {
            0
        } else {
            self.runs[index - 1].visual_limit
        };
        if run.rtl {
            let length = run.visual_limit - visual_start;
            let offset = visual - visual_start;
            self.char_start(run.logical_start + length - 1 - offset)
        } else {
            run.logical_start + (visual - visual_start)
        }
    }

    /// Full logical→visual map, one entry per byte. Bytes of removed
    /// controls map to [`NOWHERE`].
    pub fn logical_map(&self) -> Vec<usize> {
        let mut map = vec![NOWHERE; self.len()];
        for (visual, logical) in self.visual_map().into_iter().enumerate() {
            if logical != NOWHERE {
                map[logical] = visual;
            }
        }
        map
    }

    /// Full visual→logical map, one entry per result position. Positions
    /// holding inserted marks map to [`NOWHERE`].
    pub fn visual_map(&self) -> Vec<usize> {
        let mut map = Vec::with_capacity(self.result_len);
        let skip_controls = self.control_bytes > 0;
        let mut visual_start = 0;
        for run in &self.runs {
            let length = run.visual_limit - visual_start;
            let run_start = run.logical_start;
            let run_end = run_start + length;
            let flags = run.mark_flags();
            if flags.before() {
                map.push(NOWHERE);
            }
            if run.rtl {
                let mut pos = run_end;
                while pos > run_start {
                    let start = self.char_start(pos - 1);
                    let c = self.char_at(start);
                    if !(skip_controls && is_bidi_control(c)) {
                        map.extend(start..start + c.len_utf8());
                    }
                    pos = start;
                }
            } else {
                for (offset, c) in self.text[run_start..run_end].char_indices() {
                    if skip_controls && is_bidi_control(c) {
                        continue;
                    }
                    let start = run_start + offset;
                    map.extend(start..start + c.len_utf8());
                }
            }
            if flags.after() {
                map.push(NOWHERE);
            }
            visual_start = run.visual_limit;
        }
        debug_assert_eq!(map.len(), self.result_len);
        map
    }

    /// Index of the run whose logical range contains `logical`.
    fn run_containing(&self, logical: usize) -> usize {
        let mut visual_start = 0;
        for (i, run) in self.runs.iter().enumerate() {
            let length = run.visual_limit - visual_start;
            if logical >= run.logical_start && logical < run.logical_start + length {
                return i;
            }
            visual_start = run.visual_limit;
        }
        debug_assert!(false, "logical index {logical} outside every run");
        self.runs.len() - 1
    }

    fn char_start(&self, mut index: usize) -> usize {
        while index > 0 && !self.text.is_char_boundary(index) {
            index -= 1;
        }
        index
    }

    fn char_at(&self, index: usize) -> char {
        self.text[index..]
            .chars()
            .next()
            .expect("index is a validated character boundary")
    }

    fn char_len_at(&self, index: usize) -> usize {
        self.char_at(index).len_utf8()
    }
}

fn parity_direction(level: u8) -> Direction {
    if level & 1 != 0 {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}

fn single_run(level: u8, len: usize) -> BidiRun {
    BidiRun {
        logical_start: 0,
        rtl: level & 1 != 0,
        visual_limit: len,
        insert_remove: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidi::BaseDirection;

    fn para(text: &str, base: BaseDirection) -> BidiParagraph<'_> {
        BidiParagraph::new(text, base)
    }

    fn full_line<'a>(p: &'a BidiParagraph<'_>) -> BidiLine<'a> {
        p.line(0, p.len()).unwrap()
    }

    fn run_lengths(line: &BidiLine<'_>) -> Vec<usize> {
        (0..line.run_count())
            .map(|i| line.visual_run(i).0.len())
            .collect()
    }

    #[test]
    fn ascii_line_is_identity() {
        let p = para("Hello", BaseDirection::Auto);
        let line = full_line(&p);
        assert_eq!(line.direction(), Direction::Ltr);
        assert_eq!(line.run_count(), 1);
        assert!(!line.visual_run(0).1);
        for i in 0..5 {
            assert_eq!(line.visual_index(i), i);
            assert_eq!(line.logical_index(i), i);
        }
        assert_eq!(line.logical_map(), vec![0, 1, 2, 3, 4]);
        assert_eq!(line.visual_map(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn mixed_line_reorders_hebrew_run() {
        // abc, three Hebrew letters (2 bytes each), def.
        let text = "abc\u{5D0}\u{5D1}\u{5D2}def";
        let p = para(text, BaseDirection::Auto);
        let line = full_line(&p);
        assert_eq!(line.direction(), Direction::Mixed);
        assert_eq!(line.run_count(), 3);

        let (range0, rtl0) = line.visual_run(0);
        let (range1, rtl1) = line.visual_run(1);
        let (range2, rtl2) = line.visual_run(2);
        assert_eq!((range0, rtl0), (0..3, false));
        assert_eq!((range1, rtl1), (3..9, true));
        assert_eq!((range2, rtl2), (9..12, false));

        // The first Hebrew letter displays at the far end of its run.
        assert_eq!(line.visual_index(3), 7);
        assert_eq!(line.visual_index(7), 3);
        assert_eq!(line.logical_index(3), 7);
        assert_eq!(line.logical_index(7), 3);

        assert_eq!(
            line.visual_map(),
            vec![0, 1, 2, 7, 8, 5, 6, 3, 4, 9, 10, 11]
        );
        // The inverse mapping round-trips every character boundary.
        for i in (0..text.len()).filter(|i| text.is_char_boundary(*i)) {
            assert_eq!(line.logical_index(line.visual_index(i)), i);
        }
    }

    #[test]
    fn run_lengths_sum_to_line_length() {
        for (text, base) in [
            ("Hello", BaseDirection::Auto),
            ("abc\u{5D0}\u{5D1}\u{5D2}def", BaseDirection::Auto),
            ("\u{5D0}ab ", BaseDirection::Rtl),
            ("\u{5D0} 123 \u{5D1}", BaseDirection::Ltr),
        ] {
            let p = para(text, base);
            let line = full_line(&p);
            assert_eq!(run_lengths(&line).iter().sum::<usize>(), line.len());
        }
    }

    #[test]
    fn trailing_whitespace_takes_paragraph_level() {
        // RTL paragraph: Hebrew letter, LTR letters, trailing space.
        let text = "\u{5D0}ab ";
        let p = para(text, BaseDirection::Rtl);
        let line = full_line(&p);
        assert_eq!(line.direction(), Direction::Mixed);
        // Hebrew occupies bytes 0..2, "ab" 2..4, the space byte 4.
        assert_eq!(line.trailing_ws_start(), 4);
        assert_eq!(line.para_level(), 1);
        assert_eq!(line.level_at(2), 2);
        assert_eq!(line.level_at(4), 1);

        // The whitespace run displays at the visual start of the line.
        let (ws_range, _) = line.visual_run(0);
        assert_eq!(ws_range, 4..5);
        let resolved = line.resolved_levels();
        assert_eq!(resolved[4], 1);
    }

    #[test]
    fn pure_rtl_line_reverses_characters() {
        let text = "\u{5D0}\u{5D1}   ";
        let p = para(text, BaseDirection::Rtl);
        let line = full_line(&p);
        // All levels are at the paragraph level, whitespace included, so
        // the line collapses to a single RTL run.
        assert_eq!(line.direction(), Direction::Rtl);
        assert_eq!(line.trailing_ws_start(), 0);
        assert_eq!(line.run_count(), 1);
        // Spaces (logical end) land at the visual start.
        assert_eq!(line.visual_map(), vec![6, 5, 4, 2, 3, 0, 1]);
        assert_eq!(line.visual_index(0), 5);
        assert_eq!(line.logical_index(5), 0);
        for i in (0..text.len()).filter(|i| text.is_char_boundary(*i)) {
            assert_eq!(line.logical_index(line.visual_index(i)), i);
        }
    }

    #[test]
    fn two_level_reorder_keeps_numbers_ltr() {
        // Hebrew, a number, Hebrew in an LTR paragraph: the digits stay
        // left-to-right inside the reversed Hebrew stretch.
        let text = "\u{5D0} 123 \u{5D1}";
        let p = para(text, BaseDirection::Ltr);
        let line = full_line(&p);
        assert_eq!(line.direction(), Direction::Mixed);
        assert_eq!(line.run_count(), 3);
        assert_eq!(line.visual_map(), vec![7, 8, 6, 3, 4, 5, 2, 0, 1]);
        for i in (0..text.len()).filter(|i| text.is_char_boundary(*i)) {
            assert_eq!(line.logical_index(line.visual_index(i)), i);
        }
    }

    #[test]
    fn trailing_ws_reports_para_level_through_level_at() {
        let text = "ab\u{5D0}\u{5D1} ";
        let p = para(text, BaseDirection::Ltr);
        let line = full_line(&p);
        let ws = line.trailing_ws_start();
        assert!(ws < line.len());
        for i in ws..line.len() {
            assert_eq!(line.level_at(i), line.para_level());
        }
    }

    #[test]
    fn removed_controls_map_to_nowhere() {
        let text = "ab\u{200E}cd";
        let mut p = para(text, BaseDirection::Ltr);
        p.set_remove_controls(true);
        let line = full_line(&p);
        assert_eq!(line.result_len(), 4);
        assert_eq!(line.visual_index(0), 0);
        // The LRM occupies bytes 2..5 and disappears from the output.
        assert_eq!(line.visual_index(2), NOWHERE);
        assert_eq!(line.visual_index(5), 2);
        assert_eq!(line.logical_index(2), 5);
        assert_eq!(line.visual_map(), vec![0, 1, 5, 6]);
        assert_eq!(
            line.logical_map(),
            vec![0, 1, NOWHERE, NOWHERE, NOWHERE, 2, 3]
        );
    }

    #[test]
    fn removed_controls_in_rtl_run() {
        let text = "\u{5D0}\u{200F}\u{5D1}";
        let mut p = para(text, BaseDirection::Rtl);
        p.set_remove_controls(true);
        let line = full_line(&p);
        assert_eq!(line.result_len(), 4);
        assert_eq!(line.visual_map(), vec![5, 6, 0, 1]);
        assert_eq!(line.visual_index(0), 2);
        assert_eq!(line.visual_index(5), 0);
        assert_eq!(line.visual_index(2), NOWHERE);
        assert_eq!(line.logical_index(0), 5);
        assert_eq!(line.logical_index(2), 0);
    }

    #[test]
    fn inserted_marks_shift_visual_indices() {
        let text = "abc\u{5D0}\u{5D1}\u{5D2}def";
        let mut p = para(text, BaseDirection::Ltr);
        p.add_insert_point(3, MarkFlags::RLM_BEFORE | MarkFlags::RLM_AFTER);
        let line = full_line(&p);
        assert_eq!(line.result_len(), text.len() + 2);

        // Positions in the leading LTR run are unaffected.
        assert_eq!(line.visual_index(0), 0);
        // The first Hebrew letter moves past the inserted leading mark.
        assert_eq!(line.visual_index(3), 8);
        // Characters after the RTL run see both marks.
        assert_eq!(line.visual_index(9), 11);

        let visual_map = line.visual_map();
        assert_eq!(
            visual_map,
            vec![0, 1, 2, NOWHERE, 7, 8, 5, 6, 3, 4, NOWHERE, 9, 10, 11]
        );
        // Mark slots have no logical counterpart.
        assert_eq!(line.logical_index(3), NOWHERE);
        assert_eq!(line.logical_index(10), NOWHERE);
        assert_eq!(line.logical_index(11), 9);
        // The maps agree with the single-index queries everywhere.
        for (visual, logical) in visual_map.iter().enumerate() {
            if *logical != NOWHERE {
                assert_eq!(line.visual_index(*logical), visual);
            }
        }
    }

    #[test]
    fn sub_line_of_mixed_paragraph() {
        // Cutting just the Hebrew stretch yields a uniform RTL line.
        let text = "abc\u{5D0}\u{5D1}\u{5D2}def";
        let p = para(text, BaseDirection::Auto);
        let line = p.line(3, 9).unwrap();
        assert_eq!(line.direction(), Direction::Rtl);
        assert_eq!(line.run_count(), 1);
        assert_eq!(line.visual_map(), vec![4, 5, 2, 3, 0, 1]);
    }

    #[test]
    fn line_must_stay_inside_one_paragraph() {
        let text = "ab\ncd";
        let p = para(text, BaseDirection::Auto);
        assert_eq!(p.line(1, 4).unwrap_err(), BidiError::CrossesParagraph);
        assert!(p.line(3, 5).is_ok());
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let text = "a\u{5D0}b";
        let p = para(text, BaseDirection::Auto);
        assert_eq!(p.line(2, 2).unwrap_err(), BidiError::InvalidRange);
        assert_eq!(p.line(0, 2).unwrap_err(), BidiError::InvalidRange);
        assert_eq!(p.line(0, 99).unwrap_err(), BidiError::InvalidRange);
    }

    #[test]
    fn override_forces_uniform_direction() {
        let text = "abc\u{5D0}\u{5D1}\u{5D2}";
        let mut p = para(text, BaseDirection::Ltr);
        p.override_direction();
        let line = full_line(&p);
        assert_eq!(line.direction(), Direction::Ltr);
        assert_eq!(line.run_count(), 1);
        for i in (0..text.len()).filter(|i| text.is_char_boundary(*i)) {
            assert_eq!(line.visual_index(i), i);
        }
    }
}
