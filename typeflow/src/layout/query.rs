// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Queries over a built layout: caret mapping, hit testing, and per-line
//! accessors.

use super::{LineInfo, ParagraphLayout};
use crate::cursor::{Affinity, CaretPixel, CursorPosition};
use crate::style::TextXAlign;

impl ParagraphLayout {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Index of the first run of a line.
    pub fn first_run_index(&self, line_index: usize) -> usize {
        if line_index == 0 {
            0
        } else {
            self.lines[line_index - 1].runs_end as usize
        }
    }

    /// Index of the first glyph of a run.
    pub fn first_glyph_index(&self, run_index: usize) -> usize {
        if run_index == 0 {
            0
        } else {
            self.runs[run_index - 1].glyph_end as usize
        }
    }

    /// Index into `positions` of a run's first pen position. Each run owns
    /// `2 × (glyph count + 1)` entries.
    pub fn first_position_index(&self, run_index: usize) -> usize {
        if run_index == 0 {
            0
        } else {
            2 * (self.runs[run_index - 1].glyph_end as usize + run_index)
        }
    }

    pub fn run_glyph_count(&self, run_index: usize) -> usize {
        self.runs[run_index].glyph_end as usize - self.first_glyph_index(run_index)
    }

    /// The pen positions of a run, glyph pairs plus the trailing advance.
    pub fn run_positions(&self, run_index: usize) -> &[f32] {
        let first = self.first_position_index(run_index);
        &self.positions[first..first + 2 * (self.run_glyph_count(run_index) + 1)]
    }

    pub fn line_ascent(&self, line_index: usize) -> f32 {
        self.lines[line_index].ascent
    }

    pub fn line_height(&self, line_index: usize) -> f32 {
        if line_index == 0 {
            self.lines[0].total_descent
        } else {
            self.lines[line_index].total_descent - self.lines[line_index - 1].total_descent
        }
    }

    /// Whether the line holds no characters (an empty paragraph).
    pub fn is_empty_line(&self, line_index: usize) -> bool {
        let first = self.first_run_index(line_index);
        let run = &self.runs[first];
        self.lines[line_index].runs_end as usize == first + 1 && run.char_start == run.char_end
    }

    /// Horizontal origin of a line after alignment. A left-aligned layout
    /// with a right-to-left base direction is flush right.
    pub fn line_x_start(&self, line_index: usize, text_width: f32, align: TextXAlign) -> f32 {
        let line_width = self.lines[line_index].width;
        match align {
            TextXAlign::Left => {
                if self.rtl {
                    text_width - line_width
                } else {
                    0.0
                }
            }
            TextXAlign::Right => text_width - line_width,
            TextXAlign::Center => 0.5 * (text_width - line_width),
        }
    }

    /// Calls `f(line_index, line, line_x, baseline_y)` for each line, top to
    /// bottom. The y coordinate is the line's baseline relative to the top
    /// of the text block.
    pub fn for_each_line(
        &self,
        text_width: f32,
        align: TextXAlign,
        mut f: impl FnMut(usize, &LineInfo, f32, f32),
    ) {
        if self.lines.is_empty() {
            return;
        }
        let mut line_y = self.lines[0].ascent;
        for (i, line) in self.lines.iter().enumerate() {
            let line_x = self.line_x_start(i, text_width, align);
            f(i, line, line_x, line_y);
            line_y += self.line_height(i);
        }
    }

    /// Calls `f(line_index, run_index, line_x, baseline_y)` for each run in
    /// visual order, lines top to bottom, runs left to right.
    pub fn for_each_run(
        &self,
        text_width: f32,
        align: TextXAlign,
        mut f: impl FnMut(usize, usize, f32, f32),
    ) {
        let mut run_index = 0;
        self.for_each_line(text_width, align, |line_index, line, line_x, line_y| {
            while run_index < line.runs_end as usize {
                f(line_index, run_index, line_x, line_y);
                run_index += 1;
            }
        });
    }

    /// Whether any character of `[start, end)` falls in the run.
    pub fn run_contains_char_range(&self, run_index: usize, start: usize, end: usize) -> bool {
        let run = &self.runs[run_index];
        (start as u32) < run.char_end && (end as u32) > run.char_start
    }

    /// Horizontal extent covered by `[start, end)` within the run, clamped
    /// to the run's own range. Used for selection highlights.
    pub fn position_range_in_run(&self, run_index: usize, start: usize, end: usize) -> (f32, f32) {
        let run = &self.runs[run_index];
        let start = (start as u32).clamp(run.char_start, run.char_end);
        let end = (end as u32).clamp(run.char_start, run.char_end);
        let (a, b) = if run.rtl {
            (
                self.glyph_offset_rtl(run_index, start),
                self.glyph_offset_rtl(run_index, end),
            )
        } else {
            (
                self.glyph_offset_ltr(run_index, start),
                self.glyph_offset_ltr(run_index, end),
            )
        };
        (a.min(b), a.max(b))
    }

    /// Pixel position, height, and line of the caret at `cursor`.
    pub fn calc_cursor_pixel_pos(
        &self,
        text_width: f32,
        align: TextXAlign,
        cursor: CursorPosition,
    ) -> CaretPixel {
        if self.lines.is_empty() {
            return CaretPixel::default();
        }
        let (run_index, line_index) = self.run_containing_cursor(cursor);
        let line_x = self.line_x_start(line_index, text_width, align);
        let glyph_offset = if self.runs[run_index].rtl {
            self.glyph_offset_rtl(run_index, cursor.index)
        } else {
            self.glyph_offset_ltr(run_index, cursor.index)
        };
        let line_top = if line_index == 0 {
            0.0
        } else {
            self.lines[line_index - 1].total_descent
        };
        CaretPixel {
            x: line_x + glyph_offset,
            y: self.text_start_y + line_top,
            height: self.line_height(line_index),
            line_number: line_index,
        }
    }

    /// The run and line containing the cursor, resolving boundary indices
    /// by affinity: at a soft line break and at direction transitions the
    /// same index belongs to two runs, and the affinity picks which edge
    /// the caret sticks to.
    pub fn run_containing_cursor(&self, cursor: CursorPosition) -> (usize, usize) {
        let mut line_number = 0;
        let pos = cursor.index;

        for i in 0..self.runs.len() {
            let run = &self.runs[i];
            let runs_end = self.lines[line_number].runs_end as usize;
            let run_before_line_break = i + 1 < self.runs.len() && i + 1 == runs_end;
            let run_after_line_break = i == runs_end;
            if run_after_line_break {
                line_number += 1;
            }

            let run_before_soft_break = run_before_line_break && run.char_end_offset == 0;
            let run_after_soft_break =
                run_after_line_break && i > 0 && self.runs[i - 1].char_end_offset == 0;
            let use_prev_run_end = i > 0
                && affinity_prefer_prev_run(
                    run_after_line_break,
                    run_after_soft_break,
                    self.runs[i - 1].rtl,
                    run.rtl,
                    cursor.affinity,
                );
            let use_next_run_start = i + 1 < self.runs.len()
                && !affinity_prefer_prev_run(
                    run_before_line_break,
                    run_before_soft_break,
                    run.rtl,
                    self.runs[i + 1].rtl,
                    cursor.affinity,
                );
            let ignore_start = pos == run.char_start && use_prev_run_end;
            let ignore_end = pos == run.char_end + run.char_end_offset && use_next_run_start;

            if pos >= run.char_start
                && pos <= run.char_end + run.char_end_offset
                && !ignore_start
                && !ignore_end
            {
                return (i, line_number);
            }
        }

        (self.runs.len() - 1, self.lines.len() - 1)
    }

    /// Index of the line closest to pixel height `y`; clamped at both ends.
    pub fn closest_line_to_height(&self, y: f32) -> usize {
        let index = self
            .lines
            .partition_point(|line| line.total_descent < y);
        index.min(self.lines.len().saturating_sub(1))
    }

    /// Cursor at the visual start of the line (smallest character end
    /// across its runs).
    pub fn line_start_position(&self, line_index: usize) -> CursorPosition {
        let first = self.first_run_index(line_index);
        let mut lowest = first;
        let mut lowest_end = self.runs[first].char_end;
        for i in first + 1..self.lines[line_index].runs_end as usize {
            if self.runs[i].char_end < lowest_end {
                lowest = i;
                lowest_end = self.runs[i].char_end;
            }
        }
        let run = &self.runs[lowest];
        CursorPosition::new(if run.rtl { run.char_end } else { run.char_start })
    }

    /// Cursor at the visual end of the line (largest character end across
    /// its runs). At a soft break the caret sticks to this line via
    /// opposite affinity.
    pub fn line_end_position(&self, line_index: usize) -> CursorPosition {
        let first = self.first_run_index(line_index);
        let runs_end = self.lines[line_index].runs_end as usize;
        let mut highest = first;
        let mut highest_end = self.runs[first].char_end;
        for i in first + 1..runs_end {
            if self.runs[i].char_end > highest_end {
                highest = i;
                highest_end = self.runs[i].char_end;
            }
        }
        let run = &self.runs[highest];
        let opposite = highest == runs_end - 1 && run.char_end_offset == 0;
        CursorPosition::with_affinity(
            if run.rtl { run.char_start } else { run.char_end },
            if opposite {
                Affinity::Opposite
            } else {
                Affinity::Default
            },
        )
    }

    /// The cursor position on `line_number` closest to pixel `cursor_x`,
    /// snapping to grapheme cluster boundaries of `text` and interpolating
    /// inside multi-character clusters by byte share.
    pub fn find_closest_cursor_position(
        &self,
        text_width: f32,
        align: TextXAlign,
        text: &str,
        line_number: usize,
        mut cursor_x: f32,
    ) -> CursorPosition {
        cursor_x -= self.line_x_start(line_number, text_width, align);

        // Find the first run whose trailing position passes the target.
        let first_run = self.first_run_index(line_number);
        let last_run = self.lines[line_number].runs_end as usize;
        let run_index = lower_bound(first_run, last_run - first_run, |i| {
            let last_pos = 2 * (self.runs[i].glyph_end as usize + i);
            self.positions[last_pos] < cursor_x
        });

        if run_index == last_run {
            // Past the visual end of the line.
            let run = &self.runs[last_run - 1];
            return CursorPosition::new(if run.rtl {
                run.char_start
            } else {
                run.char_end + run.char_end_offset
            });
        }

        let run = &self.runs[run_index];
        let first_glyph = self.first_glyph_index(run_index);
        let last_glyph = run.glyph_end as usize;
        let first_pos = self.first_position_index(run_index);
        let rtl = run.rtl;

        let glyph_index = first_glyph
            + lower_bound(0, last_glyph - first_glyph, |i| {
                self.positions[first_pos + 2 * i] < cursor_x
            });

        // Visual and logical bounds of the hit glyph's cluster.
        let (cluster_start_char, cluster_end_char, cluster_start_pos, cluster_end_pos) = if rtl {
            if glyph_index == first_glyph {
                let pos = self.positions[first_pos];
                (run.char_end, run.char_end, pos, pos)
            } else {
                let start_char = self.char_indices[glyph_index - 1];
                let end_char = if glyph_index - 1 == first_glyph {
                    run.char_end
                } else {
                    self.char_indices[glyph_index - 2]
                };
                (
                    start_char,
                    end_char,
                    self.positions[first_pos + 2 * (glyph_index - first_glyph)],
                    self.positions[first_pos + 2 * (glyph_index - 1 - first_glyph)],
                )
            }
        } else {
            (
                if glyph_index == first_glyph {
                    run.char_start
                } else {
                    self.char_indices[glyph_index - 1]
                },
                if glyph_index == last_glyph {
                    run.char_end
                } else {
                    self.char_indices[glyph_index]
                },
                if glyph_index == first_glyph {
                    self.positions[first_pos]
                } else {
                    self.positions[first_pos + 2 * (glyph_index - 1 - first_glyph)]
                },
                self.positions[first_pos + 2 * (glyph_index - first_glyph)],
            )
        };

        // Affinity needed for caret positions at the run's visual edges.
        let first_run_in_line = run_index == first_run;
        let last_run_in_line = run_index == last_run - 1;
        let at_soft_line_break = last_run_in_line && run.char_end_offset == 0;
        let first_glyph_affinity = !first_run_in_line && !rtl && self.runs[run_index - 1].rtl;
        let last_glyph_affinity = at_soft_line_break
            || (!last_run_in_line && !rtl && self.runs[run_index + 1].rtl);

        if cluster_start_char == cluster_end_char {
            return CursorPosition::with_affinity(
                cluster_start_char,
                affinity_of(first_glyph_affinity),
            );
        }

        let mut current_char = cluster_start_char;
        let mut current_pos = cluster_start_pos;
        loop {
            let next_char = crate::editing::next_grapheme(text, current_char as usize)
                .map(|i| i as u32)
                .unwrap_or(cluster_end_char);
            let next_pos = cluster_start_pos
                + (next_char - cluster_start_char) as f32
                    / (cluster_end_char - cluster_start_char) as f32
                    * (cluster_end_pos - cluster_start_pos);

            if rtl {
                if cursor_x > next_pos && cursor_x <= current_pos {
                    let selected = if cursor_x - next_pos < current_pos - cursor_x {
                        next_char
                    } else {
                        current_char
                    };
                    let affinity = (selected == run.char_end && first_glyph_affinity)
                        || (selected == run.char_start && last_glyph_affinity);
                    return CursorPosition::with_affinity(selected, affinity_of(affinity));
                }
            } else if cursor_x > current_pos && cursor_x <= next_pos {
                let selected = if next_pos - cursor_x < cursor_x - current_pos {
                    next_char
                } else {
                    current_char
                };
                let affinity = (selected == run.char_start && first_glyph_affinity)
                    || (selected == run.char_end && last_glyph_affinity);
                return CursorPosition::with_affinity(selected, affinity_of(affinity));
            }

            if next_char >= cluster_end_char {
                return CursorPosition::new(cluster_start_char);
            }
            current_char = next_char;
            current_pos = next_pos;
        }
    }

    /// Pen offset of a caret inside an LTR run, interpolating within
    /// clusters by byte share.
    pub(crate) fn glyph_offset_ltr(&self, run_index: usize, cursor: u32) -> f32 {
        let run = &self.runs[run_index];
        let first_glyph = self.first_glyph_index(run_index);
        let last_glyph = run.glyph_end as usize;
        let first_pos = self.first_position_index(run_index);

        let cluster_chars = &self.char_indices[first_glyph..last_glyph];
        let glyph_index = first_glyph + cluster_chars.partition_point(|&c| c < cursor);

        let next_char = if glyph_index == last_glyph {
            run.char_end
        } else {
            self.char_indices[glyph_index]
        };
        let cluster_diff = next_char.saturating_sub(cursor);
        let mut offset = self.positions[first_pos + 2 * (glyph_index - first_glyph)];

        if cluster_diff > 0 && glyph_index > first_glyph {
            let cluster_len = next_char - self.char_indices[glyph_index - 1];
            let prev_offset = self.positions[first_pos + 2 * (glyph_index - 1 - first_glyph)];
            let scale = (cluster_len - cluster_diff) as f32 / cluster_len as f32;
            offset = prev_offset + (offset - prev_offset) * scale;
        }
        offset
    }

    /// Pen offset of a caret inside an RTL run.
    pub(crate) fn glyph_offset_rtl(&self, run_index: usize, cursor: u32) -> f32 {
        let run = &self.runs[run_index];
        let first_glyph = self.first_glyph_index(run_index);
        let last_glyph = run.glyph_end as usize;
        let first_pos = self.first_position_index(run_index);

        // Char indices decrease through an RTL run's visual glyph order.
        let cluster_chars = &self.char_indices[first_glyph..last_glyph];
        let glyph_index = first_glyph + cluster_chars.partition_point(|&c| c >= cursor);

        let next_char = if glyph_index == first_glyph {
            run.char_end
        } else {
            self.char_indices[glyph_index - 1]
        };
        let cluster_diff = next_char.saturating_sub(cursor);
        let mut offset = self.positions[first_pos + 2 * (glyph_index - first_glyph)];

        if cluster_diff > 0 && glyph_index < last_glyph {
            let cluster_len = next_char - self.char_indices[glyph_index];
            let prev_offset = self.positions[first_pos + 2 * (glyph_index + 1 - first_glyph)];
            let scale = (cluster_len - cluster_diff) as f32 / cluster_len as f32;
            offset = prev_offset + (offset - prev_offset) * scale;
        }
        offset
    }
}

fn affinity_of(opposite: bool) -> Affinity {
    if opposite {
        Affinity::Opposite
    } else {
        Affinity::Default
    }
}

/// Affinity policy at run boundaries:
/// soft line break defaults to the next run's start; an RTL→LTR transition
/// defaults to the previous run's end; an LTR→RTL transition defaults to
/// the next run's start.
fn affinity_prefer_prev_run(
    at_line_break: bool,
    at_soft_line_break: bool,
    prev_run_rtl: bool,
    next_run_rtl: bool,
    affinity: Affinity,
) -> bool {
    (at_soft_line_break && affinity == Affinity::Opposite)
        || (!at_line_break && prev_run_rtl && !next_run_rtl && affinity == Affinity::Default)
        || (!at_line_break && !prev_run_rtl && next_run_rtl && affinity == Affinity::Opposite)
}

/// First index in `[start, start + count)` where `pred` is false.
fn lower_bound(start: usize, count: usize, mut pred: impl FnMut(usize) -> bool) -> usize {
    let mut first = start;
    let mut count = count;
    while count > 0 {
        let step = count / 2;
        let index = first + step;
        if pred(index) {
            first = index + 1;
            count -= step + 1;
        } else {
            count = step;
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::VisualRun;
    use typecase::{FaceId, SingleScriptFont};

    fn test_font() -> SingleScriptFont {
        SingleScriptFont {
            face: FaceId::default(),
            size: 16,
        }
    }

    /// One LTR line of five 10px glyphs over "hello".
    fn single_line_layout() -> ParagraphLayout {
        ParagraphLayout {
            runs: vec![VisualRun {
                font: test_font(),
                glyph_end: 5,
                char_start: 0,
                char_end: 5,
                char_end_offset: 0,
                rtl: false,
            }],
            lines: vec![LineInfo {
                runs_end: 1,
                width: 50.0,
                ascent: 10.0,
                total_descent: 12.0,
            }],
            glyphs: vec![1, 2, 3, 4, 5],
            char_indices: vec![0, 1, 2, 3, 4],
            positions: vec![
                0.0, 0.0, 10.0, 0.0, 20.0, 0.0, 30.0, 0.0, 40.0, 0.0, 50.0, 0.0,
            ],
            text_start_y: 0.0,
            rtl: false,
        }
    }

    /// Two lines over "hell" + "o!", soft-wrapped.
    fn two_line_layout() -> ParagraphLayout {
        ParagraphLayout {
            runs: vec![
                VisualRun {
                    font: test_font(),
                    glyph_end: 4,
                    char_start: 0,
                    char_end: 4,
                    char_end_offset: 0,
                    rtl: false,
                },
                VisualRun {
                    font: test_font(),
                    glyph_end: 6,
                    char_start: 4,
                    char_end: 6,
                    char_end_offset: 0,
                    rtl: false,
                },
            ],
            lines: vec![
                LineInfo {
                    runs_end: 1,
                    width: 40.0,
                    ascent: 10.0,
                    total_descent: 12.0,
                },
                LineInfo {
                    runs_end: 2,
                    width: 20.0,
                    ascent: 10.0,
                    total_descent: 24.0,
                },
            ],
            glyphs: vec![1, 2, 3, 4, 5, 6],
            char_indices: vec![0, 1, 2, 3, 4, 5],
            positions: vec![
                0.0, 0.0, 10.0, 0.0, 20.0, 0.0, 30.0, 0.0, 40.0, 0.0, // line 1
                0.0, 0.0, 10.0, 0.0, 20.0, 0.0, // line 2
            ],
            text_start_y: 0.0,
            rtl: false,
        }
    }

    #[test]
    fn alignment_offsets_lines() {
        let layout = single_line_layout();
        assert_eq!(layout.line_x_start(0, 200.0, TextXAlign::Left), 0.0);
        assert_eq!(layout.line_x_start(0, 200.0, TextXAlign::Right), 150.0);
        assert_eq!(layout.line_x_start(0, 200.0, TextXAlign::Center), 75.0);

        let mut rtl_layout = single_line_layout();
        rtl_layout.rtl = true;
        assert_eq!(rtl_layout.line_x_start(0, 200.0, TextXAlign::Left), 150.0);
    }

    #[test]
    fn caret_positions_are_monotonic_on_ltr_text() {
        let layout = single_line_layout();
        let mut last_x = f32::MIN;
        for i in 0..=5u32 {
            let pixel =
                layout.calc_cursor_pixel_pos(200.0, TextXAlign::Left, CursorPosition::new(i));
            assert!(pixel.x >= last_x);
            assert_eq!(pixel.x, (i * 10) as f32);
            last_x = pixel.x;
        }
    }

    #[test]
    fn closest_cursor_snaps_to_nearest_boundary() {
        let layout = single_line_layout();
        let text = "hello";
        let hit = |x: f32| {
            layout
                .find_closest_cursor_position(200.0, TextXAlign::Left, text, 0, x)
                .index
        };
        assert_eq!(hit(23.0), 2);
        assert_eq!(hit(26.0), 3);
        assert_eq!(hit(-5.0), 0);
        assert_eq!(hit(70.0), 5);
    }

    #[test]
    fn soft_break_cursor_resolves_by_affinity() {
        let layout = two_line_layout();
        // Default affinity at the wrap index lands on the next line's start.
        let (run, line) = layout.run_containing_cursor(CursorPosition::new(4));
        assert_eq!((run, line), (1, 1));
        // Opposite affinity keeps the caret at the end of the first line.
        let (run, line) = layout
            .run_containing_cursor(CursorPosition::with_affinity(4, Affinity::Opposite));
        assert_eq!((run, line), (0, 0));

        let end_of_first = layout.calc_cursor_pixel_pos(
            200.0,
            TextXAlign::Left,
            CursorPosition::with_affinity(4, Affinity::Opposite),
        );
        assert_eq!(end_of_first.x, 40.0);
        assert_eq!(end_of_first.line_number, 0);
        let start_of_second =
            layout.calc_cursor_pixel_pos(200.0, TextXAlign::Left, CursorPosition::new(4));
        assert_eq!(start_of_second.x, 0.0);
        assert_eq!(start_of_second.line_number, 1);
    }

    #[test]
    fn line_edge_positions() {
        let layout = two_line_layout();
        assert_eq!(layout.line_start_position(0).index, 0);
        let end = layout.line_end_position(0);
        assert_eq!(end.index, 4);
        assert_eq!(end.affinity, Affinity::Opposite);
        assert_eq!(layout.line_start_position(1).index, 4);
        assert_eq!(layout.line_end_position(1).index, 6);
    }

    #[test]
    fn closest_line_clamps_at_both_ends() {
        let layout = two_line_layout();
        assert_eq!(layout.closest_line_to_height(-3.0), 0);
        assert_eq!(layout.closest_line_to_height(5.0), 0);
        assert_eq!(layout.closest_line_to_height(13.0), 1);
        assert_eq!(layout.closest_line_to_height(99.0), 1);
    }

    #[test]
    fn selection_range_clamps_to_run() {
        let layout = single_line_layout();
        assert_eq!(layout.position_range_in_run(0, 1, 3), (10.0, 30.0));
        assert_eq!(layout.position_range_in_run(0, 0, 99), (0.0, 50.0));
        assert!(layout.run_contains_char_range(0, 2, 3));
        assert!(!layout.run_contains_char_range(0, 5, 8));
    }

    #[test]
    fn runs_iterate_in_visual_order() {
        let layout = two_line_layout();
        let mut seen = Vec::new();
        layout.for_each_run(200.0, TextXAlign::Left, |line, run, x, y| {
            seen.push((line, run, x, y));
        });
        assert_eq!(seen.len(), 2);
        assert_eq!((seen[0].0, seen[0].1), (0, 0));
        assert_eq!((seen[1].0, seen[1].1), (1, 1));
        // Baselines: first at ascent, second one line height further down.
        assert_eq!(seen[0].3, 10.0);
        assert_eq!(seen[1].3, 22.0);
    }

    #[test]
    fn rtl_run_offsets_decrease_with_index() {
        // One RTL run over two 2-byte characters, 10px each: visual glyph
        // order is reversed, so the caret at the logical start sits at the
        // run's right edge.
        let layout = ParagraphLayout {
            runs: vec![VisualRun {
                font: test_font(),
                glyph_end: 2,
                char_start: 0,
                char_end: 4,
                char_end_offset: 0,
                rtl: true,
            }],
            lines: vec![LineInfo {
                runs_end: 1,
                width: 20.0,
                ascent: 10.0,
                total_descent: 12.0,
            }],
            glyphs: vec![7, 8],
            char_indices: vec![2, 0],
            positions: vec![0.0, 0.0, 10.0, 0.0, 20.0, 0.0],
            text_start_y: 0.0,
            rtl: true,
        };
        assert_eq!(layout.glyph_offset_rtl(0, 4), 0.0);
        assert_eq!(layout.glyph_offset_rtl(0, 2), 10.0);
        assert_eq!(layout.glyph_offset_rtl(0, 0), 20.0);
    }
}
