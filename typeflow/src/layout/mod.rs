// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paragraph shaping, line breaking, and the laid-out glyph stream.
//!
//! [`ParagraphLayout::build`] consumes the text and its font runs and
//! produces visual runs with glyph ids, pen positions, and char↔glyph
//! mappings, cut into lines against the wrap width. Bidi levels come from
//! [`crate::bidi`]; shaping is done per logical run with swash.

mod query;

use bitflags::bitflags;
use swash::shape::{Direction as ShapeDirection, ShapeContext};
use swash::text::cluster::Boundary;
use swash::text::{analyze, Codepoint, Script};
use tracing::warn;
use typecase::{Font, SingleScriptFont};

use crate::bidi::{BaseDirection, BidiParagraph};
use crate::runs::RunArray;
use crate::style::TextYAlign;

bitflags! {
    /// Behavior switches for layout construction.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct LayoutFlags: u8 {
        /// Default the paragraph base direction to right-to-left instead of
        /// resolving it from the first strong character.
        const RIGHT_TO_LEFT = 1;
        /// Force every character to the base direction, overriding script
        /// directions.
        const OVERRIDE_DIRECTIONALITY = 2;
    }
}

/// A maximal run of glyphs on one line sharing a font and direction.
#[derive(Clone, Debug)]
pub struct VisualRun {
    pub font: SingleScriptFont,
    /// Exclusive end of this run's glyphs in the layout's glyph arrays.
    pub glyph_end: u32,
    /// Byte range of the run's characters in the source text.
    pub char_start: u32,
    pub char_end: u32,
    /// Byte length of the paragraph separator following this run, recorded
    /// on the run holding the paragraph's highest character. Zero after a
    /// soft (wrap) break.
    pub char_end_offset: u32,
    pub rtl: bool,
}

/// One laid-out line.
#[derive(Clone, Debug)]
pub struct LineInfo {
    /// Exclusive end of this line's runs in the layout's run array.
    pub runs_end: u32,
    pub width: f32,
    pub ascent: f32,
    /// Distance from the top of the paragraph block to this line's bottom;
    /// the difference from the previous line's value is the line height.
    pub total_descent: f32,
}

/// The laid-out form of a whole text: visual runs, glyphs, pen positions
/// and lines.
///
/// Per visual run the `positions` array holds `2 × (glyph count + 1)`
/// floats: an x/y pen position per glyph in visual order plus one trailing
/// position carrying the run's advance.
#[derive(Clone, Debug, Default)]
pub struct ParagraphLayout {
    pub runs: Vec<VisualRun>,
    pub lines: Vec<LineInfo>,
    pub glyphs: Vec<u16>,
    /// Byte index of the first character of each glyph's cluster.
    pub char_indices: Vec<u32>,
    pub positions: Vec<f32>,
    /// Vertical offset of the first line's top within the text area.
    pub text_start_y: f32,
    /// Whether the (first) paragraph's base direction is right-to-left.
    pub rtl: bool,
}

struct BuildState {
    shape_cx: ShapeContext,
    /// Per-paragraph shaping results in logical order.
    glyphs: Vec<u16>,
    char_indices: Vec<u32>,
    offsets: Vec<(f32, f32)>,
    advances: Vec<f32>,
}

struct LogicalRun {
    font: SingleScriptFont,
    script: Script,
    rtl: bool,
    /// Paragraph-relative exclusive byte end.
    char_end: usize,
    /// Exclusive end in the paragraph's shaped glyph arrays.
    glyph_end: u32,
}

impl ParagraphLayout {
    /// Lays out `text` with the given per-byte font runs.
    ///
    /// A `wrap_width` of zero disables soft wrapping: each paragraph
    /// becomes one line. The vertical alignment places the text block
    /// within `height`.
    pub fn build(
        text: &str,
        font_runs: &RunArray<Font>,
        wrap_width: f32,
        height: f32,
        y_align: TextYAlign,
        flags: LayoutFlags,
    ) -> Self {
        let mut result = Self {
            rtl: flags.contains(LayoutFlags::RIGHT_TO_LEFT),
            ..Self::default()
        };
        if text.is_empty() || font_runs.is_empty() {
            return result;
        }

        let mut state = BuildState {
            shape_cx: ShapeContext::new(),
            glyphs: Vec::new(),
            char_indices: Vec::new(),
            offsets: Vec::new(),
            advances: Vec::new(),
        };
        let mut resolved_rtl: Option<bool> = None;

        let mut para_start = 0;
        let mut iter = text.char_indices();
        loop {
            let next = iter.next();
            let (idx, c) = match next {
                Some((idx, c)) => (idx, Some(c)),
                None => (text.len(), None),
            };
            let is_separator = c.is_some_and(crate::editing::is_line_break);
            if c.is_some() && !is_separator {
                continue;
            }

            // One paragraph ends here: [para_start, idx).
            let highest_run = if idx > para_start {
                let base = match resolved_rtl {
                    Some(true) => BaseDirection::Rtl,
                    Some(false) => BaseDirection::Ltr,
                    None if flags.contains(LayoutFlags::RIGHT_TO_LEFT) => BaseDirection::Rtl,
                    None => BaseDirection::Auto,
                };
                let mut para = BidiParagraph::new(&text[para_start..idx], base);
                if flags.contains(LayoutFlags::OVERRIDE_DIRECTIONALITY) {
                    para.override_direction();
                }
                if resolved_rtl.is_none() {
                    let rtl = para.base_level() & 1 != 0;
                    resolved_rtl = Some(rtl);
                    result.rtl = rtl;
                }
                build_paragraph(
                    &mut state,
                    &mut result,
                    &para,
                    text,
                    para_start,
                    font_runs,
                    wrap_width,
                )
            } else {
                empty_paragraph(&mut result, font_runs, para_start, text.len())
            };

            // Record the separator length on the run holding the
            // paragraph's last character; the caret uses it to sit after a
            // hard break.
            let mut sep_len = c.map(char::len_utf8).unwrap_or(0);
            if c == Some('\r') {
                if let Some((_, '\n')) = iter.clone().next() {
                    iter.next();
                    sep_len += 1;
                }
            }
            if let (Some(run), true) = (highest_run, sep_len > 0) {
                result.runs[run].char_end_offset = sep_len as u32;
            }

            if c.is_none() {
                break;
            }
            para_start = idx + sep_len;
        }

        let total_height = result.lines.last().map(|l| l.total_descent).unwrap_or(0.0);
        result.text_start_y = y_align.factor() * (height - total_height) * 0.5;
        result
    }
}

/// Produces the empty line of a paragraph with no characters (consecutive
/// separators, or a trailing separator at the end of the text).
fn empty_paragraph(
    result: &mut ParagraphLayout,
    font_runs: &RunArray<Font>,
    para_start: usize,
    text_len: usize,
) -> Option<usize> {
    let lookup = if para_start >= text_len {
        text_len.saturating_sub(1)
    } else {
        para_start
    };
    let font = *font_runs.value_at(lookup.min(font_runs.limit().saturating_sub(1)));
    let face = typecase::get_face(font).unwrap_or_default();
    let (ascent, descent) = typecase::scaled_font(face, font.size)
        .map(|data| (data.ascent(), data.descent()))
        .unwrap_or((0.0, 0.0));

    let highest_run = result.runs.len();
    // Every run carries at least one trailing position entry.
    result.positions.extend([0.0, 0.0]);
    let glyph_end = result.glyphs.len() as u32;
    result.runs.push(VisualRun {
        font: SingleScriptFont {
            face,
            size: font.size,
        },
        glyph_end,
        char_start: para_start as u32,
        char_end: para_start as u32,
        char_end_offset: 0,
        rtl: false,
    });
    let height = ascent + descent;
    let total_descent = result.lines.last().map(|l| l.total_descent).unwrap_or(0.0) + height;
    result.lines.push(LineInfo {
        runs_end: result.runs.len() as u32,
        width: 0.0,
        ascent,
        total_descent,
    });
    Some(highest_run)
}

/// Lays out one paragraph: itemize, shape, break lines, and append the
/// visual runs. Returns the index of the run holding the paragraph's
/// highest character.
fn build_paragraph(
    state: &mut BuildState,
    result: &mut ParagraphLayout,
    para: &BidiParagraph<'_>,
    text: &str,
    para_start: usize,
    font_runs: &RunArray<Font>,
    wrap_width: f32,
) -> Option<usize> {
    let para_text = para.text();

    // Itemize into logical runs: the finest segmentation of script,
    // embedding level, and resolved sub-font.
    let script_runs = compute_script_runs(para_text);
    let level_runs = compute_level_runs(para);
    let mut para_font_runs = RunArray::with_capacity(font_runs.run_count());
    font_runs.subset(para_start, para_text.len(), &mut para_font_runs);
    let sub_font_runs = compute_sub_font_runs(para_text, &para_font_runs, &script_runs)?;

    let mut logical_runs = Vec::new();
    {
        let mut si = 0;
        let mut li = 0;
        let mut fi = 0;
        let mut pos = 0;
        while pos < para_text.len() {
            let limit = script_runs
                .limit_of_run(si)
                .min(level_runs.limit_of_run(li))
                .min(sub_font_runs.limit_of_run(fi));
            logical_runs.push(LogicalRun {
                font: *sub_font_runs.value_of_run(fi),
                script: *script_runs.value_of_run(si),
                rtl: level_runs.value_of_run(li) & 1 != 0,
                char_end: limit,
                glyph_end: 0,
            });
            if script_runs.limit_of_run(si) == limit {
                si += 1;
            }
            if level_runs.limit_of_run(li) == limit {
                li += 1;
            }
            if sub_font_runs.limit_of_run(fi) == limit {
                fi += 1;
            }
            pos = limit;
        }
    }

    // Shape each logical run.
    state.glyphs.clear();
    state.char_indices.clear();
    state.offsets.clear();
    state.advances.clear();
    let mut run_start = 0;
    for run in &mut logical_runs {
        shape_logical_run(state, para_text, run_start, run.char_end, run, para_start);
        run.glyph_end = state.glyphs.len() as u32;
        run_start = run.char_end;
    }

    let mut highest_run = None;
    let mut highest_char_end = 0;

    if wrap_width <= 0.0 {
        compute_line_visual_runs(
            state,
            result,
            &logical_runs,
            para,
            para_start,
            0,
            para_text.len(),
            &mut highest_run,
            &mut highest_char_end,
        );
        return highest_run;
    }

    // Greedy wrap: fill glyphs until the width overflows, then break at the
    // last opportunity at or before the overflowing glyph.
    let breaks = compute_break_opportunities(para_text);
    let mut line_end = 0;
    while line_end < para_text.len() {
        let line_start = line_end;
        let mut width_so_far = 0.0;
        let mut glyph_index = state
            .char_indices
            .partition_point(|&c| (c as usize) < para_start + line_start);

        while glyph_index < state.glyphs.len()
            && width_so_far + state.advances[glyph_index] <= wrap_width
        {
            width_so_far += state.advances[glyph_index];
            glyph_index += 1;
        }

        // If nothing fits, force one glyph onto the line. Zero-width glyphs
        // never start a line unless the paragraph has nothing else, so this
        // always makes forward progress.
        if width_so_far == 0.0 && glyph_index < state.glyphs.len() {
            glyph_index += 1;
        }

        let overflow_char = if glyph_index == state.glyphs.len() {
            para_text.len()
        } else {
            state.char_indices[glyph_index] as usize - para_start
        };
        line_end = find_previous_line_break(&breaks, para_text, overflow_char);

        // The break may land at or before the line start (one unbreakable
        // word wider than the area); take glyph cluster boundaries forward
        // of it until the line advances.
        while line_end <= line_start {
            if glyph_index >= state.glyphs.len() {
                line_end = para_text.len();
                break;
            }
            line_end = state.char_indices[glyph_index] as usize - para_start;
            glyph_index += 1;
        }

        compute_line_visual_runs(
            state,
            result,
            &logical_runs,
            para,
            para_start,
            line_start,
            line_end,
            &mut highest_run,
            &mut highest_char_end,
        );
    }

    highest_run
}

/// Per-character script runs with Common/Inherited folded into the active
/// script; the initial script is the first real one, else Latin.
fn compute_script_runs(para_text: &str) -> RunArray<Script> {
    let mut runs = RunArray::new();
    let mut current = para_text
        .chars()
        .map(|c| c.script())
        .find(|s| real_script(*s))
        .unwrap_or(Script::Latin);
    for (i, c) in para_text.char_indices() {
        let mut script = c.script();
        if !real_script(script) {
            script = current;
        }
        if script != current {
            runs.add(i, current);
            current = script;
        }
    }
    runs.add(para_text.len(), current);
    runs
}

fn real_script(script: Script) -> bool {
    script != Script::Common && script != Script::Unknown && script != Script::Inherited
}

fn compute_level_runs(para: &BidiParagraph<'_>) -> RunArray<u8> {
    let levels = para.levels();
    let mut runs = RunArray::new();
    let mut current = levels[0];
    for (i, level) in levels.iter().enumerate().skip(1) {
        if *level != current {
            runs.add(i, current);
            current = *level;
        }
    }
    runs.add(levels.len(), current);
    runs
}

/// Splits each (font × script) intersection into maximal single-face runs
/// via the registry's fallback resolution.
fn compute_sub_font_runs(
    para_text: &str,
    font_runs: &RunArray<Font>,
    script_runs: &RunArray<Script>,
) -> Option<RunArray<SingleScriptFont>> {
    let mut result = RunArray::with_capacity(font_runs.run_count());
    let mut fi = 0;
    let mut si = 0;
    let mut offset = 0;
    while offset < para_text.len() {
        let limit = font_runs.limit_of_run(fi).min(script_runs.limit_of_run(si));
        let font = *font_runs.value_of_run(fi);
        let script = *script_runs.value_of_run(si);
        while offset < limit {
            let Some(sub) = typecase::get_sub_font(font, para_text, &mut offset, limit, script)
            else {
                warn!("font family not initialized; skipping layout");
                return None;
            };
            result.add(offset, sub);
        }
        if font_runs.limit_of_run(fi) == limit {
            fi += 1;
        }
        if script_runs.limit_of_run(si) == limit {
            si += 1;
        }
    }
    Some(result)
}

fn shape_logical_run(
    state: &mut BuildState,
    para_text: &str,
    start: usize,
    end: usize,
    run: &LogicalRun,
    para_start: usize,
) {
    let Some(scaled) = typecase::scaled_font(run.font.face, run.font.size) else {
        // Unloadable face: the run keeps zero glyphs and renders nothing.
        return;
    };
    let mut shaper = state
        .shape_cx
        .builder(scaled.as_ref())
        .script(run.script)
        .size(run.font.size as f32)
        .direction(if run.rtl {
            ShapeDirection::RightToLeft
        } else {
            ShapeDirection::LeftToRight
        })
        .build();
    shaper.add_str(&para_text[start..end]);

    let glyphs = &mut state.glyphs;
    let char_indices = &mut state.char_indices;
    let offsets = &mut state.offsets;
    let advances = &mut state.advances;
    shaper.shape_with(|cluster| {
        let cluster_char = (para_start + start + cluster.source.start as usize) as u32;
        for glyph in cluster.glyphs {
            glyphs.push(glyph.id);
            char_indices.push(cluster_char);
            offsets.push((glyph.x, glyph.y));
            advances.push(glyph.advance);
        }
    });
}

/// Byte positions where UAX #14 allows a line break, in increasing order.
fn compute_break_opportunities(para_text: &str) -> Vec<usize> {
    let mut breaks = Vec::new();
    let mut pos = 0;
    for ((_, boundary), c) in analyze(para_text.chars()).zip(para_text.chars()) {
        if pos > 0 && matches!(boundary, Boundary::Line | Boundary::Mandatory) {
            breaks.push(pos);
        }
        pos += c.len_utf8();
    }
    breaks
}

/// The break opportunity at or before `char_index`, skipping trailing
/// whitespace and controls that may hang in the margin.
fn find_previous_line_break(breaks: &[usize], para_text: &str, char_index: usize) -> usize {
    let mut index = char_index;
    while index < para_text.len() {
        let Some(c) = para_text[index..].chars().next() else {
            break;
        };
        if !c.is_whitespace() && !c.is_control() {
            break;
        }
        index += c.len_utf8();
    }
    // Break positions strictly before the next character keep a break
    // exactly at `index` eligible.
    let target = para_text[index..]
        .chars()
        .next()
        .map(|c| index + c.len_utf8())
        .unwrap_or(index);
    let count = breaks.partition_point(|b| *b < target);
    if count == 0 {
        0
    } else {
        breaks[count - 1]
    }
}

/// Cuts `[line_start, line_end)` (paragraph-relative) into visual runs by
/// intersecting the line's bidi runs with the logical runs, and appends the
/// line to the layout.
#[allow(clippy::too_many_arguments)]
fn compute_line_visual_runs(
    state: &BuildState,
    result: &mut ParagraphLayout,
    logical_runs: &[LogicalRun],
    para: &BidiParagraph<'_>,
    para_start: usize,
    line_start: usize,
    line_end: usize,
    highest_run: &mut Option<usize>,
    highest_char_end: &mut usize,
) {
    let Ok(line) = para.line(line_start, line_end) else {
        warn!(line_start, line_end, "line range rejected by bidi layer");
        return;
    };

    let mut max_ascent = 0.0f32;
    let mut max_descent = 0.0f32;
    let mut pen_x = 0.0f32;

    for i in 0..line.run_count() {
        let (range, rtl) = line.visual_run(i);
        // Paragraph-relative character range of this bidi run.
        let run_start = line_start + range.start;
        let run_end = line_start + range.end;

        let mut track_metrics = |run: &LogicalRun| {
            if let Some(data) = typecase::scaled_font(run.font.face, run.font.size) {
                max_ascent = max_ascent.max(data.ascent());
                max_descent = max_descent.max(data.descent());
            }
        };

        if !rtl {
            let mut index = logical_runs.partition_point(|lr| lr.char_end <= run_start);
            let mut chr = run_start;
            loop {
                let logical_end = logical_runs[index].char_end;
                track_metrics(&logical_runs[index]);
                if run_end <= logical_end {
                    append_visual_run(
                        state, result, logical_runs, index, chr, run_end, para_start, &mut pen_x,
                        highest_run, highest_char_end,
                    );
                    break;
                }
                append_visual_run(
                    state,
                    result,
                    logical_runs,
                    index,
                    chr,
                    logical_end,
                    para_start,
                    &mut pen_x,
                    highest_run,
                    highest_char_end,
                );
                chr = logical_end;
                index += 1;
            }
        } else {
            let mut index = logical_runs.partition_point(|lr| lr.char_end <= run_end - 1);
            let mut chr_end = run_end;
            loop {
                let logical_start = if index == 0 {
                    0
                } else {
                    logical_runs[index - 1].char_end
                };
                track_metrics(&logical_runs[index]);
                if run_start >= logical_start {
                    append_visual_run(
                        state, result, logical_runs, index, run_start, chr_end, para_start,
                        &mut pen_x, highest_run, highest_char_end,
                    );
                    break;
                }
                append_visual_run(
                    state,
                    result,
                    logical_runs,
                    index,
                    logical_start,
                    chr_end,
                    para_start,
                    &mut pen_x,
                    highest_run,
                    highest_char_end,
                );
                chr_end = logical_start;
                index -= 1;
            }
        }
    }

    let height = max_ascent + max_descent;
    let total_descent = result.lines.last().map(|l| l.total_descent).unwrap_or(0.0) + height;
    result.lines.push(LineInfo {
        runs_end: result.runs.len() as u32,
        width: pen_x,
        ascent: max_ascent,
        total_descent,
    });
}

/// Emits the glyphs of one visual run (a bidi-run × logical-run
/// intersection) in visual order, with pen positions continuing from
/// `pen_x`.
#[allow(clippy::too_many_arguments)]
fn append_visual_run(
    state: &BuildState,
    result: &mut ParagraphLayout,
    logical_runs: &[LogicalRun],
    index: usize,
    char_start: usize,
    char_end: usize,
    para_start: usize,
    pen_x: &mut f32,
    highest_run: &mut Option<usize>,
    highest_char_end: &mut usize,
) {
    let run = &logical_runs[index];
    let first_glyph = if index == 0 {
        0
    } else {
        logical_runs[index - 1].glyph_end as usize
    };
    let last_glyph = run.glyph_end as usize;
    let char_start_abs = para_start + char_start;
    let char_end_abs = para_start + char_end;

    let cluster_chars = &state.char_indices[first_glyph..last_glyph];
    let lo = first_glyph + cluster_chars.partition_point(|&c| (c as usize) < char_start_abs);
    let hi = first_glyph + cluster_chars.partition_point(|&c| (c as usize) < char_end_abs);

    if char_end_abs > *highest_char_end {
        *highest_run = Some(result.runs.len());
        *highest_char_end = char_end_abs;
    }

    let mut emit = |g: usize| {
        result.glyphs.push(state.glyphs[g]);
        result.char_indices.push(state.char_indices[g]);
        result
            .positions
            .extend([*pen_x + state.offsets[g].0, state.offsets[g].1]);
        *pen_x += state.advances[g];
    };
    if run.rtl {
        for g in (lo..hi).rev() {
            emit(g);
        }
    } else {
        for g in lo..hi {
            emit(g);
        }
    }
    result.positions.extend([*pen_x, 0.0]);

    result.runs.push(VisualRun {
        font: run.font,
        glyph_end: result.glyphs.len() as u32,
        char_start: char_start_abs as u32,
        char_end: char_end_abs as u32,
        char_end_offset: 0,
        rtl: run.rtl,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_opportunities_follow_spaces() {
        let text = "the quick brown";
        let breaks = compute_break_opportunities(text);
        assert_eq!(breaks, vec![4, 10]);
    }

    #[test]
    fn previous_line_break_skips_hanging_whitespace() {
        let text = "the quick brown";
        let breaks = compute_break_opportunities(text);
        // Overflow inside "quick": break before it.
        assert_eq!(find_previous_line_break(&breaks, text, 7), 4);
        // Overflow on the space after "quick": the space hangs, so the
        // break lands before "brown".
        assert_eq!(find_previous_line_break(&breaks, text, 9), 10);
        // Overflow inside "the": no earlier opportunity.
        assert_eq!(find_previous_line_break(&breaks, text, 2), 0);
        // Overflow past the end keeps the last opportunity.
        assert_eq!(find_previous_line_break(&breaks, text, text.len()), 10);
    }

    #[test]
    fn script_runs_fold_common_characters() {
        // Digits and spaces take the surrounding script.
        let runs = compute_script_runs("abc 123");
        assert_eq!(runs.run_count(), 1);
        assert_eq!(*runs.value_of_run(0), Script::Latin);

        let runs = compute_script_runs("abc\u{5D0}\u{5D1}");
        assert_eq!(runs.run_count(), 2);
        assert_eq!(runs.limits(), &[3, 7]);
        assert_eq!(*runs.value_of_run(0), Script::Latin);
        assert_eq!(*runs.value_of_run(1), Script::Hebrew);

        // Leading common characters inherit the first real script.
        let runs = compute_script_runs("123\u{5D0}");
        assert_eq!(runs.run_count(), 1);
        assert_eq!(*runs.value_of_run(0), Script::Hebrew);
    }

    #[test]
    fn level_runs_match_bidi_levels() {
        let para = BidiParagraph::new("abc\u{5D0}\u{5D1}\u{5D2}def", BaseDirection::Auto);
        let runs = compute_level_runs(&para);
        assert_eq!(runs.limits(), &[3, 9, 12]);
        assert_eq!(runs.values(), &[0, 1, 0]);
    }
}
