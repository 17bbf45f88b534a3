// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Inline markup parsing into piecewise-constant formatting runs.
//!
//! The syntax is square-bracket tags nesting in LIFO order: `[b]`, `[i]`,
//! `[u]`, `[s]`, `[color=#RRGGBB]`, `[font=name]`,
//! `[stroke=thickness:joins:#RRGGBB]`, each closed by `[/tag]`. Unknown tags
//! pass through as literal text. Malformed markup degrades: the remainder of
//! the input from the point of the error is emitted verbatim with default
//! formatting.

use bitflags::bitflags;
use typecase::{Font, FontStyle, FontWeight};

use crate::runs::{RunArray, RunBuilder};
use crate::style::{Color, StrokeJoins, StrokeState};

/// Formatting attributes resolved over the content text.
///
/// All run arrays share the same limit: the byte length of `content`, the
/// visible string after markup stripping.
#[derive(Clone, Debug)]
pub struct FormattingRuns {
    pub fonts: RunArray<Font>,
    pub colors: RunArray<Color>,
    pub strokes: RunArray<StrokeState>,
    pub underline: RunArray<bool>,
    pub strikethrough: RunArray<bool>,
    pub content: String,
    /// For parsed rich text, maps each content byte to its byte index in the
    /// markup source.
    pub source_map: Option<Vec<u32>>,
}

/// Builds single-run formatting over `text` at the given defaults.
pub fn default_runs(text: &str, font: Font, color: Color, stroke: StrokeState) -> FormattingRuns {
    let len = text.len();
    FormattingRuns {
        fonts: RunArray::single(font, len),
        colors: RunArray::single(color, len),
        strokes: RunArray::single(stroke, len),
        underline: RunArray::single(false, len),
        strikethrough: RunArray::single(false, len),
        content: text.to_owned(),
        source_map: None,
    }
}

/// Parses inline markup, producing the stripped content string and its
/// formatting runs.
pub fn parse_inline(text: &str, font: Font, color: Color, stroke: StrokeState) -> FormattingRuns {
    Parser::new(text, font, color, stroke).parse()
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum TagKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Color,
    Font,
    Stroke,
}

impl TagKind {
    fn name(self) -> &'static str {
        match self {
            Self::Bold => "b",
            Self::Italic => "i",
            Self::Underline => "u",
            Self::Strikethrough => "s",
            Self::Color => "color",
            Self::Font => "font",
            Self::Stroke => "stroke",
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    out: String,
    map: Vec<u32>,
    fonts: RunBuilder<Font>,
    colors: RunBuilder<Color>,
    strokes: RunBuilder<StrokeState>,
    underline: RunBuilder<bool>,
    strikethrough: RunBuilder<bool>,
    stack: Vec<TagKind>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, font: Font, color: Color, stroke: StrokeState) -> Self {
        Self {
            src,
            out: String::with_capacity(src.len()),
            map: Vec::with_capacity(src.len()),
            fonts: RunBuilder::new(font),
            colors: RunBuilder::new(color),
            strokes: RunBuilder::new(stroke),
            underline: RunBuilder::new(false),
            strikethrough: RunBuilder::new(false),
            stack: Vec::new(),
        }
    }

    fn parse(mut self) -> FormattingRuns {
        let mut pos = 0;
        loop {
            let Some(rel) = self.src[pos..].find('[') else {
                self.emit(pos, self.src.len());
                if !self.stack.is_empty() {
                    // Unclosed tags: the (empty) remainder degrades and all
                    // open scopes close at the end of the content.
                    let src_len = self.src.len();
                    return self.bail(src_len);
                }
                return self.finish();
            };
            let tag_start = pos + rel;
            self.emit(pos, tag_start);

            let Some(body_len) = self.src[tag_start + 1..].find(']') else {
                return self.bail(tag_start);
            };
            let body = &self.src[tag_start + 1..tag_start + 1 + body_len];
            let after = tag_start + body_len + 2;

            if let Some(name) = body.strip_prefix('/') {
                if self.stack.last().is_some_and(|tag| tag.name() == name) {
                    let tag = self.stack.pop().unwrap();
                    self.close(tag);
                } else if is_recognized_tag(name) {
                    // Close without a matching open, or out of LIFO order.
                    return self.bail(tag_start);
                } else {
                    self.emit(tag_start, after);
                }
            } else {
                match self.open(body) {
                    TagResult::Opened => {}
                    // Not a recognized tag: keep it as literal text.
                    TagResult::Unknown => self.emit(tag_start, after),
                    TagResult::Malformed => return self.bail(tag_start),
                }
            }
            pos = after;
        }
    }

    /// Copies `src[start..end]` through to the content.
    fn emit(&mut self, start: usize, end: usize) {
        self.out.push_str(&self.src[start..end]);
        self.map.extend((start..end).map(|i| i as u32));
    }

    fn open(&mut self, body: &str) -> TagResult {
        let at = self.out.len();
        match body {
            "b" => {
                let font = Font {
                    weight: FontWeight::BOLD,
                    ..*self.fonts.current_value()
                };
                self.fonts.push(at, font);
                self.stack.push(TagKind::Bold);
            }
            "i" => {
                let font = Font {
                    style: FontStyle::Italic,
                    ..*self.fonts.current_value()
                };
                self.fonts.push(at, font);
                self.stack.push(TagKind::Italic);
            }
            "u" => {
                self.underline.push(at, true);
                self.stack.push(TagKind::Underline);
            }
            "s" => {
                self.strikethrough.push(at, true);
                self.stack.push(TagKind::Strikethrough);
            }
            _ => {
                if let Some(value) = body.strip_prefix("color=") {
                    let Some(color) = parse_hex_color(value) else {
                        return TagResult::Malformed;
                    };
                    self.colors.push(at, color);
                    self.stack.push(TagKind::Color);
                } else if let Some(name) = body.strip_prefix("font=") {
                    let Some(family) = typecase::get_family(name) else {
                        return TagResult::Malformed;
                    };
                    let font = Font {
                        family,
                        ..*self.fonts.current_value()
                    };
                    self.fonts.push(at, font);
                    self.stack.push(TagKind::Font);
                } else if let Some(value) = body.strip_prefix("stroke=") {
                    let Some(stroke) = parse_stroke(value) else {
                        return TagResult::Malformed;
                    };
                    self.strokes.push(at, stroke);
                    self.stack.push(TagKind::Stroke);
                } else {
                    return TagResult::Unknown;
                }
            }
        }
        TagResult::Opened
    }

    fn close(&mut self, tag: TagKind) {
        let at = self.out.len();
        match tag {
            TagKind::Bold | TagKind::Italic | TagKind::Font => self.fonts.pop(at),
            TagKind::Underline => self.underline.pop(at),
            TagKind::Strikethrough => self.strikethrough.pop(at),
            TagKind::Color => self.colors.pop(at),
            TagKind::Stroke => self.strokes.pop(at),
        }
    }

    /// Error recovery: the rest of the source is literal content and every
    /// open scope closes where it stands, so the suffix renders with default
    /// formatting.
    fn bail(mut self, from: usize) -> FormattingRuns {
        while let Some(tag) = self.stack.pop() {
            self.close(tag);
        }
        self.emit(from, self.src.len());
        self.finish()
    }

    fn finish(mut self) -> FormattingRuns {
        let len = self.out.len();
        self.fonts.pop(len);
        self.colors.pop(len);
        self.strokes.pop(len);
        self.underline.pop(len);
        self.strikethrough.pop(len);
        FormattingRuns {
            fonts: self.fonts.finish(),
            colors: self.colors.finish(),
            strokes: self.strokes.finish(),
            underline: self.underline.finish(),
            strikethrough: self.strikethrough.finish(),
            content: self.out,
            source_map: Some(self.map),
        }
    }
}

enum TagResult {
    Opened,
    Unknown,
    Malformed,
}

fn is_recognized_tag(name: &str) -> bool {
    matches!(name, "b" | "i" | "u" | "s" | "color" | "font" | "stroke")
}

fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let rgb = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::from_rgb8(
        (rgb >> 16) as u8,
        (rgb >> 8) as u8,
        rgb as u8,
    ))
}

fn parse_stroke(value: &str) -> Option<StrokeState> {
    let mut parts = value.splitn(3, ':');
    let thickness: u8 = parts.next()?.parse().ok()?;
    let joins = match parts.next()? {
        "round" => StrokeJoins::Round,
        "bevel" => StrokeJoins::Bevel,
        "miter" => StrokeJoins::Miter,
        _ => return None,
    };
    let color = parse_hex_color(parts.next()?)?;
    Some(StrokeState {
        color,
        thickness,
        joins,
    })
}

bitflags! {
    /// Formatting transitions reported by [`FormattingIterator::advance_to`].
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct FormatEvent: u8 {
        const STRIKETHROUGH_BEGIN = 1;
        const STRIKETHROUGH_END = 2;
        const UNDERLINE_BEGIN = 4;
        const UNDERLINE_END = 8;
    }
}

/// Walks formatting runs glyph by glyph, in either direction, reporting
/// underline and strikethrough segment boundaries.
///
/// A color change inside an active segment ends it and begins a new one so
/// decoration rectangles stay single-colored.
pub struct FormattingIterator<'a> {
    fmt: &'a FormattingRuns,
    color_run: usize,
    stroke_run: usize,
    strikethrough_run: usize,
    underline_run: usize,
    color: Color,
    prev_color: Color,
    strikethrough: bool,
    underline: bool,
}

impl<'a> FormattingIterator<'a> {
    pub fn new(fmt: &'a FormattingRuns, char_index: usize) -> Self {
        let color_run = run_index_clamped(&fmt.colors, char_index);
        Self {
            fmt,
            color_run,
            stroke_run: run_index_clamped(&fmt.strokes, char_index),
            strikethrough_run: run_index_clamped(&fmt.strikethrough, char_index),
            underline_run: run_index_clamped(&fmt.underline, char_index),
            color: *fmt.colors.value_of_run(color_run),
            prev_color: *fmt.colors.value_of_run(color_run),
            strikethrough: false,
            underline: false,
        }
    }

    pub fn advance_to(&mut self, char_index: usize) -> FormatEvent {
        self.stroke_run = advance_run(&self.fmt.strokes, self.stroke_run, char_index);
        self.color_run = advance_run(&self.fmt.colors, self.color_run, char_index);
        self.strikethrough_run =
            advance_run(&self.fmt.strikethrough, self.strikethrough_run, char_index);
        self.underline_run = advance_run(&self.fmt.underline, self.underline_run, char_index);

        let color = *self.fmt.colors.value_of_run(self.color_run);
        let strikethrough = *self.fmt.strikethrough.value_of_run(self.strikethrough_run);
        let underline = *self.fmt.underline.value_of_run(self.underline_run);
        let color_changed = color != self.color;

        let mut event = FormatEvent::empty();
        event.set(
            FormatEvent::STRIKETHROUGH_BEGIN,
            strikethrough && (!self.strikethrough || color_changed),
        );
        event.set(
            FormatEvent::STRIKETHROUGH_END,
            (!strikethrough && self.strikethrough) || (strikethrough && color_changed),
        );
        event.set(
            FormatEvent::UNDERLINE_BEGIN,
            underline && (!self.underline || color_changed),
        );
        event.set(
            FormatEvent::UNDERLINE_END,
            (!underline && self.underline) || (underline && color_changed),
        );

        self.prev_color = self.color;
        self.color = color;
        self.strikethrough = strikethrough;
        self.underline = underline;
        event
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn prev_color(&self) -> Color {
        self.prev_color
    }

    pub fn stroke(&self) -> StrokeState {
        *self.fmt.strokes.value_of_run(self.stroke_run)
    }

    pub fn has_strikethrough(&self) -> bool {
        self.strikethrough
    }

    pub fn has_underline(&self) -> bool {
        self.underline
    }
}

fn run_index_clamped<T>(runs: &RunArray<T>, index: usize) -> usize {
    runs.run_index_at(index)
        .min(runs.run_count().saturating_sub(1))
}

/// Moves a run index to the run covering `char_index`, in either direction.
fn advance_run<T>(runs: &RunArray<T>, mut run_index: usize, char_index: usize) -> usize {
    while run_index + 1 < runs.run_count() && char_index >= runs.limit_of_run(run_index) {
        run_index += 1;
    }
    while run_index > 0 && char_index < runs.limit_of_run(run_index - 1) {
        run_index -= 1;
    }
    run_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use typecase::FamilyId;

    fn base_font() -> Font {
        Font::new(FamilyId::default(), FontWeight::REGULAR, FontStyle::Normal, 16)
    }

    fn parse(text: &str) -> FormattingRuns {
        parse_inline(text, base_font(), Color::BLACK, StrokeState::default())
    }

    #[test]
    fn plain_text_passes_through() {
        let runs = parse("hello world");
        assert_eq!(runs.content, "hello world");
        assert_eq!(runs.fonts.run_count(), 1);
        assert_eq!(runs.fonts.limit(), 11);
        assert_eq!(runs.source_map.as_deref(), Some(&(0..11).collect::<Vec<u32>>()[..]));
    }

    #[test]
    fn bold_and_italic_change_font_runs() {
        let runs = parse("ab[b]cd[i]ef[/i][/b]gh");
        assert_eq!(runs.content, "abcdefgh");
        assert_eq!(runs.fonts.limits(), &[2, 4, 6, 8]);
        assert_eq!(runs.fonts.value_at(0).weight, FontWeight::REGULAR);
        assert_eq!(runs.fonts.value_at(2).weight, FontWeight::BOLD);
        let nested = runs.fonts.value_at(4);
        assert_eq!(nested.weight, FontWeight::BOLD);
        assert_eq!(nested.style, FontStyle::Italic);
        assert_eq!(runs.fonts.value_at(6).weight, FontWeight::REGULAR);
    }

    #[test]
    fn color_tag_parses_hex() {
        let runs = parse("a[color=#FF8000]b[/color]c");
        assert_eq!(runs.content, "abc");
        assert_eq!(*runs.colors.value_at(1), Color::from_rgb8(255, 128, 0));
        assert_eq!(*runs.colors.value_at(2), Color::BLACK);
    }

    #[test]
    fn underline_and_strikethrough_runs() {
        let runs = parse("[u]ab[s]cd[/s][/u]");
        assert_eq!(runs.content, "abcd");
        assert!(*runs.underline.value_at(0));
        assert!(*runs.underline.value_at(3));
        assert!(!*runs.strikethrough.value_at(1));
        assert!(*runs.strikethrough.value_at(2));
    }

    #[test]
    fn stroke_tag_parses_parts() {
        let runs = parse("[stroke=2:miter:#102030]x[/stroke]");
        let stroke = runs.strokes.value_at(0);
        assert_eq!(stroke.thickness, 2);
        assert_eq!(stroke.joins, StrokeJoins::Miter);
        assert_eq!(stroke.color, Color::from_rgb8(0x10, 0x20, 0x30));
        assert!(stroke.is_visible());
    }

    #[test]
    fn unknown_tags_stay_verbatim() {
        let runs = parse("a[blink]b[/blink]c");
        assert_eq!(runs.content, "a[blink]b[/blink]c");
        assert_eq!(runs.fonts.run_count(), 1);
    }

    #[test]
    fn source_map_tracks_stripped_tags() {
        let runs = parse("ab[b]cd[/b]");
        let map = runs.source_map.unwrap();
        assert_eq!(map, vec![0, 1, 5, 6]);
    }

    #[test]
    fn malformed_suffix_degrades_to_literal_text() {
        // The close tag does not match the open tag, so everything from the
        // offending tag onward is literal and the open scope is closed.
        let runs = parse("ab[b]cd[/i]ef");
        assert_eq!(runs.content, "abcd[/i]ef");
        assert_eq!(*runs.fonts.value_at(2), Font {
            weight: FontWeight::BOLD,
            ..base_font()
        });
        assert_eq!(runs.fonts.value_at(4).weight, FontWeight::REGULAR);
    }

    #[test]
    fn bad_color_degrades() {
        let runs = parse("x[color=#12]y");
        assert_eq!(runs.content, "x[color=#12]y");
        assert_eq!(runs.colors.run_count(), 1);
    }

    #[test]
    fn unclosed_tag_keeps_prefix_formatting() {
        let runs = parse("ab[u]cd");
        assert_eq!(runs.content, "abcd");
        assert!(!*runs.underline.value_at(1));
        assert!(*runs.underline.value_at(2));
    }

    #[test]
    fn formatting_iterator_reports_segments() {
        let runs = parse("a[u]bc[/u]d");
        let mut iter = FormattingIterator::new(&runs, 0);
        assert_eq!(iter.advance_to(0), FormatEvent::empty());
        assert_eq!(iter.advance_to(1), FormatEvent::UNDERLINE_BEGIN);
        assert_eq!(iter.advance_to(2), FormatEvent::empty());
        assert!(iter.has_underline());
        assert_eq!(iter.advance_to(3), FormatEvent::UNDERLINE_END);
        assert!(!iter.has_underline());
    }

    #[test]
    fn all_runs_share_content_limit() {
        let runs = parse("a[b]b[/b][u]c[/u]");
        let len = runs.content.len();
        assert_eq!(runs.fonts.limit(), len);
        assert_eq!(runs.colors.limit(), len);
        assert_eq!(runs.strokes.limit(), len);
        assert_eq!(runs.underline.limit(), len);
        assert_eq!(runs.strikethrough.limit(), len);
    }
}
