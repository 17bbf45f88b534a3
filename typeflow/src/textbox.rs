// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The editable text box core: caret and selection state, input handling,
//! and production of the final rectangle list.

use bitflags::bitflags;
use core::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;
use typecase::Font;

use crate::atlas::{GlyphAtlas, Pipeline, Rect, TextureId};
use crate::cursor::{CaretPixel, CursorPosition};
use crate::editing;
use crate::input::{Clipboard, Key, KeyAction, Mods, MouseAction, MouseButton};
use crate::layout::{LayoutFlags, ParagraphLayout};
use crate::markup::{self, FormatEvent, FormattingIterator, FormattingRuns};
use crate::style::{Color, StrokeState, TextXAlign, TextYAlign};

/// Maximum delay between clicks that still accumulates, in seconds.
pub const DOUBLE_CLICK_TIME: f64 = 0.5;

const SELECTION_COLOR: Color = Color::from_rgb8(0, 120, 215);
const DEBUG_COLOR: Color = Color::from_rgba8(0, 128, 0, 255);

/// Unique identifier for a text box.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct TextBoxId(u64);

impl TextBoxId {
    fn new() -> Self {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    /// Debug overlays drawn into the rectangle list.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct DebugOverlay: u8 {
        /// Outline each visual run's extent.
        const RUN_OUTLINES = 1;
        /// Mark every glyph boundary within a run.
        const GLYPH_BOUNDS = 2;
    }
}

/// Process-wide text system state: the focused box, click accumulation, the
/// caret's pixel position, and the platform services every box shares.
///
/// All boxes on the UI thread take the system by mutable reference; it is
/// the owner of the glyph atlas and the clipboard.
pub struct TextSystem {
    atlas: Box<dyn GlyphAtlas>,
    clipboard: Box<dyn Clipboard>,
    focused: Option<TextBoxId>,
    mouse_down: bool,
    last_click_time: f64,
    click_count: u32,
    last_click_pos: CursorPosition,
    caret: CaretPixel,
}

impl TextSystem {
    pub fn new(atlas: Box<dyn GlyphAtlas>, clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            atlas,
            clipboard,
            focused: None,
            mouse_down: false,
            last_click_time: 0.0,
            click_count: 0,
            last_click_pos: CursorPosition::INVALID,
            caret: CaretPixel::default(),
        }
    }

    pub fn focused(&self) -> Option<TextBoxId> {
        self.focused
    }

    /// Pixel-space caret of the focused box, from its last layout pass.
    pub fn caret(&self) -> CaretPixel {
        self.caret
    }
}

enum PostLayoutKind {
    LineStart,
    LineEnd,
    LineAbove,
    LineBelow,
    MouseTo { x: f32, y: f32 },
}

/// A cursor movement that needs a fresh layout to resolve, applied after
/// the layout pass inside `recalc`.
struct PostLayoutOp {
    kind: PostLayoutKind,
    selecting: bool,
}

/// An editable, rich-text-capable text box.
///
/// Every mutating operation re-runs the full pipeline (markup → font
/// resolution → shaping → line breaking → rect emission) before returning;
/// the result is readable from [`rects`](Self::rects).
pub struct TextBox {
    id: TextBoxId,
    text: String,
    content_text: String,
    font: Option<Font>,
    text_color: Color,
    position: [f32; 2],
    size: [f32; 2],
    x_align: TextXAlign,
    y_align: TextYAlign,
    wrapped: bool,
    multi_line: bool,
    rich_text: bool,
    editable: bool,
    debug_overlay: DebugOverlay,
    cursor: CursorPosition,
    selection_start: CursorPosition,
    rects: Vec<Rect>,
}

impl TextBox {
    pub fn new() -> Self {
        Self {
            id: TextBoxId::new(),
            text: String::new(),
            content_text: String::new(),
            font: None,
            text_color: Color::BLACK,
            position: [0.0; 2],
            size: [0.0; 2],
            x_align: TextXAlign::Left,
            y_align: TextYAlign::Top,
            wrapped: false,
            multi_line: false,
            rich_text: false,
            editable: false,
            debug_overlay: DebugOverlay::empty(),
            cursor: CursorPosition::default(),
            selection_start: CursorPosition::INVALID,
            rects: Vec::new(),
        }
    }

    pub fn id(&self) -> TextBoxId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The rectangle list produced by the last layout pass, positioned
    /// relative to the box origin.
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn cursor_position(&self) -> CursorPosition {
        self.cursor
    }

    /// The active selection as an ordered byte range, if any.
    pub fn selection(&self) -> Option<(usize, usize)> {
        if !self.selection_start.is_valid() || self.selection_start == self.cursor {
            return None;
        }
        let a = self.selection_start.index as usize;
        let b = self.cursor.index as usize;
        Some((a.min(b), a.max(b)))
    }

    pub fn is_focused(&self, sys: &TextSystem) -> bool {
        sys.focused == Some(self.id)
    }

    pub fn is_mouse_inside(&self, x: f32, y: f32) -> bool {
        x >= self.position[0]
            && y >= self.position[1]
            && x - self.position[0] <= self.size[0]
            && y - self.position[1] <= self.size[1]
    }

    // --- Focus ---

    pub fn capture_focus(&mut self, sys: &mut TextSystem) {
        if sys.focused == Some(self.id) {
            return;
        }
        sys.focused = Some(self.id);
        sys.click_count = 0;
        sys.last_click_pos = CursorPosition::INVALID;
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn release_focus(&mut self, sys: &mut TextSystem) {
        if sys.focused != Some(self.id) {
            return;
        }
        sys.focused = None;
        sys.mouse_down = false;
        sys.click_count = 0;
        sys.last_click_pos = CursorPosition::INVALID;
        self.selection_start = CursorPosition::INVALID;
        self.recalc_text(sys);
    }

    /// Editable boxes suppress inline markup while focused, so the caret
    /// works on the raw text the user is editing.
    fn focused_rich_text(&self) -> bool {
        self.rich_text && !self.editable
    }

    /// The string the caret navigates: what the last layout was built from.
    fn nav_text(&self) -> &str {
        if self.focused_rich_text() {
            &self.content_text
        } else {
            &self.text
        }
    }

    // --- Input events ---

    /// Handles a mouse button event at box-relative time `time` (seconds).
    /// Returns whether the event landed inside the box.
    pub fn handle_mouse_button(
        &mut self,
        sys: &mut TextSystem,
        button: MouseButton,
        action: MouseAction,
        mods: Mods,
        x: f32,
        y: f32,
        time: f64,
    ) -> bool {
        if button != MouseButton::Left {
            return false;
        }
        let inside = self.is_mouse_inside(x, y);

        match action {
            MouseAction::Press => {
                if self.is_focused(sys) {
                    if !inside {
                        self.release_focus(sys);
                        return false;
                    }
                    self.cursor_move_to_mouse(
                        sys,
                        x - self.position[0],
                        y - self.position[1],
                        mods.contains(Mods::SHIFT),
                    );

                    if self.cursor == sys.last_click_pos
                        && time - sys.last_click_time <= DOUBLE_CLICK_TIME
                    {
                        sys.click_count += 1;
                    } else {
                        sys.click_count = 0;
                    }
                    sys.last_click_time = time;
                    sys.last_click_pos = self.cursor;

                    match sys.click_count % 4 {
                        // Select the word under the cursor.
                        1 => {
                            self.cursor_move_to_prev_word(sys, false);
                            self.cursor_move_to_next_word(sys, true);
                        }
                        // Select the line under the cursor.
                        2 => {
                            self.cursor_move_to_line_start(sys, false);
                            self.cursor_move_to_line_end(sys, true);
                        }
                        // Select the whole text.
                        3 => {
                            self.cursor_move_to_text_start(sys, false);
                            self.cursor_move_to_text_end(sys, true);
                        }
                        _ => {}
                    }
                } else if inside {
                    self.capture_focus(sys);
                    self.cursor_move_to_mouse(
                        sys,
                        x - self.position[0],
                        y - self.position[1],
                        mods.contains(Mods::SHIFT),
                    );
                } else {
                    return false;
                }
                sys.mouse_down = true;
                inside
            }
            MouseAction::Release => {
                if self.is_focused(sys) {
                    sys.mouse_down = false;
                }
                false
            }
        }
    }

    pub fn handle_mouse_move(&mut self, sys: &mut TextSystem, x: f32, y: f32) -> bool {
        if self.is_focused(sys) && sys.mouse_down {
            self.cursor_move_to_mouse(
                sys,
                x - self.position[0],
                y - self.position[1],
                true,
            );
        }
        false
    }

    pub fn handle_key_press(
        &mut self,
        sys: &mut TextSystem,
        key: Key,
        action: KeyAction,
        mods: Mods,
    ) -> bool {
        if action == KeyAction::Release || !self.is_focused(sys) {
            return false;
        }
        let selecting = mods.contains(Mods::SHIFT);
        let ctrl = mods.contains(Mods::CONTROL);

        match key {
            Key::Up => self.cursor_move_to_prev_line(sys, selecting),
            Key::Down => self.cursor_move_to_next_line(sys, selecting),
            Key::Left => {
                if ctrl {
                    self.cursor_move_to_prev_word(sys, selecting);
                } else {
                    self.cursor_move_to_prev_character(sys, selecting);
                }
            }
            Key::Right => {
                if ctrl {
                    self.cursor_move_to_next_word(sys, selecting);
                } else {
                    self.cursor_move_to_next_character(sys, selecting);
                }
            }
            Key::Home => {
                if ctrl {
                    self.cursor_move_to_text_start(sys, selecting);
                } else {
                    self.cursor_move_to_line_start(sys, selecting);
                }
            }
            Key::End => {
                if ctrl {
                    self.cursor_move_to_text_end(sys, selecting);
                } else {
                    self.cursor_move_to_line_end(sys, selecting);
                }
            }
            Key::Backspace => self.handle_key_backspace(sys, ctrl),
            Key::Delete => self.handle_key_delete(sys, ctrl),
            Key::Enter => self.handle_key_enter(sys),
            Key::Char('x') | Key::Char('X') if ctrl => self.clipboard_cut_text(sys),
            Key::Char('c') | Key::Char('C') if ctrl => self.clipboard_copy_text(sys),
            Key::Char('v') | Key::Char('V') if ctrl => self.clipboard_paste_text(sys),
            Key::Char(_) => {}
        }
        true
    }

    pub fn handle_text_input(&mut self, sys: &mut TextSystem, codepoint: char) -> bool {
        if !self.is_focused(sys) || !self.editable {
            return false;
        }
        if self.selection_start.is_valid() {
            self.remove_highlighted_text(sys);
        }
        let mut buffer = [0u8; 4];
        let s = codepoint.encode_utf8(&mut buffer);
        let at = self.cursor.index as usize;
        self.insert_text(sys, s, at);
        true
    }

    // --- Cursor navigation ---

    pub fn cursor_move_to_next_character(&mut self, sys: &mut TextSystem, selecting: bool) {
        if let Some(next) = editing::next_grapheme(self.nav_text(), self.cursor.index as usize) {
            self.set_cursor_internal(CursorPosition::new(next as u32), selecting);
        }
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn cursor_move_to_prev_character(&mut self, sys: &mut TextSystem, selecting: bool) {
        if let Some(prev) = editing::prev_grapheme(self.nav_text(), self.cursor.index as usize) {
            self.set_cursor_internal(CursorPosition::new(prev as u32), selecting);
        }
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn cursor_move_to_next_word(&mut self, sys: &mut TextSystem, selecting: bool) {
        let next = editing::next_word(self.nav_text(), self.cursor.index as usize);
        self.set_cursor_internal(CursorPosition::new(next as u32), selecting);
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn cursor_move_to_prev_word(&mut self, sys: &mut TextSystem, selecting: bool) {
        let prev = editing::prev_word(self.nav_text(), self.cursor.index as usize);
        self.set_cursor_internal(CursorPosition::new(prev as u32), selecting);
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn cursor_move_to_next_line(&mut self, sys: &mut TextSystem, selecting: bool) {
        self.recalc_post_layout(sys, PostLayoutKind::LineBelow, selecting);
    }

    pub fn cursor_move_to_prev_line(&mut self, sys: &mut TextSystem, selecting: bool) {
        self.recalc_post_layout(sys, PostLayoutKind::LineAbove, selecting);
    }

    pub fn cursor_move_to_line_start(&mut self, sys: &mut TextSystem, selecting: bool) {
        self.recalc_post_layout(sys, PostLayoutKind::LineStart, selecting);
    }

    pub fn cursor_move_to_line_end(&mut self, sys: &mut TextSystem, selecting: bool) {
        self.recalc_post_layout(sys, PostLayoutKind::LineEnd, selecting);
    }

    pub fn cursor_move_to_text_start(&mut self, sys: &mut TextSystem, selecting: bool) {
        self.set_cursor_internal(CursorPosition::default(), selecting);
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn cursor_move_to_text_end(&mut self, sys: &mut TextSystem, selecting: bool) {
        let end = self.nav_text().len() as u32;
        self.set_cursor_internal(CursorPosition::new(end), selecting);
        self.recalc_internal(sys, self.focused_rich_text(), None);
    }

    pub fn cursor_move_to_mouse(&mut self, sys: &mut TextSystem, x: f32, y: f32, selecting: bool) {
        self.recalc_post_layout(sys, PostLayoutKind::MouseTo { x, y }, selecting);
    }

    fn recalc_post_layout(&mut self, sys: &mut TextSystem, kind: PostLayoutKind, selecting: bool) {
        let op = PostLayoutOp { kind, selecting };
        self.recalc_internal(sys, self.focused_rich_text(), Some(op));
    }

    fn set_cursor_internal(&mut self, pos: CursorPosition, selecting: bool) {
        if selecting {
            if !self.selection_start.is_valid() {
                self.selection_start = self.cursor;
            }
        } else {
            self.selection_start = CursorPosition::INVALID;
        }
        self.cursor = pos;
    }

    // --- Edit operations ---

    fn handle_key_backspace(&mut self, sys: &mut TextSystem, ctrl: bool) {
        if !self.editable {
            return;
        }
        if self.selection_start.is_valid() {
            self.remove_highlighted_text(sys);
        } else if self.cursor.index > 0 {
            let end = self.cursor.index as usize;
            if ctrl {
                self.cursor_move_to_prev_word(sys, false);
            } else {
                self.cursor_move_to_prev_character(sys, false);
            }
            self.remove_text(sys, self.cursor.index as usize, end);
        }
    }

    fn handle_key_delete(&mut self, sys: &mut TextSystem, ctrl: bool) {
        if !self.editable {
            return;
        }
        if self.selection_start.is_valid() {
            self.remove_highlighted_text(sys);
        } else if (self.cursor.index as usize) < self.text.len() {
            let start = self.cursor;
            if ctrl {
                self.cursor_move_to_next_word(sys, false);
            } else {
                self.cursor_move_to_next_character(sys, false);
            }
            let end = self.cursor.index as usize;
            self.cursor = start;
            self.remove_text(sys, start.index as usize, end);
        }
    }

    fn handle_key_enter(&mut self, sys: &mut TextSystem) {
        if self.multi_line {
            if !self.editable {
                return;
            }
            self.remove_highlighted_text(sys);
            let at = self.cursor.index as usize;
            self.insert_text(sys, "\n", at);
        } else {
            self.release_focus(sys);
        }
    }

    pub fn clipboard_cut_text(&mut self, sys: &mut TextSystem) {
        if !self.editable {
            return;
        }
        self.clipboard_copy_text(sys);
        self.remove_highlighted_text(sys);
    }

    pub fn clipboard_copy_text(&mut self, sys: &mut TextSystem) {
        let Some((start, end)) = self.selection() else {
            return;
        };
        let selected = self.nav_text()[start..end].to_owned();
        sys.clipboard.set_text(&selected);
    }

    pub fn clipboard_paste_text(&mut self, sys: &mut TextSystem) {
        if !self.editable {
            return;
        }
        self.remove_highlighted_text(sys);
        let pasted = sys.clipboard.get_text();
        let at = self.cursor.index as usize;
        self.insert_text(sys, &pasted, at);
    }

    /// Inserts `s` at byte index `at` and advances the cursor past it.
    pub fn insert_text(&mut self, sys: &mut TextSystem, s: &str, at: usize) {
        self.cursor = CursorPosition::new(self.cursor.index + s.len() as u32);
        let mut new_text = String::with_capacity(self.text.len() + s.len());
        if at < self.text.len() {
            new_text.push_str(&self.text[..at]);
            new_text.push_str(s);
            new_text.push_str(&self.text[at..]);
        } else {
            new_text.push_str(&self.text);
            new_text.push_str(s);
        }
        self.set_text(sys, new_text);
    }

    /// Removes the byte range `[start, end)`.
    pub fn remove_text(&mut self, sys: &mut TextSystem, start: usize, end: usize) {
        let mut new_text = String::with_capacity(self.text.len());
        new_text.push_str(&self.text[..start]);
        new_text.push_str(&self.text[end..]);
        self.set_text(sys, new_text);
    }

    pub fn remove_highlighted_text(&mut self, sys: &mut TextSystem) {
        let Some((start, end)) = self.selection() else {
            return;
        };
        self.cursor = CursorPosition::new(start as u32);
        self.selection_start = CursorPosition::INVALID;
        self.remove_text(sys, start, end);
    }

    // --- Setters; each re-runs the pipeline ---

    pub fn set_font(&mut self, sys: &mut TextSystem, font: Font) {
        self.font = Some(font);
        self.recalc_text(sys);
    }

    pub fn set_text(&mut self, sys: &mut TextSystem, text: String) {
        self.text = text;
        self.recalc_text(sys);
    }

    pub fn set_text_color(&mut self, sys: &mut TextSystem, color: Color) {
        self.text_color = color;
        self.recalc_text(sys);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = [x, y];
    }

    pub fn set_size(&mut self, sys: &mut TextSystem, width: f32, height: f32) {
        self.size = [width, height];
        self.recalc_text(sys);
    }

    pub fn set_text_x_alignment(&mut self, sys: &mut TextSystem, align: TextXAlign) {
        self.x_align = align;
        self.recalc_text(sys);
    }

    pub fn set_text_y_alignment(&mut self, sys: &mut TextSystem, align: TextYAlign) {
        self.y_align = align;
        self.recalc_text(sys);
    }

    pub fn set_text_wrapped(&mut self, sys: &mut TextSystem, wrapped: bool) {
        self.wrapped = wrapped;
        self.recalc_text(sys);
    }

    pub fn set_multi_line(&mut self, multi_line: bool) {
        self.multi_line = multi_line;
    }

    pub fn set_rich_text(&mut self, sys: &mut TextSystem, rich_text: bool) {
        self.rich_text = rich_text;
        self.recalc_text(sys);
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    pub fn set_debug_overlay(&mut self, sys: &mut TextSystem, overlay: DebugOverlay) {
        self.debug_overlay = overlay;
        self.recalc_text(sys);
    }

    // --- Layout and rect emission ---

    pub fn recalc_text(&mut self, sys: &mut TextSystem) {
        let rich = if self.is_focused(sys) {
            self.focused_rich_text()
        } else {
            self.rich_text
        };
        self.recalc_internal(sys, rich, None);
    }

    fn recalc_internal(&mut self, sys: &mut TextSystem, rich: bool, op: Option<PostLayoutOp>) {
        self.rects.clear();
        if self.is_focused(sys) {
            sys.caret = CaretPixel::default();
        }

        let Some(font) = self.font else {
            return;
        };
        trace!(id = self.id.0, rich, len = self.text.len(), "recalc text");

        let info = if rich {
            markup::parse_inline(&self.text, font, self.text_color, StrokeState::default())
        } else {
            markup::default_runs(&self.text, font, self.text_color, StrokeState::default())
        };
        self.content_text = info.content.clone();

        if info.content.is_empty() {
            if self.is_focused(sys) {
                if let Some(data) = typecase::get_face(font)
                    .and_then(|face| typecase::scaled_font(face, font.size))
                {
                    sys.caret.height = data.ascent() + data.descent();
                }
            }
            return;
        }

        self.create_text_rects(sys, &info, op);
    }

    fn create_text_rects(
        &mut self,
        sys: &mut TextSystem,
        info: &FormattingRuns,
        op: Option<PostLayoutOp>,
    ) {
        let text = &info.content;
        let layout = ParagraphLayout::build(
            text,
            &info.fonts,
            if self.wrapped { self.size[0] } else { 0.0 },
            self.size[1],
            self.y_align,
            LayoutFlags::empty(),
        );
        if layout.lines.is_empty() {
            return;
        }
        let text_width = self.size[0];
        let x_align = self.x_align;

        if let Some(op) = op {
            let moved =
                apply_cursor_move(&layout, text_width, x_align, text, &op, sys.caret, self.cursor);
            self.set_cursor_internal(moved, op.selecting);
        }
        if self.is_focused(sys) {
            sys.caret = layout.calc_cursor_pixel_pos(text_width, x_align, self.cursor);
        }

        let selection = self.selection();
        let rects = &mut self.rects;

        // Selection background first, in its own pass so glyph clipping
        // cannot bleed across runs.
        if let Some((sel_start, sel_end)) = selection {
            let default_texture = sys.atlas.default_texture();
            layout.for_each_run(text_width, x_align, |line_index, run_index, line_x, line_y| {
                if layout.run_contains_char_range(run_index, sel_start, sel_end) {
                    let (min_pos, max_pos) =
                        layout.position_range_in_run(run_index, sel_start, sel_end);
                    push_solid(
                        rects,
                        line_x + min_pos,
                        layout.text_start_y + line_y - layout.lines[line_index].ascent,
                        max_pos - min_pos,
                        layout.line_height(line_index),
                        default_texture,
                        SELECTION_COLOR,
                    );
                }
            });
        }

        let default_texture = sys.atlas.default_texture();
        let atlas = &mut sys.atlas;
        layout.for_each_run(text_width, x_align, |_, run_index, line_x, line_y| {
            let run = &layout.runs[run_index];
            let scaled = typecase::scaled_font(run.font.face, run.font.size);

            let clip = selection
                .filter(|(s, e)| layout.run_contains_char_range(run_index, *s, *e))
                .map(|(s, e)| {
                    let (min_pos, max_pos) = layout.position_range_in_run(run_index, s, e);
                    (line_x + min_pos, line_x + max_pos)
                });

            let start_char = if run.rtl { run.char_end } else { run.char_start };
            let mut iter = FormattingIterator::new(info, start_char as usize);

            let first_pos = layout.first_position_index(run_index);
            let first_glyph = layout.first_glyph_index(run_index);
            let mut underline_start = layout.positions[first_pos];
            let mut strikethrough_start = underline_start;

            for g in first_glyph..run.glyph_end as usize {
                let pen_x = layout.positions[first_pos + 2 * (g - first_glyph)];
                let pen_y = layout.positions[first_pos + 2 * (g - first_glyph) + 1];
                let glyph_id = layout.glyphs[g];
                let event = iter.advance_to(layout.char_indices[g] as usize);
                let stroke = iter.stroke();

                // Stroke outline sits behind the glyph.
                if stroke.is_visible() {
                    let stroke_info =
                        atlas.stroke_info(run.font, glyph_id, stroke.thickness, stroke.joins);
                    push_clipped(
                        rects,
                        line_x + pen_x + stroke_info.offset[0],
                        layout.text_start_y + line_y + pen_y + stroke_info.offset[1],
                        stroke_info.size[0],
                        stroke_info.size[1],
                        stroke_info.uv,
                        stroke_info.texture,
                        stroke.color,
                        Pipeline::Msdf,
                        clip,
                    );
                }

                // Underline segments close before the glyph that ends them.
                if let Some(data) = &scaled {
                    if event.contains(FormatEvent::UNDERLINE_END) {
                        push_clipped(
                            rects,
                            line_x + underline_start,
                            layout.text_start_y + line_y + data.underline_position(),
                            pen_x - underline_start,
                            data.underline_thickness() + 0.5,
                            [0.0, 0.0, 1.0, 1.0],
                            default_texture,
                            iter.prev_color(),
                            Pipeline::Rect,
                            clip,
                        );
                    }
                    if event.contains(FormatEvent::UNDERLINE_BEGIN) {
                        underline_start = pen_x;
                    }
                }

                // Main glyph.
                let glyph_info = atlas.glyph_info(run.font, glyph_id);
                let color = if glyph_info.has_color {
                    Color::WHITE
                } else {
                    iter.color()
                };
                push_clipped(
                    rects,
                    line_x + pen_x + glyph_info.offset[0],
                    layout.text_start_y + line_y + pen_y + glyph_info.offset[1],
                    glyph_info.size[0],
                    glyph_info.size[1],
                    glyph_info.uv,
                    glyph_info.texture,
                    color,
                    Pipeline::Msdf,
                    clip,
                );

                // Strikethrough sits over the glyph.
                if let Some(data) = &scaled {
                    if event.contains(FormatEvent::STRIKETHROUGH_END) {
                        push_clipped(
                            rects,
                            line_x + strikethrough_start,
                            layout.text_start_y + line_y + data.strikethrough_position(),
                            pen_x - strikethrough_start,
                            data.strikethrough_thickness() + 0.5,
                            [0.0, 0.0, 1.0, 1.0],
                            default_texture,
                            iter.prev_color(),
                            Pipeline::Rect,
                            clip,
                        );
                    }
                    if event.contains(FormatEvent::STRIKETHROUGH_BEGIN) {
                        strikethrough_start = pen_x;
                    }
                }
            }

            // Close any decoration still open at the run's end.
            if let Some(data) = &scaled {
                let trailing =
                    layout.positions[first_pos + 2 * (run.glyph_end as usize - first_glyph)];
                if iter.has_strikethrough() {
                    push_clipped(
                        rects,
                        line_x + strikethrough_start,
                        layout.text_start_y + line_y + data.strikethrough_position(),
                        trailing - strikethrough_start,
                        data.strikethrough_thickness() + 0.5,
                        [0.0, 0.0, 1.0, 1.0],
                        default_texture,
                        iter.color(),
                        Pipeline::Rect,
                        clip,
                    );
                }
                if iter.has_underline() {
                    push_clipped(
                        rects,
                        line_x + underline_start,
                        layout.text_start_y + line_y + data.underline_position(),
                        trailing - underline_start,
                        data.underline_thickness() + 0.5,
                        [0.0, 0.0, 1.0, 1.0],
                        default_texture,
                        iter.color(),
                        Pipeline::Rect,
                        clip,
                    );
                }
            }
        });

        if self.debug_overlay.contains(DebugOverlay::RUN_OUTLINES) {
            layout.for_each_run(text_width, x_align, |line_index, run_index, line_x, line_y| {
                let positions = layout.run_positions(run_index);
                let min_bound = positions[0];
                let max_bound = positions[2 * layout.run_glyph_count(run_index)];
                push_outline(
                    rects,
                    line_x + min_bound,
                    layout.text_start_y + line_y - layout.lines[line_index].ascent,
                    max_bound - min_bound,
                    layout.line_height(line_index),
                    default_texture,
                );
            });
        }

        if self.debug_overlay.contains(DebugOverlay::GLYPH_BOUNDS) {
            layout.for_each_run(text_width, x_align, |line_index, run_index, line_x, line_y| {
                let positions = layout.run_positions(run_index);
                for i in 0..=layout.run_glyph_count(run_index) {
                    push_outline(
                        rects,
                        line_x + positions[2 * i],
                        layout.text_start_y + line_y - layout.lines[line_index].ascent,
                        0.5,
                        layout.line_height(line_index),
                        default_texture,
                    );
                }
            });
        }
    }

    /// The caret as a 1px rectangle, for renderers that draw it from the
    /// same list.
    pub fn caret_rect(&self, sys: &mut TextSystem) -> Option<Rect> {
        if !self.is_focused(sys) {
            return None;
        }
        let caret = sys.caret;
        Some(Rect {
            x: self.position[0] + caret.x,
            y: self.position[1] + caret.y,
            width: 1.0,
            height: caret.height,
            uv: [0.0, 0.0, 1.0, 1.0],
            texture: sys.atlas.default_texture(),
            color: Color::BLACK,
            pipeline: Pipeline::Rect,
        })
    }
}

impl Default for TextBox {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_cursor_move(
    layout: &ParagraphLayout,
    text_width: f32,
    x_align: TextXAlign,
    text: &str,
    op: &PostLayoutOp,
    caret: CaretPixel,
    cursor: CursorPosition,
) -> CursorPosition {
    match op.kind {
        PostLayoutKind::LineStart => layout.line_start_position(caret.line_number),
        PostLayoutKind::LineEnd => layout.line_end_position(caret.line_number),
        PostLayoutKind::LineAbove => {
            if caret.line_number > 0 {
                layout.find_closest_cursor_position(
                    text_width,
                    x_align,
                    text,
                    caret.line_number - 1,
                    caret.x,
                )
            } else {
                cursor
            }
        }
        PostLayoutKind::LineBelow => {
            if caret.line_number + 1 < layout.line_count() {
                layout.find_closest_cursor_position(
                    text_width,
                    x_align,
                    text,
                    caret.line_number + 1,
                    caret.x,
                )
            } else {
                cursor
            }
        }
        PostLayoutKind::MouseTo { x, y } => {
            let line = layout.closest_line_to_height(y - layout.text_start_y);
            layout.find_closest_cursor_position(text_width, x_align, text, line, x)
        }
    }
}

fn push_solid(
    rects: &mut Vec<Rect>,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    texture: TextureId,
    color: Color,
) {
    rects.push(Rect {
        x,
        y,
        width,
        height,
        uv: [0.0, 0.0, 1.0, 1.0],
        texture,
        color,
        pipeline: Pipeline::Rect,
    });
}

fn push_outline(rects: &mut Vec<Rect>, x: f32, y: f32, width: f32, height: f32, texture: TextureId) {
    rects.push(Rect {
        x,
        y,
        width,
        height,
        uv: [0.0, 0.0, 1.0, 1.0],
        texture,
        color: DEBUG_COLOR,
        pipeline: Pipeline::Outline,
    });
}

/// Emits a rectangle against a horizontal selection clip.
///
/// Outside the clip the rectangle passes through unchanged; inside it turns
/// white so the selection background shows through recolored. A partially
/// covered rectangle splits into up to three slices with proportional UVs;
/// slivers narrower than a pixel merge into their neighbor.
#[allow(clippy::too_many_arguments)]
fn push_clipped(
    rects: &mut Vec<Rect>,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    uv: [f32; 4],
    texture: TextureId,
    color: Color,
    pipeline: Pipeline,
    clip: Option<(f32, f32)>,
) {
    let push = |rects: &mut Vec<Rect>, x: f32, width: f32, uv: [f32; 4], color: Color| {
        rects.push(Rect {
            x,
            y,
            width,
            height,
            uv,
            texture,
            color,
            pipeline,
        });
    };

    let Some((clip_min, clip_max)) = clip else {
        push(rects, x, width, uv, color);
        return;
    };
    // Entirely outside the selection: no split needed.
    if x >= clip_max || x + width <= clip_min {
        push(rects, x, width, uv, color);
        return;
    }

    let mut mid_x = x;
    let mut mid_width = width;
    let mut mid_u = uv[0];
    let mut mid_uw = uv[2];

    // Left of the clip, if at least a pixel survives.
    if clip_min >= x + 1.0 && clip_min < x + width {
        let diff = clip_min - x;
        mid_x += diff;
        mid_width -= diff;
        let uv_diff = uv[2] * diff / width;
        mid_u += uv_diff;
        mid_uw -= uv_diff;
        push(rects, x, diff, [uv[0], uv[1], uv_diff, uv[3]], color);
    }

    // Right of the clip, if at least a pixel survives.
    if clip_max > x && clip_max + 1.0 <= x + width {
        let diff = x + width - clip_max;
        mid_width -= diff;
        let uv_diff = uv[2] * diff / width;
        mid_uw -= uv_diff;
        push(
            rects,
            x + width - diff,
            diff,
            [uv[0] + uv[2] - uv_diff, uv[1], uv_diff, uv[3]],
            color,
        );
    }

    // What intersects the selection renders white.
    push(rects, mid_x, mid_width, [mid_u, uv[1], mid_uw, uv[3]], Color::WHITE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::GlyphInfo;
    use typecase::SingleScriptFont;

    struct NullAtlas;

    impl GlyphAtlas for NullAtlas {
        fn glyph_info(&mut self, _font: SingleScriptFont, _glyph_id: u16) -> GlyphInfo {
            GlyphInfo {
                texture: TextureId(1),
                uv: [0.0, 0.0, 1.0, 1.0],
                size: [8.0, 8.0],
                offset: [0.0, 0.0],
                has_color: false,
            }
        }

        fn stroke_info(
            &mut self,
            font: SingleScriptFont,
            glyph_id: u16,
            _thickness: u8,
            _joins: crate::style::StrokeJoins,
        ) -> GlyphInfo {
            self.glyph_info(font, glyph_id)
        }

        fn default_texture(&mut self) -> TextureId {
            TextureId(0)
        }
    }

    #[derive(Default)]
    struct FakeClipboard(std::rc::Rc<std::cell::RefCell<String>>);

    impl Clipboard for FakeClipboard {
        fn get_text(&mut self) -> String {
            self.0.borrow().clone()
        }

        fn set_text(&mut self, text: &str) {
            *self.0.borrow_mut() = text.to_owned();
        }
    }

    fn system() -> (TextSystem, std::rc::Rc<std::cell::RefCell<String>>) {
        let store = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
        let clipboard = FakeClipboard(store.clone());
        (
            TextSystem::new(Box::new(NullAtlas), Box::new(clipboard)),
            store,
        )
    }

    fn clipped(x: f32, width: f32, clip: Option<(f32, f32)>) -> Vec<Rect> {
        let mut rects = Vec::new();
        push_clipped(
            &mut rects,
            x,
            0.0,
            width,
            10.0,
            [0.0, 0.0, 1.0, 1.0],
            TextureId(1),
            Color::BLACK,
            Pipeline::Msdf,
            clip,
        );
        rects
    }

    #[test]
    fn clip_splits_into_three_proportional_slices() {
        let rects = clipped(100.0, 20.0, Some((105.0, 115.0)));
        assert_eq!(rects.len(), 3);

        let left = &rects[0];
        assert_eq!((left.x, left.width), (100.0, 5.0));
        assert_eq!(left.uv[2], 1.0 * 5.0 / 20.0);
        assert_eq!(left.color, Color::BLACK);

        let right = &rects[1];
        assert_eq!((right.x, right.width), (115.0, 5.0));
        assert_eq!(right.uv[0], 1.0 - 0.25);
        assert_eq!(right.uv[2], 0.25);

        let middle = &rects[2];
        assert_eq!((middle.x, middle.width), (105.0, 10.0));
        assert_eq!(middle.uv[0], 0.25);
        assert_eq!(middle.uv[2], 0.5);
        assert_eq!(middle.color, Color::WHITE);
    }

    #[test]
    fn clip_fully_covering_recolors_white() {
        let rects = clipped(100.0, 20.0, Some((90.0, 130.0)));
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].color, Color::WHITE);
        assert_eq!((rects[0].x, rects[0].width), (100.0, 20.0));
    }

    #[test]
    fn clip_outside_passes_through() {
        let rects = clipped(100.0, 20.0, Some((130.0, 150.0)));
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].color, Color::BLACK);
        let rects = clipped(100.0, 20.0, None);
        assert_eq!(rects.len(), 1);
    }

    #[test]
    fn subpixel_slivers_collapse() {
        // The clip starts half a pixel into the rect: no left sliver.
        let rects = clipped(100.0, 20.0, Some((100.5, 115.0)));
        assert_eq!(rects.len(), 2);
        assert_eq!((rects[0].x, rects[0].width), (115.0, 5.0));
        assert_eq!(rects[1].color, Color::WHITE);
    }

    #[test]
    fn text_input_requires_focus_and_editable() {
        let (mut sys, _) = system();
        let mut text_box = TextBox::new();
        text_box.set_size(&mut sys, 100.0, 20.0);
        text_box.set_editable(true);

        assert!(!text_box.handle_text_input(&mut sys, 'a'));

        text_box.handle_mouse_button(
            &mut sys,
            MouseButton::Left,
            MouseAction::Press,
            Mods::empty(),
            5.0,
            5.0,
            0.0,
        );
        assert!(text_box.is_focused(&sys));
        assert!(text_box.handle_text_input(&mut sys, 'a'));
        assert!(text_box.handle_text_input(&mut sys, 'b'));
        assert_eq!(text_box.text(), "ab");
        assert_eq!(text_box.cursor_position().index, 2);

        text_box.handle_key_press(&mut sys, Key::Backspace, KeyAction::Press, Mods::empty());
        assert_eq!(text_box.text(), "a");
        assert_eq!(text_box.cursor_position().index, 1);
    }

    #[test]
    fn double_click_selects_word() {
        let (mut sys, store) = system();
        let mut text_box = TextBox::new();
        text_box.set_size(&mut sys, 100.0, 20.0);
        text_box.set_editable(true);
        text_box.set_text(&mut sys, "hello world".to_owned());

        let click = |text_box: &mut TextBox, sys: &mut TextSystem, time: f64| {
            text_box.handle_mouse_button(
                sys,
                MouseButton::Left,
                MouseAction::Press,
                Mods::empty(),
                5.0,
                5.0,
                time,
            );
            text_box.handle_mouse_button(
                sys,
                MouseButton::Left,
                MouseAction::Release,
                Mods::empty(),
                5.0,
                5.0,
                time,
            );
        };

        // The first press only captures focus; the next one primes the
        // click accumulator, and the one after counts as a double click.
        click(&mut text_box, &mut sys, 0.0);
        click(&mut text_box, &mut sys, 0.1);
        assert_eq!(text_box.selection(), None);
        click(&mut text_box, &mut sys, 0.2);
        // Word selection runs through the trailing space to the start of
        // the next word, as the word-step rule does.
        assert_eq!(text_box.selection(), Some((0, 6)));

        text_box.handle_key_press(
            &mut sys,
            Key::Char('c'),
            KeyAction::Press,
            Mods::CONTROL,
        );
        assert_eq!(store.borrow().as_str(), "hello ");
    }

    #[test]
    fn slow_clicks_do_not_accumulate() {
        let (mut sys, _) = system();
        let mut text_box = TextBox::new();
        text_box.set_size(&mut sys, 100.0, 20.0);
        text_box.set_text(&mut sys, "hello world".to_owned());

        for (i, time) in [0.0, 1.0, 2.0].into_iter().enumerate() {
            text_box.handle_mouse_button(
                &mut sys,
                MouseButton::Left,
                MouseAction::Press,
                Mods::empty(),
                5.0,
                5.0,
                time,
            );
            let _ = i;
            assert_eq!(sys.click_count, 0);
        }
    }

    #[test]
    fn enter_releases_focus_on_single_line_box() {
        let (mut sys, _) = system();
        let mut text_box = TextBox::new();
        text_box.set_size(&mut sys, 100.0, 20.0);
        text_box.set_editable(true);

        text_box.handle_mouse_button(
            &mut sys,
            MouseButton::Left,
            MouseAction::Press,
            Mods::empty(),
            5.0,
            5.0,
            0.0,
        );
        assert!(text_box.is_focused(&sys));
        text_box.handle_key_press(&mut sys, Key::Enter, KeyAction::Press, Mods::empty());
        assert!(!text_box.is_focused(&sys));

        // A multi-line box inserts a newline instead.
        text_box.set_multi_line(true);
        text_box.handle_mouse_button(
            &mut sys,
            MouseButton::Left,
            MouseAction::Press,
            Mods::empty(),
            5.0,
            5.0,
            10.0,
        );
        text_box.handle_text_input(&mut sys, 'a');
        text_box.handle_key_press(&mut sys, Key::Enter, KeyAction::Press, Mods::empty());
        assert_eq!(text_box.text(), "a\n");
        assert!(text_box.is_focused(&sys));
    }

    #[test]
    fn paste_replaces_selection() {
        let (mut sys, store) = system();
        *store.borrow_mut() = "XY".to_owned();

        let mut text_box = TextBox::new();
        text_box.set_size(&mut sys, 100.0, 20.0);
        text_box.set_editable(true);
        text_box.set_text(&mut sys, "hello world".to_owned());

        // Focus, then double-click to select "hello " (the word plus its
        // trailing space, per the word-step rule).
        for time in [0.0, 0.1, 0.2] {
            text_box.handle_mouse_button(
                &mut sys,
                MouseButton::Left,
                MouseAction::Press,
                Mods::empty(),
                5.0,
                5.0,
                time,
            );
        }
        assert_eq!(text_box.selection(), Some((0, 6)));

        text_box.handle_key_press(&mut sys, Key::Char('v'), KeyAction::Press, Mods::CONTROL);
        assert_eq!(text_box.text(), "XYworld");
        assert_eq!(text_box.cursor_position().index, 2);
    }

    #[test]
    fn clicking_outside_releases_focus() {
        let (mut sys, _) = system();
        let mut text_box = TextBox::new();
        text_box.set_position(10.0, 10.0);
        text_box.set_size(&mut sys, 100.0, 20.0);

        text_box.handle_mouse_button(
            &mut sys,
            MouseButton::Left,
            MouseAction::Press,
            Mods::empty(),
            50.0,
            15.0,
            0.0,
        );
        assert!(text_box.is_focused(&sys));

        text_box.handle_mouse_button(
            &mut sys,
            MouseButton::Left,
            MouseAction::Press,
            Mods::empty(),
            500.0,
            500.0,
            1.0,
        );
        assert!(!text_box.is_focused(&sys));
    }
}
