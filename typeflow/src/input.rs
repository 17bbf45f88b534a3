// Copyright 2024 the Typeflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input events and platform callbacks consumed by the text box.

use bitflags::bitflags;

/// Keys the text box reacts to. Letter shortcuts (cut/copy/paste) arrive as
/// `Char` with [`Mods::CONTROL`]; printable input goes through
/// [`TextBox::handle_text_input`](crate::TextBox::handle_text_input)
/// instead.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Backspace,
    Delete,
    Enter,
    Char(char),
}

bitflags! {
    /// Modifier state carried by key and mouse events.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct Mods: u8 {
        const SHIFT = 1;
        const CONTROL = 2;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum KeyAction {
    Press,
    Repeat,
    Release,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MouseAction {
    Press,
    Release,
}

/// Platform clipboard, assumed thread-safe by contract.
pub trait Clipboard {
    fn get_text(&mut self) -> String;
    fn set_text(&mut self, text: &str);
}
