//! Canonical input/event types.
//!
//! The widget layer consumes these instead of raw backend events so that
//! tests can drive widgets without a terminal. On native targets a
//! conversion from crossterm events is provided.
//!
//! # Design Notes
//!
//! - `KeyEventKind` defaults to `Press` when the terminal cannot report it
//! - `Modifiers` use bitflags for easy combination
//! - `Tick` is the runtime's periodic signal; widgets use it for timing
//!   (the geo field's lookup debounce counts ticks)

use bitflags::bitflags;
#[cfg(not(target_arch = "wasm32"))]
use crossterm::event as cte;

/// Canonical input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard event.
    Key(KeyEvent),

    /// Paste event (from bracketed paste mode).
    Paste(String),

    /// Focus gained or lost. `true` = gained.
    Focus(bool),

    /// A tick event from the runtime.
    ///
    /// Fired when a scheduled tick interval elapses. Widgets use ticks for
    /// periodic work such as debounce windows.
    Tick,
}

impl Event {
    /// Convert a crossterm event into a fieldwork [`Event`].
    ///
    /// Returns `None` for event types this crate does not model (mouse,
    /// resize).
    #[must_use]
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_crossterm(event: cte::Event) -> Option<Self> {
        match event {
            cte::Event::Key(key) => Some(Self::Key(KeyEvent {
                code: KeyCode::from_crossterm(key.code)?,
                modifiers: Modifiers::from_crossterm(key.modifiers),
                kind: match key.kind {
                    cte::KeyEventKind::Press => KeyEventKind::Press,
                    cte::KeyEventKind::Repeat => KeyEventKind::Repeat,
                    cte::KeyEventKind::Release => KeyEventKind::Release,
                },
            })),
            cte::Event::Paste(text) => Some(Self::Paste(text)),
            cte::Event::FocusGained => Some(Self::Focus(true)),
            cte::Event::FocusLost => Some(Self::Focus(false)),
            _ => None,
        }
    }
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,

    /// The type of key event (press, repeat, or release).
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// Create a new key event with default modifiers and Press kind.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
            kind: KeyEventKind::Press,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Create a key event with a specific kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Whether this event should be treated as input (press or repeat).
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(self.kind, KeyEventKind::Press | KeyEventKind::Repeat)
    }

    /// Check if Ctrl modifier is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),

    /// Enter/Return key.
    Enter,

    /// Escape key.
    Escape,

    /// Backspace key.
    Backspace,

    /// Tab key.
    Tab,

    /// Shift+Tab (back-tab).
    BackTab,

    /// Delete key.
    Delete,

    /// Home key.
    Home,

    /// End key.
    End,

    /// Up arrow key.
    Up,

    /// Down arrow key.
    Down,

    /// Left arrow key.
    Left,

    /// Right arrow key.
    Right,
}

impl KeyCode {
    #[cfg(not(target_arch = "wasm32"))]
    fn from_crossterm(code: cte::KeyCode) -> Option<Self> {
        Some(match code {
            cte::KeyCode::Char(c) => Self::Char(c),
            cte::KeyCode::Enter => Self::Enter,
            cte::KeyCode::Esc => Self::Escape,
            cte::KeyCode::Backspace => Self::Backspace,
            cte::KeyCode::Tab => Self::Tab,
            cte::KeyCode::BackTab => Self::BackTab,
            cte::KeyCode::Delete => Self::Delete,
            cte::KeyCode::Home => Self::Home,
            cte::KeyCode::End => Self::End,
            cte::KeyCode::Up => Self::Up,
            cte::KeyCode::Down => Self::Down,
            cte::KeyCode::Left => Self::Left,
            cte::KeyCode::Right => Self::Right,
            _ => return None,
        })
    }
}

/// The type of key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    /// Key was pressed (default when not distinguishable).
    #[default]
    Press,

    /// Key is being held (repeat event).
    Repeat,

    /// Key was released.
    Release,
}

bitflags! {
    /// Modifier keys that can be held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
        /// Super/Meta/Command key.
        const SUPER = 0b1000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

impl Modifiers {
    #[cfg(not(target_arch = "wasm32"))]
    fn from_crossterm(m: cte::KeyModifiers) -> Self {
        let mut out = Self::NONE;
        if m.contains(cte::KeyModifiers::SHIFT) {
            out |= Self::SHIFT;
        }
        if m.contains(cte::KeyModifiers::ALT) {
            out |= Self::ALT;
        }
        if m.contains(cte::KeyModifiers::CONTROL) {
            out |= Self::CTRL;
        }
        if m.contains(cte::KeyModifiers::SUPER) {
            out |= Self::SUPER;
        }
        out
    }
}
