#![forbid(unsafe_code)]

//! Core primitives for fieldwork.
//!
//! This crate carries the substrate the form widgets are built on: canonical
//! input events (with crossterm conversion on native targets), rectangle
//! geometry, styling, and the cell buffer widgets render into. It knows
//! nothing about schemas or forms.

pub mod buffer;
pub mod event;
pub mod geometry;
pub mod style;

pub use buffer::{Buffer, Cell};
pub use event::{Event, KeyCode, KeyEvent, KeyEventKind, Modifiers};
pub use geometry::Rect;
pub use style::{Color, Style, StyleFlags};
