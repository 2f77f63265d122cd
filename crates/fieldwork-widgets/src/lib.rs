#![forbid(unsafe_code)]

//! Terminal input widgets for the fieldwork form engine.
//!
//! Maps each resolved field descriptor to a concrete input behavior (text,
//! numeric, boolean, date, single-select, multi-select, geo) and wires the
//! native key events back into the engine's `set_value`/`blur`/`clear`
//! operations. The `FormView` widget walks the schema, renders the active
//! selector branches with the same per-kind dispatch, and gates the submit
//! row on the engine's submittability.

pub mod form_view;
pub mod geo;
pub mod line_edit;

pub use form_view::{FormView, FormViewState};
pub use geo::GeoQueryState;
pub use line_edit::LineEdit;

use fieldwork_core::{Buffer, Rect};

/// A `Widget` is a renderable component.
///
/// Widgets render themselves into a `Buffer` within a given `Rect`.
pub trait Widget {
    /// Render the widget into the buffer at the given area.
    fn render(&self, area: Rect, buf: &mut Buffer);
}

/// A `StatefulWidget` is a widget that renders based on mutable state.
pub trait StatefulWidget {
    type State;

    /// Render the widget into the buffer with mutable state.
    fn render(&self, area: Rect, buf: &mut Buffer, state: &mut Self::State);
}
