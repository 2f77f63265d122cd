//! The form state engine.
//!
//! One `FormEngine` owns all mutable state for one rendered form: the flat
//! value record, per-field errors and derived counters, selector choices,
//! and the submit gate. All mutations happen in response to discrete UI
//! events and run to completion before the next event; the engine is never
//! shared across concurrent forms.
//!
//! Per-field state lives in a single map entry per key (value, error,
//! counter, dropdown flag together), so removing a resolved error removes
//! one thing and the pieces cannot drift apart.

use std::collections::HashMap;

use tracing::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

use crate::schema::{FieldDescriptor, FieldKind, Schema, SchemaNode};
use crate::validate::{ValidationError, validate_field};
use crate::value::{DateValue, FieldValue, FormRecord};

static EMPTY_VALUE: FieldValue = FieldValue::Empty;

/// The caller-supplied submit callback. Its return value and panics are
/// not interpreted by the engine.
pub type SubmitFn = Box<dyn FnMut(FormRecord)>;

// ---------------------------------------------------------------------------
// FieldState
// ---------------------------------------------------------------------------

/// All mutable state for one field, consolidated under its key.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    /// The coerced value.
    pub value: FieldValue,
    /// The active validation error, if any. Absence means no error.
    pub error: Option<ValidationError>,
    /// Character counter; meaningful where a `max_length` is configured.
    pub char_count: usize,
    /// Whether this multi-select field's dropdown is expanded.
    pub dropdown_open: bool,
}

// ---------------------------------------------------------------------------
// FormEngine
// ---------------------------------------------------------------------------

/// The schema-driven form state engine.
pub struct FormEngine {
    schema: Schema,
    states: HashMap<String, FieldState>,
    chosen: HashMap<String, String>,
    pub(crate) lookup_generations: HashMap<String, u64>,
    on_submit: Option<SubmitFn>,
}

impl std::fmt::Debug for FormEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormEngine")
            .field("fields", &self.states.len())
            .field("chosen", &self.chosen)
            .field("has_submit", &self.on_submit.is_some())
            .finish()
    }
}

impl FormEngine {
    /// Create an engine over an immutable schema. All reachable fields
    /// start empty.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        let states = schema
            .fields()
            .map(|field| (field.key.clone(), FieldState::default()))
            .collect();
        Self {
            schema,
            states,
            chosen: HashMap::new(),
            lookup_generations: HashMap::new(),
            on_submit: None,
        }
    }

    /// Attach the submit callback (builder).
    #[must_use]
    pub fn with_submit(mut self, callback: impl FnMut(FormRecord) + 'static) -> Self {
        self.on_submit = Some(Box::new(callback));
        self
    }

    /// Replace the submit callback.
    pub fn set_submit(&mut self, callback: impl FnMut(FormRecord) + 'static) {
        self.on_submit = Some(Box::new(callback));
    }

    /// The schema this engine interprets.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn state_mut(&mut self, key: &str) -> Option<&mut FieldState> {
        self.states.get_mut(key)
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    /// A field's current value (`Empty` for unknown keys).
    #[must_use]
    pub fn value(&self, key: &str) -> &FieldValue {
        self.states.get(key).map_or(&EMPTY_VALUE, |s| &s.value)
    }

    /// A field's active validation error.
    #[must_use]
    pub fn error(&self, key: &str) -> Option<&ValidationError> {
        self.states.get(key).and_then(|s| s.error.as_ref())
    }

    /// A field's formatted error message.
    #[must_use]
    pub fn error_message(&self, key: &str) -> Option<String> {
        self.error(key).map(ValidationError::format_message)
    }

    /// A field's character counter.
    #[must_use]
    pub fn char_count(&self, key: &str) -> usize {
        self.states.get(key).map_or(0, |s| s.char_count)
    }

    /// Whether a multi-select field's dropdown is expanded.
    #[must_use]
    pub fn is_dropdown_open(&self, key: &str) -> bool {
        self.states.get(key).is_some_and(|s| s.dropdown_open)
    }

    /// The active option of a selector, if one has been chosen.
    #[must_use]
    pub fn selected_option(&self, selector_label: &str) -> Option<&str> {
        self.chosen.get(selector_label).map(String::as_str)
    }

    /// Whether any field currently carries an error. Errors recorded in a
    /// now-inactive branch still count: they gate submission until the
    /// value is corrected or cleared.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.states.values().any(|s| s.error.is_some())
    }

    /// The currently active field descriptors: every top-level field plus
    /// the fields of each selector's chosen branch, in schema order.
    pub fn active_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.schema.nodes().iter().flat_map(|node| match node {
            SchemaNode::Field(field) => vec![field],
            SchemaNode::Selector(selector) => self
                .selected_option(&selector.label)
                .map(|option| selector.fields_for(option).iter().collect())
                .unwrap_or_default(),
        })
    }

    // -----------------------------------------------------------------------
    // Mutation operations
    // -----------------------------------------------------------------------

    /// Accept raw input for a field: kind-specific coercion, then
    /// validation, then an atomic state update (value, counter, and error
    /// change together). Returns whether state changed.
    ///
    /// Out-of-alphabet input (letters in a number field, a third boolean
    /// state) is discarded silently; it is not an error.
    pub fn set_value(&mut self, key: &str, raw: &str) -> bool {
        let Some(field) = self.schema.field(key) else {
            debug!(key, "set_value on unknown field key");
            return false;
        };

        let Some(value) = coerce(field, raw) else {
            trace!(key, "discarded out-of-alphabet input");
            return false;
        };

        let value = match value {
            Coerced::Replace(v) => v,
            Coerced::ToggleCode(code) => toggle_code(self.value(key), &code),
        };

        let error = validate_field(field, &value);
        let char_count = value.text_len();
        trace!(key, ?value, has_error = error.is_some(), "set_value");

        // The state entry exists for every schema key; unknown keys were
        // rejected above.
        let Some(state) = self.states.get_mut(key) else {
            return false;
        };
        state.value = value;
        state.char_count = char_count;
        state.error = error;
        true
    }

    /// Re-run validation for a field without mutating its value. Surfaces
    /// errors when the user leaves a field rather than on every keystroke.
    pub fn blur(&mut self, key: &str) -> bool {
        let Some(field) = self.schema.field(key) else {
            return false;
        };
        let error = validate_field(field, self.value(key));
        let Some(state) = self.states.get_mut(key) else {
            return false;
        };
        let changed = state.error != error;
        state.error = error;
        changed
    }

    /// Reset a field to its empty representation, removing its error and
    /// zeroing its counter. Other fields are untouched.
    pub fn clear(&mut self, key: &str) -> bool {
        let Some(state) = self.states.get_mut(key) else {
            return false;
        };
        trace!(key, "clear");
        state.value = FieldValue::Empty;
        state.error = None;
        state.char_count = 0;
        true
    }

    /// Record the active choice for a selector. An empty option label
    /// deselects. Values previously entered in other branches are
    /// preserved, merely excluded from submission rules while inactive;
    /// validation for the entering branch is not re-run eagerly.
    pub fn select_option(&mut self, selector_label: &str, option_label: &str) -> bool {
        let Some(selector) = self.schema.selector(selector_label) else {
            debug!(selector_label, "select_option on unknown selector");
            return false;
        };
        if option_label.is_empty() {
            return self.chosen.remove(selector_label).is_some();
        }
        if !selector.options.iter().any(|o| o == option_label) {
            debug!(selector_label, option_label, "select_option on unknown option");
            return false;
        }
        trace!(selector_label, option_label, "select_option");
        self.chosen
            .insert(selector_label.to_string(), option_label.to_string())
            .as_deref()
            != Some(option_label)
    }

    /// Toggle a multi-select field's dropdown flag.
    pub fn toggle_dropdown(&mut self, key: &str) -> bool {
        match self.states.get_mut(key) {
            Some(state) => {
                state.dropdown_open = !state.dropdown_open;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Whether the form can be submitted: no field carries an error, and
    /// every required field among the active set (top-level fields plus
    /// the chosen branch of each selector) is non-empty. Fields of
    /// non-selected branches are excluded from the required check
    /// entirely, even if previously filled.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        if self.has_errors() {
            return false;
        }
        self.active_fields()
            .all(|field| !field.required || !self.value(&field.key).is_empty())
    }

    /// A snapshot of every non-empty value, including preserved values
    /// from inactive branches.
    #[must_use]
    pub fn record(&self) -> FormRecord {
        FormRecord::from_pairs(self.states.iter().filter_map(|(key, state)| {
            if state.value.is_empty() {
                None
            } else {
                Some((key.clone(), state.value.clone()))
            }
        }))
    }

    /// Submit the form: a no-op returning `false` while not submittable;
    /// otherwise the callback receives a record snapshot. The engine does
    /// not clear the form after submission.
    pub fn submit(&mut self) -> bool {
        if !self.is_submittable() {
            debug!("submit rejected: form is not submittable");
            return false;
        }
        let record = self.record();
        debug!(entries = record.len(), "submit");
        if let Some(callback) = self.on_submit.as_mut() {
            callback(record);
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

enum Coerced {
    /// Replace the stored value.
    Replace(FieldValue),
    /// Toggle a code within the stored selection (multi-select).
    ToggleCode(String),
}

/// Kind-specific coercion from raw native input to a semantic value.
/// `None` means the input is out of the field's alphabet and is discarded.
fn coerce(field: &FieldDescriptor, raw: &str) -> Option<Coerced> {
    let value = match field.kind {
        FieldKind::Text => {
            FieldValue::Text(clip_graphemes(raw, field.max_length))
        }
        FieldKind::Email => FieldValue::Text(raw.to_string()),
        FieldKind::Number => {
            if !raw.is_empty() && !raw.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            FieldValue::Number(clip_graphemes(raw, field.max_length))
        }
        FieldKind::Boolean => match raw {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => return None,
        },
        FieldKind::Date => {
            if raw.is_empty() {
                FieldValue::Empty
            } else {
                FieldValue::Date(DateValue::parse(raw))
            }
        }
        FieldKind::SingleSelect => {
            if raw.is_empty() {
                FieldValue::Empty
            } else {
                FieldValue::Code(raw.to_string())
            }
        }
        FieldKind::MultiSelect => return Some(Coerced::ToggleCode(raw.to_string())),
        FieldKind::GeoPoint => {
            // Geo values arrive through the lookup resolution path, not
            // keystrokes.
            return None;
        }
    };
    Some(Coerced::Replace(value))
}

/// Toggle semantics: re-selecting an already-selected code removes it; a
/// new code appends. First-selection order is preserved.
fn toggle_code(current: &FieldValue, code: &str) -> FieldValue {
    let mut codes = current.codes().to_vec();
    if let Some(position) = codes.iter().position(|c| c == code) {
        codes.remove(position);
    } else {
        codes.push(code.to_string());
    }
    FieldValue::Selection(codes)
}

/// Clip to at most `max` grapheme clusters (truncate, not reject).
fn clip_graphemes(raw: &str, max: Option<usize>) -> String {
    match max {
        Some(max) => raw.graphemes(true).take(max).collect(),
        None => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
