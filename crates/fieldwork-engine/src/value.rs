//! The value model: the flat, type-erased record a form edits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;
use unicode_segmentation::UnicodeSegmentation;

/// The calendar-date wire format (`2024-06-01`).
const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

// ---------------------------------------------------------------------------
// GeoLocation
// ---------------------------------------------------------------------------

/// A structured location record produced by the location-lookup
/// collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub street_and_number: Option<String>,
    pub geohash: String,
}

// ---------------------------------------------------------------------------
// DateValue
// ---------------------------------------------------------------------------

/// A date field's coerced value.
///
/// Unparsable input is a recorded condition, never a crash; it keeps the
/// raw text so editing can continue, and counts as absent for required
/// checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    /// A successfully parsed calendar date.
    Parsed(Date),
    /// Input that failed to parse, kept verbatim.
    Unparsable(String),
}

impl DateValue {
    /// Parse `YYYY-MM-DD` input into a date value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match Date::parse(raw, DATE_FORMAT) {
            Ok(date) => Self::Parsed(date),
            Err(_) => Self::Unparsable(raw.to_string()),
        }
    }

    /// The editable text form: the formatted date, or the raw text that
    /// failed to parse.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Parsed(date) => date.format(DATE_FORMAT).unwrap_or_default(),
            Self::Unparsable(raw) => raw.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// The type-erased value of one field, keyed by the field's kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value entered yet (or cleared).
    #[default]
    Empty,
    /// text / email: the entered string.
    Text(String),
    /// number: the digit string; empty is a valid intermediate editing
    /// state distinct from zero.
    Number(String),
    /// boolean: one of the two fixed choices.
    Bool(bool),
    /// date: a parsed date or a recorded unparsable condition.
    Date(DateValue),
    /// singleSelect: the chosen option code.
    Code(String),
    /// multiSelect: chosen option codes in first-selection order.
    Selection(Vec<String>),
    /// geoPoint: the resolved location record.
    Location(GeoLocation),
}

impl FieldValue {
    /// Whether the value counts as absent for required checks.
    ///
    /// An unparsable date is absent: it is recorded, but it is not a value.
    /// A boolean is always present once set; both of its states are valid
    /// answers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) | Self::Number(s) | Self::Code(s) => s.is_empty(),
            Self::Selection(codes) => codes.is_empty(),
            Self::Date(DateValue::Unparsable(_)) => true,
            Self::Date(DateValue::Parsed(_)) | Self::Bool(_) | Self::Location(_) => false,
        }
    }

    /// The textual length used by length-bound validation and character
    /// counters. Grapheme-aware for text; zero for non-textual values.
    #[must_use]
    pub fn text_len(&self) -> usize {
        match self {
            Self::Text(s) => s.graphemes(true).count(),
            Self::Number(s) => s.len(),
            _ => 0,
        }
    }

    /// The editable text form for text-like kinds, empty otherwise.
    #[must_use]
    pub fn edit_text(&self) -> String {
        match self {
            Self::Text(s) | Self::Number(s) => s.clone(),
            Self::Date(d) => d.to_text(),
            _ => String::new(),
        }
    }

    /// The parsed number, if this is a non-empty digit string.
    #[must_use]
    pub fn number(&self) -> Option<u64> {
        match self {
            Self::Number(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The chosen option codes, empty for other kinds.
    #[must_use]
    pub fn codes(&self) -> &[String] {
        match self {
            Self::Selection(codes) => codes,
            _ => &[],
        }
    }

    /// The resolved location, if any.
    #[must_use]
    pub fn location(&self) -> Option<&GeoLocation> {
        match self {
            Self::Location(loc) => Some(loc),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FormRecord
// ---------------------------------------------------------------------------

/// A snapshot of the flat key → value record, as delivered to the submit
/// callback. Holds every non-empty value, including preserved values from
/// currently inactive selector branches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormRecord {
    values: BTreeMap<String, FieldValue>,
}

impl FormRecord {
    /// Build a record from `(key, value)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, FieldValue)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Get a value by field key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Iterate the record in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
