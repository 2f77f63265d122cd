//! The schema model: field descriptors and conditional selector nodes.
//!
//! A schema is an ordered sequence of nodes. A plain field describes one
//! addressable input; a selector swaps in a different sub-list of fields
//! depending on a chosen option. The union is a tagged variant so renderer
//! dispatch is statically exhaustive, while the serde form stays
//! structurally discriminated: a JSON node with `fieldsByOption` is a
//! selector, anything else is a field.

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FieldKind
// ---------------------------------------------------------------------------

/// The input type of a field, driving coercion, validation, and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// Free text, optionally length-bounded.
    Text,
    /// Digit-sequence input; the empty string is a valid editing state.
    Number,
    /// Two fixed choices mapping to true/false.
    Boolean,
    /// A calendar date.
    Date,
    /// Free text with an email-shape check.
    Email,
    /// Exactly one option code.
    SingleSelect,
    /// An order-preserving set of option codes with toggle semantics.
    MultiSelect,
    /// A structured location record resolved asynchronously.
    GeoPoint,
}

impl FieldKind {
    /// Whether this kind carries an options list.
    #[must_use]
    pub const fn has_options(self) -> bool {
        matches!(self, Self::SingleSelect | Self::MultiSelect)
    }
}

// ---------------------------------------------------------------------------
// ChoiceOption
// ---------------------------------------------------------------------------

/// One selectable option: the display name shown to the user and the code
/// stored in the record. Equality checks (including multi-select duplicate
/// prevention) always use the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Display name.
    pub name: String,
    /// Stored code.
    pub code: String,
}

impl ChoiceOption {
    /// Create an option.
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// Declarative description of one addressable form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Stable identifier, unique across the whole schema; keys the record.
    pub key: String,
    /// Display text.
    pub label: String,
    /// Input type.
    pub kind: FieldKind,
    /// Whether the field must be filled for the form to be submittable.
    #[serde(default)]
    pub required: bool,
    /// Minimum textual length, where meaningful.
    #[serde(default)]
    pub min_length: Option<usize>,
    /// Maximum textual length, where meaningful. Input past the bound is
    /// truncated, not rejected.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Display hint shown while the field is empty.
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Ordered options; required for select kinds, absent otherwise.
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

impl FieldDescriptor {
    fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            required: false,
            min_length: None,
            max_length: None,
            placeholder: None,
            options: Vec::new(),
        }
    }

    /// Create a text field.
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    /// Create a number field.
    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Number)
    }

    /// Create a boolean field.
    pub fn boolean(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Boolean)
    }

    /// Create a date field.
    pub fn date(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Date)
    }

    /// Create an email field.
    pub fn email(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Email)
    }

    /// Create a single-select field.
    pub fn single_select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<ChoiceOption>,
    ) -> Self {
        let mut field = Self::new(key, label, FieldKind::SingleSelect);
        field.options = options;
        field
    }

    /// Create a multi-select field.
    pub fn multi_select(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<ChoiceOption>,
    ) -> Self {
        let mut field = Self::new(key, label, FieldKind::MultiSelect);
        field.options = options;
        field
    }

    /// Create a geo-point field.
    pub fn geo_point(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::GeoPoint)
    }

    /// Mark the field required (builder).
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the minimum textual length (builder).
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Set the maximum textual length (builder).
    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Set the placeholder text (builder).
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Look up an option's display name by code.
    #[must_use]
    pub fn option_name(&self, code: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.code == code)
            .map(|o| o.name.as_str())
    }

    /// Whether the given code is one of this field's declared options.
    #[must_use]
    pub fn has_option_code(&self, code: &str) -> bool {
        self.options.iter().any(|o| o.code == code)
    }
}

// ---------------------------------------------------------------------------
// SelectorDescriptor
// ---------------------------------------------------------------------------

/// A conditional fan-out node: not itself data-bearing, it activates one of
/// several field sub-lists depending on the chosen option label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorDescriptor {
    /// Display text; also the lookup key for the chosen option.
    pub label: String,
    /// The option labels, in display order.
    pub options: Vec<String>,
    /// Fields activated per option label. Every option has an entry,
    /// possibly empty.
    pub fields_by_option: BTreeMap<String, Vec<FieldDescriptor>>,
}

impl SelectorDescriptor {
    /// Create a selector from `(option label, fields)` branches.
    pub fn new(
        label: impl Into<String>,
        branches: Vec<(String, Vec<FieldDescriptor>)>,
    ) -> Self {
        let options = branches.iter().map(|(o, _)| o.clone()).collect();
        Self {
            label: label.into(),
            options,
            fields_by_option: branches.into_iter().collect(),
        }
    }

    /// The fields activated by an option, empty for unknown labels.
    #[must_use]
    pub fn fields_for(&self, option: &str) -> &[FieldDescriptor] {
        self.fields_by_option
            .get(option)
            .map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// SchemaNode
// ---------------------------------------------------------------------------

/// One schema element: a plain field or a selector.
///
/// Serde is untagged: the JSON form is discriminated by shape (a selector
/// carries `fieldsByOption`), matching the declarative wire format, while
/// the Rust form stays a sum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaNode {
    /// A conditional selector node.
    Selector(SelectorDescriptor),
    /// A plain data-bearing field.
    Field(FieldDescriptor),
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// An ordered, validated sequence of schema nodes.
///
/// Construction verifies the structural invariants once, so the engine can
/// rely on them for the lifetime of a form:
/// - field keys are globally unique, including inside every branch;
/// - select kinds carry options, other kinds carry none;
/// - selector labels are unique and every option label has a branch entry
///   (and vice versa).
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
}

impl Schema {
    /// Validate and build a schema.
    pub fn new(nodes: Vec<SchemaNode>) -> Result<Self, SchemaError> {
        let mut keys: HashSet<&str> = HashSet::new();
        let mut selectors: HashSet<&str> = HashSet::new();

        for node in &nodes {
            match node {
                SchemaNode::Field(field) => check_field(&mut keys, field)?,
                SchemaNode::Selector(selector) => {
                    if !selectors.insert(&selector.label) {
                        return Err(SchemaError::DuplicateSelector(selector.label.clone()));
                    }
                    for option in &selector.options {
                        if !selector.fields_by_option.contains_key(option) {
                            return Err(SchemaError::MissingBranch {
                                selector: selector.label.clone(),
                                option: option.clone(),
                            });
                        }
                    }
                    for (option, fields) in &selector.fields_by_option {
                        if !selector.options.contains(option) {
                            return Err(SchemaError::UnknownBranch {
                                selector: selector.label.clone(),
                                option: option.clone(),
                            });
                        }
                        for field in fields {
                            check_field(&mut keys, field)?;
                        }
                    }
                }
            }
        }

        Ok(Self { nodes })
    }

    /// Parse and validate a schema from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let nodes: Vec<SchemaNode> =
            serde_json::from_str(json).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::new(nodes)
    }

    /// The schema nodes in order.
    #[must_use]
    pub fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    /// Find a field descriptor anywhere in the schema, branches included.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields().find(|f| f.key == key)
    }

    /// Find a selector by label.
    #[must_use]
    pub fn selector(&self, label: &str) -> Option<&SelectorDescriptor> {
        self.nodes.iter().find_map(|node| match node {
            SchemaNode::Selector(s) if s.label == label => Some(s),
            _ => None,
        })
    }

    /// Every field descriptor reachable from the schema, in declaration
    /// order (branch fields follow their selector, branches in option-map
    /// order).
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.nodes.iter().flat_map(|node| match node {
            SchemaNode::Field(field) => vec![field],
            SchemaNode::Selector(selector) => selector
                .fields_by_option
                .values()
                .flatten()
                .collect::<Vec<_>>(),
        })
    }
}

fn check_field<'a>(
    keys: &mut HashSet<&'a str>,
    field: &'a FieldDescriptor,
) -> Result<(), SchemaError> {
    if !keys.insert(&field.key) {
        return Err(SchemaError::DuplicateKey(field.key.clone()));
    }
    if field.kind.has_options() && field.options.is_empty() {
        return Err(SchemaError::MissingOptions(field.key.clone()));
    }
    if !field.kind.has_options() && !field.options.is_empty() {
        return Err(SchemaError::UnexpectedOptions(field.key.clone()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

/// A structural violation detected while building a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The same field key appears more than once.
    DuplicateKey(String),
    /// The same selector label appears more than once.
    DuplicateSelector(String),
    /// A select field declares no options.
    MissingOptions(String),
    /// A non-select field declares options.
    UnexpectedOptions(String),
    /// A selector option has no branch entry.
    MissingBranch { selector: String, option: String },
    /// A branch entry names an undeclared option.
    UnknownBranch { selector: String, option: String },
    /// The JSON form failed to parse.
    Parse(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "duplicate field key `{key}`"),
            Self::DuplicateSelector(label) => write!(f, "duplicate selector label `{label}`"),
            Self::MissingOptions(key) => write!(f, "select field `{key}` has no options"),
            Self::UnexpectedOptions(key) => {
                write!(f, "field `{key}` carries options but is not a select kind")
            }
            Self::MissingBranch { selector, option } => {
                write!(f, "selector `{selector}` option `{option}` has no branch")
            }
            Self::UnknownBranch { selector, option } => {
                write!(f, "selector `{selector}` branch `{option}` is not an option")
            }
            Self::Parse(msg) => write!(f, "schema parse error: {msg}"),
        }
    }
}

impl std::error::Error for SchemaError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
