//! Field validation: ordered rules, one active error per field.
//!
//! Rules run in a fixed order and the first failing rule wins; a field
//! never carries more than one message at a time. A resolved error is
//! removed by the engine, never overwritten with emptiness.

use std::collections::HashMap;
use std::fmt;

use crate::schema::{FieldDescriptor, FieldKind};
use crate::value::FieldValue;

// ---------------------------------------------------------------------------
// Error Codes
// ---------------------------------------------------------------------------

/// Error code for the required rule.
pub const ERROR_CODE_REQUIRED: &str = "required";
/// Error code for the minimum-length rule.
pub const ERROR_CODE_MIN_LENGTH: &str = "too_short";
/// Error code for the maximum-length rule.
pub const ERROR_CODE_MAX_LENGTH: &str = "too_long";
/// Error code for the email-shape rule.
pub const ERROR_CODE_EMAIL: &str = "email";

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A field-scoped validation error with code, message template, and
/// interpolation parameters.
///
/// The `code` is a stable identifier for programmatic handling; the
/// message holds `{param}` placeholders substituted by `format_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message template.
    pub message: String,
    /// Parameters for message interpolation.
    pub params: HashMap<String, String>,
}

impl ValidationError {
    /// Create an error with the given code and message template.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: HashMap::new(),
        }
    }

    /// Add an interpolation parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Format the message with parameter substitution.
    #[must_use]
    pub fn format_message(&self) -> String {
        let mut result = self.message.clone();
        for (key, value) in &self.params {
            result = result.replace(&format!("{{{key}}}"), value);
        }
        result
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_message())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Rule evaluation
// ---------------------------------------------------------------------------

/// Validate one field's value against its descriptor.
///
/// Rule order, first failure wins:
/// 1. required and empty;
/// 2. length bounds, for every kind except email;
/// 3. email shape, for non-empty email values.
///
/// Empty values only ever fail the required rule: an empty optional email
/// or length-bounded field passes.
#[must_use]
pub fn validate_field(field: &FieldDescriptor, value: &FieldValue) -> Option<ValidationError> {
    if value.is_empty() {
        if field.required {
            return Some(
                ValidationError::new(ERROR_CODE_REQUIRED, "{label} is required.")
                    .with_param("label", &field.label),
            );
        }
        return None;
    }

    if field.kind != FieldKind::Email {
        let len = value.text_len();
        if let Some(min) = field.min_length
            && len < min
        {
            return Some(
                ValidationError::new(
                    ERROR_CODE_MIN_LENGTH,
                    "{label} must be at least {min} characters.",
                )
                .with_param("label", &field.label)
                .with_param("min", min)
                .with_param("actual", len),
            );
        }
        if let Some(max) = field.max_length
            && len > max
        {
            return Some(
                ValidationError::new(
                    ERROR_CODE_MAX_LENGTH,
                    "{label} must be at most {max} characters.",
                )
                .with_param("label", &field.label)
                .with_param("max", max)
                .with_param("actual", len),
            );
        }
    }

    if field.kind == FieldKind::Email
        && let FieldValue::Text(text) = value
        && !is_valid_email(text)
    {
        return Some(ValidationError::new(
            ERROR_CODE_EMAIL,
            "Enter a valid email address.",
        ));
    }

    None
}

/// A standard email-shape check: no whitespace, exactly one `@`, non-empty
/// local part, and a domain with a dot that has text on both sides.
#[must_use]
pub fn is_valid_email(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = text.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot < domain.len() - 1,
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDescriptor;

    fn text_value(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    // -- ValidationError --

    #[test]
    fn format_message_interpolates_params() {
        let err = ValidationError::new(ERROR_CODE_MIN_LENGTH, "{label} needs {min}")
            .with_param("label", "Bio")
            .with_param("min", 3);
        assert_eq!(err.format_message(), "Bio needs 3");
        assert_eq!(format!("{err}"), "Bio needs 3");
    }

    // -- Rule order --

    #[test]
    fn required_empty_fails_first() {
        let field = FieldDescriptor::text("bio", "Bio").required().min_length(3);
        let err = validate_field(&field, &FieldValue::Empty).unwrap();
        assert_eq!(err.code, ERROR_CODE_REQUIRED);
        assert_eq!(err.format_message(), "Bio is required.");
    }

    #[test]
    fn empty_optional_passes_every_rule() {
        let field = FieldDescriptor::text("bio", "Bio").min_length(3).max_length(5);
        assert_eq!(validate_field(&field, &FieldValue::Empty), None);
        assert_eq!(validate_field(&field, &text_value("")), None);

        let email = FieldDescriptor::email("mail", "Email");
        assert_eq!(validate_field(&email, &text_value("")), None);
    }

    #[test]
    fn min_length_boundary() {
        let field = FieldDescriptor::text("bio", "Bio").min_length(3);
        assert_eq!(
            validate_field(&field, &text_value("ab")).unwrap().code,
            ERROR_CODE_MIN_LENGTH
        );
        assert_eq!(validate_field(&field, &text_value("abc")), None);
    }

    #[test]
    fn max_length_boundary() {
        let field = FieldDescriptor::text("bio", "Bio").max_length(3);
        assert_eq!(validate_field(&field, &text_value("abc")), None);
        let err = validate_field(&field, &text_value("abcd")).unwrap();
        assert_eq!(err.code, ERROR_CODE_MAX_LENGTH);
        assert_eq!(err.format_message(), "Bio must be at most 3 characters.");
    }

    #[test]
    fn length_counts_graphemes() {
        let field = FieldDescriptor::text("bio", "Bio").min_length(4);
        assert_eq!(validate_field(&field, &text_value("café")), None);
        assert!(validate_field(&field, &text_value("caf")).is_some());
    }

    #[test]
    fn number_length_uses_digit_count() {
        let field = FieldDescriptor::number("age", "Age").min_length(2);
        let err = validate_field(&field, &FieldValue::Number("7".to_string()));
        assert_eq!(err.unwrap().code, ERROR_CODE_MIN_LENGTH);
        assert_eq!(
            validate_field(&field, &FieldValue::Number("70".to_string())),
            None
        );
    }

    #[test]
    fn unparsable_date_is_required_failure_only() {
        let field = FieldDescriptor::date("when", "When").required();
        let value = FieldValue::Date(crate::value::DateValue::parse("not-a-date"));
        let err = validate_field(&field, &value).unwrap();
        assert_eq!(err.code, ERROR_CODE_REQUIRED);
    }

    // -- Email --

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("user.name+tag@example.co.uk"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@com."));
        assert!(!is_valid_email("us er@example.com"));
        assert!(!is_valid_email("user@@example.com"));
    }

    #[test]
    fn email_rule_fires_without_length_rules() {
        // Length bounds on an email field are ignored; the shape error is
        // the only one that can fire.
        let field = FieldDescriptor::email("mail", "Email").min_length(10);
        let err = validate_field(&field, &text_value("user@")).unwrap();
        assert_eq!(err.code, ERROR_CODE_EMAIL);
        assert_eq!(err.format_message(), "Enter a valid email address.");

        assert_eq!(validate_field(&field, &text_value("a@b.co")), None);
    }
}
