//! Validation System - one rule per form field
//!
//! Rules are pure predicates over the current input.
//! The validator maps rule outcomes to field reports and the submit gate.

use serde::{Deserialize, Serialize};
use crate::form::{Field, FormInput};

/// Largest accepted photo upload, in bytes.
pub const MAX_PHOTO_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    Valid,
    Invalid,
}

/// Visual state of one input after its rule ran.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldReport {
    pub field: Field,
    pub state: FieldState,
    /// Inline error text; empty when the field is valid.
    pub message: String,
}

impl FieldReport {
    pub fn is_valid(&self) -> bool {
        self.state == FieldState::Valid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: Field,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<FieldViolation>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self { valid: true, violations: vec![] }
    }

    pub fn failure(violations: Vec<FieldViolation>) -> Self {
        Self { valid: false, violations }
    }

    pub fn violation(&self, field: Field) -> Option<&FieldViolation> {
        self.violations.iter().find(|v| v.field == field)
    }
}

/// Field rule trait - a pure predicate plus the message shown on failure
pub trait FieldRule {
    fn field(&self) -> Field;
    fn message(&self) -> &'static str;
    fn check(&self, input: &FormInput) -> bool;
}

// --- Concrete Rules ---

/// Whitespace as the browser form's `\s` class sees it: Unicode
/// `White_Space` without U+0085, plus U+FEFF.
fn is_form_whitespace(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{feff}'
}

fn char_count_within(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.chars().count())
}

pub struct NameRule;

impl FieldRule for NameRule {
    fn field(&self) -> Field {
        Field::Name
    }

    fn message(&self) -> &'static str {
        "Name must be 2-40 letters and spaces."
    }

    fn check(&self, input: &FormInput) -> bool {
        char_count_within(&input.name, 2, 40)
            && input.name.chars().all(|c| c.is_ascii_alphabetic() || is_form_whitespace(c))
    }
}

pub struct RegNoRule;

impl FieldRule for RegNoRule {
    fn field(&self) -> Field {
        Field::RegNo
    }

    fn message(&self) -> &'static str {
        "Reg No must be 6-20 alphanumeric characters."
    }

    fn check(&self, input: &FormInput) -> bool {
        char_count_within(&input.reg_no, 6, 20)
            && input
                .reg_no
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    }
}

pub struct EmailRule;

impl FieldRule for EmailRule {
    fn field(&self) -> Field {
        Field::Email
    }

    fn message(&self) -> &'static str {
        "Please enter a valid email address."
    }

    fn check(&self, input: &FormInput) -> bool {
        is_plausible_email(&input.email)
    }
}

/// `local@domain.tld` shape: one `@`, no whitespace, a dot strictly inside
/// the domain. Not an RFC 5322 parser.
fn is_plausible_email(value: &str) -> bool {
    if value.chars().any(is_form_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub struct PhoneRule;

impl FieldRule for PhoneRule {
    fn field(&self) -> Field {
        Field::Phone
    }

    fn message(&self) -> &'static str {
        "Please enter a valid phone number."
    }

    fn check(&self, input: &FormInput) -> bool {
        char_count_within(&input.phone, 10, 20)
            && input.phone.chars().all(|c| {
                c.is_ascii_digit() || is_form_whitespace(c) || matches!(c, '-' | '+' | '(' | ')')
            })
    }
}

pub struct PhotoRule;

impl FieldRule for PhotoRule {
    fn field(&self) -> Field {
        Field::Photo
    }

    fn message(&self) -> &'static str {
        "Photo is required and must be under 4 MB."
    }

    fn check(&self, input: &FormInput) -> bool {
        input
            .photo
            .as_ref()
            .is_some_and(|photo| photo.size() <= MAX_PHOTO_BYTES)
    }
}

fn rule_for(field: Field) -> &'static dyn FieldRule {
    match field {
        Field::Name => &NameRule,
        Field::RegNo => &RegNoRule,
        Field::Email => &EmailRule,
        Field::Phone => &PhoneRule,
        Field::Photo => &PhotoRule,
    }
}

/// Validator owns the five field rules and derives the submit gate
pub struct FormValidator {
    rules: Vec<&'static dyn FieldRule>,
}

impl FormValidator {
    pub fn new() -> Self {
        Self {
            rules: Field::ALL.into_iter().map(rule_for).collect(),
        }
    }

    /// Re-run a single field's rule.
    pub fn validate_field(&self, field: Field, input: &FormInput) -> FieldReport {
        let rule = rule_for(field);
        if rule.check(input) {
            FieldReport { field, state: FieldState::Valid, message: String::new() }
        } else {
            FieldReport {
                field,
                state: FieldState::Invalid,
                message: rule.message().to_string(),
            }
        }
    }

    pub fn validate_form(&self, input: &FormInput) -> ValidationResult {
        let violations: Vec<_> = self
            .rules
            .iter()
            .filter(|rule| !rule.check(input))
            .map(|rule| FieldViolation {
                field: rule.field(),
                message: rule.message().to_string(),
            })
            .collect();

        if violations.is_empty() {
            ValidationResult::success()
        } else {
            ValidationResult::failure(violations)
        }
    }

    /// Submit gate: true iff every rule passes.
    pub fn is_submittable(&self, input: &FormInput) -> bool {
        self.rules.iter().all(|rule| rule.check(input))
    }
}

impl Default for FormValidator {
    fn default() -> Self {
        Self::new()
    }
}
