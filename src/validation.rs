use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::models::{PostPayload, UserPayload};

/// FieldViolation
///
/// A single rule a payload field failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// ValidationErrors
///
/// Every violation found in a payload. Validation collects all of them rather
/// than stopping at the first, so clients can fix a form in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.violations
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Validate
///
/// Implemented by every write payload accepted by the API.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// The JSON type a payload field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
}

/// FieldRule
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldRule {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true }
    }

    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// PayloadFields
///
/// The shape of a write payload, checked against the raw JSON before
/// deserialization so type errors can be reported per field.
pub trait PayloadFields {
    const FIELDS: &'static [FieldRule];
}

/// check_fields
///
/// Reports every field of `T` that is missing (when required) or has the wrong
/// JSON type. `null` counts as absent. Unknown keys are ignored.
pub fn check_fields<T: PayloadFields>(object: &Map<String, Value>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for rule in T::FIELDS {
        match object.get(rule.name) {
            None | Some(Value::Null) if rule.required => errors.add(rule.name, "is required"),
            None | Some(Value::Null) => {}
            Some(Value::String(_)) if rule.kind == FieldKind::Text => {}
            Some(Value::Number(n))
                if rule.kind == FieldKind::Integer
                    && n.as_i64().is_some_and(|v| i32::try_from(v).is_ok()) => {}
            Some(_) => match rule.kind {
                FieldKind::Text => errors.add(rule.name, "must be a string"),
                FieldKind::Integer => errors.add(rule.name, "must be an integer"),
            },
        }
    }
    errors.into_result()
}

impl PayloadFields for UserPayload {
    const FIELDS: &'static [FieldRule] = &[
        FieldRule::required("username", FieldKind::Text),
        FieldRule::required("password", FieldKind::Text),
        FieldRule::optional("first_name", FieldKind::Text),
        FieldRule::optional("last_name", FieldKind::Text),
        FieldRule::optional("age", FieldKind::Integer),
    ];
}

impl PayloadFields for PostPayload {
    const FIELDS: &'static [FieldRule] = &[
        FieldRule::required("title", FieldKind::Text),
        FieldRule::required("content", FieldKind::Text),
    ];
}

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;
pub const NAME_MAX: usize = 100;
pub const AGE_MAX: i32 = 150;
pub const TITLE_MAX: usize = 200;

fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (USERNAME_MIN..=USERNAME_MAX).contains(&len)
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Validate for UserPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if !is_valid_username(&self.username) {
            errors.add(
                "username",
                format!(
                    "must be {USERNAME_MIN}-{USERNAME_MAX} characters of letters, digits or underscores"
                ),
            );
        }
        if self.password.chars().count() < PASSWORD_MIN {
            errors.add(
                "password",
                format!("must be at least {PASSWORD_MIN} characters long"),
            );
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.as_ref().is_some_and(|v| v.chars().count() > NAME_MAX) {
                errors.add(field, format!("must be at most {NAME_MAX} characters long"));
            }
        }
        if self.age.is_some_and(|age| !(0..=AGE_MAX).contains(&age)) {
            errors.add("age", format!("must be between 0 and {AGE_MAX}"));
        }

        errors.into_result()
    }
}

impl Validate for PostPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title_len = self.title.trim().chars().count();
        if title_len == 0 || title_len > TITLE_MAX {
            errors.add("title", format!("must be 1-{TITLE_MAX} characters long"));
        }
        if self.content.trim().is_empty() {
            errors.add("content", "must not be empty");
        }

        errors.into_result()
    }
}
