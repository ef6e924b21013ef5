use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Category of a single failed field rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldErrorKind {
    Required,
    Length,
    Format,
}

/// A user-correctable failure for one form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct FieldError {
    pub kind: FieldErrorKind,
    pub message: Cow<'static, str>,
}

impl FieldError {
    pub const fn required(message: &'static str) -> Self {
        Self {
            kind: FieldErrorKind::Required,
            message: Cow::Borrowed(message),
        }
    }

    pub const fn length(message: &'static str) -> Self {
        Self {
            kind: FieldErrorKind::Length,
            message: Cow::Borrowed(message),
        }
    }

    pub const fn format(message: &'static str) -> Self {
        Self {
            kind: FieldErrorKind::Format,
            message: Cow::Borrowed(message),
        }
    }

    /// A format failure whose message names the offending input
    pub fn format_owned(message: String) -> Self {
        Self {
            kind: FieldErrorKind::Format,
            message: Cow::Owned(message),
        }
    }
}

/// Failures collected for a single field
pub type FieldErrors = Vec<FieldError>;

/// A predicate over a trimmed value, paired with the error reported when it does not hold
pub struct Rule {
    pub holds: fn(&str) -> bool,
    pub error: FieldError,
}

/// Check a trimmed value against a field's rules.
///
/// An empty value short-circuits: it fails with `required` when one is given and passes
/// otherwise (optional fields). A non-empty value is checked against every rule, and all
/// failures are reported.
pub fn check(value: &str, required: Option<FieldError>, rules: &[Rule]) -> Result<(), FieldErrors> {
    if value.is_empty() {
        return match required {
            Some(error) => Err(vec![error]),
            None => Ok(()),
        };
    }

    let failures: FieldErrors = rules
        .iter()
        .filter(|rule| !(rule.holds)(value))
        .map(|rule| rule.error.clone())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Signup form fields, named as they appear in the submitted form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Phone,
    ZipCode,
    EventsInterested,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Phone => "phone",
            Field::ZipCode => "zip_code",
            Field::EventsInterested => "events_interested",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failed rule of a rejected form, keyed by field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<Field, FieldErrors>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one field's checks, keeping the parsed value on success
    pub fn collect<T>(&mut self, field: Field, result: Result<T, FieldErrors>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(errors) => {
                self.0.entry(field).or_default().extend(errors);
                None
            }
        }
    }

    pub fn get(&self, field: Field) -> Option<&[FieldError]> {
        self.0.get(&field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, errors) in &self.0 {
            for error in errors {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, error)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
