use std::str::FromStr;

use unicode_segmentation::UnicodeSegmentation;

use super::validation::{check, FieldError, FieldErrors, Rule};

const MIN_LEN: usize = 2;
const MAX_LEN: usize = 100;

const RULES: &[Rule] = &[Rule {
    holds: is_within_bounds,
    error: FieldError::length("Name must be between 2 and 100 characters"),
}];

fn is_within_bounds(value: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&value.graphemes(true).count())
}

/// The trimmed full name of a person signing up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PersonName {
    type Err = FieldErrors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        check(value, Some(FieldError::required("Name is required")), RULES)?;

        Ok(Self(value.to_string()))
    }
}
