use std::str::FromStr;

use unicode_segmentation::UnicodeSegmentation;

use super::validation::{check, FieldError, FieldErrors, Rule};

const MIN_LEN: usize = 5;
const MAX_LEN: usize = 10;

const RULES: &[Rule] = &[Rule {
    holds: is_within_bounds,
    error: FieldError::length("Please enter a valid zip code"),
}];

fn is_within_bounds(value: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&value.graphemes(true).count())
}

/// A trimmed postal code, 5 to 10 characters (`64105`, `64105-1234`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipCode(String);

impl AsRef<str> for ZipCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ZipCode {
    type Err = FieldErrors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        check(value, Some(FieldError::required("Zip code is required")), RULES)?;

        Ok(Self(value.to_string()))
    }
}
