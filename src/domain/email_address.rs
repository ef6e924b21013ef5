use std::fmt;
use std::str::FromStr;

use regex::Regex;

use unicode_segmentation::UnicodeSegmentation;

use super::validation::{check, FieldError, FieldErrors, Rule};

const MAX_LEN: usize = 120;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .unwrap();
}

const RULES: &[Rule] = &[
    Rule {
        holds: is_well_formed,
        error: FieldError::format("Please enter a valid email address"),
    },
    Rule {
        holds: is_within_max_len,
        error: FieldError::length("Email is too long"),
    },
];

fn is_well_formed(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

fn is_within_max_len(value: &str) -> bool {
    value.graphemes(true).count() <= MAX_LEN
}

/// A user supplied email-address, lower-cased.
///
/// Doubles as the natural deduplication key of a signup.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EmailAddress(String);

impl FromStr for EmailAddress {
    type Err = FieldErrors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        check(value, Some(FieldError::required("Email is required")), RULES)?;

        // Normalize
        Ok(Self(value.to_lowercase()))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
