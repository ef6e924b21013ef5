use std::fmt;
use std::str::FromStr;

use unicode_segmentation::UnicodeSegmentation;

use super::validation::{check, FieldError, FieldErrors, Rule};

const MAX_RAW_LEN: usize = 20;

/// Domestic country calling code prepended to ten digit numbers
const COUNTRY_CODE: char = '1';
const NATIONAL_DIGITS: usize = 10;

const RULES: &[Rule] = &[Rule {
    holds: is_within_max_len,
    error: FieldError::length("Phone number is too long"),
}];

fn is_within_max_len(value: &str) -> bool {
    value.graphemes(true).count() <= MAX_RAW_LEN
}

/// A phone number exactly as the user typed it (trimmed).
///
/// Only its length is checked when the signup is accepted; it is normalized into a
/// [`PhoneNumber`] when a notification is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPhone(String);

impl RawPhone {
    /// Parse an optional form value, where a blank value means no phone was given
    pub fn parse_optional(value: &str) -> Result<Option<Self>, FieldErrors> {
        let value = value.trim();

        check(value, None, RULES)?;

        if value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self(value.to_string())))
        }
    }
}

impl AsRef<str> for RawPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid phone number format")]
pub struct InvalidPhoneFormat;

/// A normalized E.164 phone number within the domestic numbering plan (`+15551234567`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalize free-form input by dropping every non-digit character.
    ///
    /// Ten digits get the country code prepended, eleven digits must already start with it.
    pub fn normalize(raw: &str) -> Result<Self, InvalidPhoneFormat> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        match digits.len() {
            NATIONAL_DIGITS => Ok(Self(format!("+{}{}", COUNTRY_CODE, digits))),
            n if n == NATIONAL_DIGITS + 1 && digits.starts_with(COUNTRY_CODE) => {
                Ok(Self(format!("+{}", digits)))
            }
            _ => Err(InvalidPhoneFormat),
        }
    }
}

impl FromStr for PhoneNumber {
    type Err = InvalidPhoneFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::normalize(value)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
