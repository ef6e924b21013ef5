use super::validation::{FieldError, FieldErrors};

const DEFAULT_EVENTS: &[&str] = &[
    "World Cup Viewing Parties",
    "Skills Challenge & Games",
    "Photo Booth Experience",
    "Food Truck Festival",
    "Live Music & Entertainment",
    "Meet & Greet with Players",
    "FIFA Merchandise Shopping",
    "Kids Zone Activities",
];

/// Ordered list of event labels a fan may select on the signup form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCatalog(Vec<String>);

impl EventCatalog {
    /// Build the catalog from a comma-separated override, falling back to the built-in
    /// list when the override has no labels
    pub fn from_config(labels: &str) -> Self {
        let labels: Vec<String> = labels
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(String::from)
            .collect();

        if labels.is_empty() {
            Self::default()
        } else {
            Self(labels)
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|known| known == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for EventCatalog {
    fn default() -> Self {
        Self(DEFAULT_EVENTS.iter().map(|label| label.to_string()).collect())
    }
}

/// A non-empty selection of catalog labels, in the order first selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSelection(Vec<String>);

impl EventSelection {
    /// Validate submitted labels against the current catalog.
    ///
    /// Labels outside the catalog indicate a tampered form and are rejected.
    pub fn parse(selected: &[String], catalog: &EventCatalog) -> Result<Self, FieldErrors> {
        let mut labels: Vec<String> = Vec::with_capacity(selected.len());
        let mut errors = FieldErrors::new();

        for label in selected.iter().map(|label| label.trim()) {
            if label.is_empty() {
                continue;
            }
            if !catalog.contains(label) {
                errors.push(FieldError::format_owned(format!(
                    "'{}' is not a valid choice",
                    label
                )));
            } else if !labels.iter().any(|seen| seen == label) {
                labels.push(label.to_string());
            }
        }

        if labels.is_empty() && errors.is_empty() {
            errors.push(FieldError::required("Please select at least one event"));
        }

        if errors.is_empty() {
            Ok(Self(labels))
        } else {
            Err(errors)
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}
