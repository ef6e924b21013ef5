use super::event_catalog::{EventCatalog, EventSelection};
use super::validation::{Field, ValidationErrors};
use super::{EmailAddress, PersonName, RawPhone, ZipCode};

/// Raw values of a submitted signup form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub zip_code: String,
    pub events_interested: Vec<String>,
}

/// A signup whose every field passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub name: PersonName,
    pub email: EmailAddress,
    pub phone: Option<RawPhone>,
    pub zip_code: ZipCode,
    pub events_interested: EventSelection,
}

impl SignupRequest {
    /// Validate every field of the form independently against the current catalog.
    ///
    /// Either all fields parse, or every failure of every field is reported.
    pub fn validate(form: &SignupForm, catalog: &EventCatalog) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.collect(Field::Name, form.name.parse());
        let email = errors.collect(Field::Email, form.email.parse());
        let phone = errors.collect(Field::Phone, RawPhone::parse_optional(&form.phone));
        let zip_code = errors.collect(Field::ZipCode, form.zip_code.parse());
        let events_interested = errors.collect(
            Field::EventsInterested,
            EventSelection::parse(&form.events_interested, catalog),
        );

        match (name, email, phone, zip_code, events_interested) {
            (Some(name), Some(email), Some(phone), Some(zip_code), Some(events_interested)) => {
                Ok(Self {
                    name,
                    email,
                    phone,
                    zip_code,
                    events_interested,
                })
            }
            _ => Err(errors),
        }
    }
}
