mod email_address;
mod event_catalog;
mod person_name;
mod phone_number;
mod signup_request;
mod validation;
mod zip_code;

pub use email_address::EmailAddress;
pub use event_catalog::{EventCatalog, EventSelection};
pub use person_name::PersonName;
pub use phone_number::{InvalidPhoneFormat, PhoneNumber, RawPhone};
pub use signup_request::{SignupForm, SignupRequest};
pub use validation::{Field, FieldError, FieldErrorKind, FieldErrors, ValidationErrors};
pub use zip_code::ZipCode;
