mod jobs;
mod signups;

pub use jobs::NotificationJob;
pub use signups::{ClientMeta, DeliveryStatus, NewSignup, SignupRecord};
