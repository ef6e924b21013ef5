/// Liveness and metrics endpoints
pub mod health;
/// Signup form, submission and confirmation pages
pub mod signups;
