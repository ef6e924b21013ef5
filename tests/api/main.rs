mod health_check;
mod helpers;
mod notifications;
mod signups;
