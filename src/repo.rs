mod dedupe;
mod jobs;
pub mod memory;
mod rate_limits;
mod signups;

pub use dedupe::{DedupeCache, PgDedupeCache};
pub use jobs::{Delivery, PgTaskQueue, QueueError, Redelivery, RetryPolicy, TaskQueue};
pub use rate_limits::{PgRateLimitStore, RateLimitStore};
pub use signups::{PgSignupStore, SignupStore};
