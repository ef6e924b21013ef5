use std::time::Duration;

use sqlx::PgPool;

use uuid::Uuid;

use crate::model::NotificationJob;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Task queue storage failure")]
    Database(#[from] sqlx::Error),

    #[error("Malformed job payload")]
    Payload(#[from] serde_json::Error),
}

/// A job handed to one consumer, invisible to others until acknowledged,
/// returned, or its visibility timeout lapses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Queue-side handle for acknowledging this delivery
    pub receipt: Uuid,
    /// 1-based count of deliveries of this job, this one included
    pub attempt: u32,
    pub job: NotificationJob,
}

/// What the queue did with a returned job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redelivery {
    /// The job becomes visible again after the backoff delay
    Scheduled { after: Duration },
    /// Attempts are used up and the job was dead-lettered
    Exhausted,
}

/// Bounded exponential backoff applied when a job is returned to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deliveries allowed before a returned job is dead-lettered
    pub max_attempts: u32,
    /// Delay after the first failed delivery
    pub initial_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        max_attempts: 5,
        initial_delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(30 * 60),
    };

    /// Delay before redelivering a job whose `attempt`-th delivery failed:
    /// `initial_delay * 2^(attempt - 1)`, capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Decide what happens to a job whose `attempt`-th delivery failed
    pub fn after_failed_attempt(&self, attempt: u32) -> Redelivery {
        if attempt >= self.max_attempts {
            Redelivery::Exhausted
        } else {
            Redelivery::Scheduled {
                after: self.delay_for_attempt(attempt),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Durable work queue carrying notification jobs from the web tier to the workers.
///
/// Delivery is at-least-once: a job that is neither acknowledged nor returned is
/// delivered again once its visibility timeout lapses.
#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    /// Policy [`TaskQueue::nack`] applies to returned jobs
    fn retry_policy(&self) -> RetryPolicy;

    /// Publish a job, returning its queue ID
    async fn enqueue(&self, job: &NotificationJob) -> Result<Uuid, QueueError>;

    /// Take the next ready job, if any
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;

    /// Remove a finished job from the queue
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Return a job after a retryable failure, applying the queue's retry policy
    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<Redelivery, QueueError>;
}

/// Postgres-backed task queue.
///
/// Consumers claim jobs with `for update skip locked`, so any number of workers can
/// share the table.
#[derive(Debug, Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
    policy: RetryPolicy,
    visibility_timeout: Duration,
}

#[derive(sqlx::FromRow)]
struct ClaimedRow {
    id: Uuid,
    attempts: i32,
    payload: String,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool, policy: RetryPolicy, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            policy,
            visibility_timeout,
        }
    }

    async fn dead_letter(&self, id: Uuid, reason: &str) -> sqlx::Result<()> {
        sqlx::query(
            "update notification_jobs set dead_at=now(), locked_until=null, last_error=$2 where id=$1",
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaskQueue for PgTaskQueue {
    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    #[tracing::instrument(name = "Enqueue notification job", skip(self, job), fields(signup_id = %job.signup_id))]
    async fn enqueue(&self, job: &NotificationJob) -> Result<Uuid, QueueError> {
        let payload = serde_json::to_string(job)?;

        let id: Uuid =
            sqlx::query_scalar("insert into notification_jobs(payload) values ($1) returning id")
                .bind(payload)
                .fetch_one(&self.pool)
                .await?;

        Ok(id)
    }

    #[tracing::instrument(name = "Receive notification job", skip(self))]
    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let row: Option<ClaimedRow> = sqlx::query_as(
            r#"
            update notification_jobs
            set attempts=attempts + 1,
                locked_until=now() + make_interval(secs => $1)
            where id = (
                select id from notification_jobs
                where dead_at is null
                    and next_attempt_at <= now()
                    and (locked_until is null or locked_until <= now())
                order by next_attempt_at
                for update skip locked
                limit 1
            )
            returning id, attempts, payload
            "#,
        )
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<NotificationJob>(&row.payload) {
            Ok(job) => Ok(Some(Delivery {
                receipt: row.id,
                attempt: u32::try_from(row.attempts).unwrap_or(1),
                job,
            })),
            Err(e) => {
                tracing::error!(job_id = %row.id, error.cause_chain = ?e, "Dead-lettering malformed job");
                self.dead_letter(row.id, "malformed payload").await?;
                Err(e.into())
            }
        }
    }

    #[tracing::instrument(name = "Acknowledge notification job", skip(self, delivery), fields(job_id = %delivery.receipt))]
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        sqlx::query("delete from notification_jobs where id=$1")
            .bind(delivery.receipt)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Return notification job", skip(self, delivery), fields(job_id = %delivery.receipt))]
    async fn nack(&self, delivery: &Delivery, reason: &str) -> Result<Redelivery, QueueError> {
        let redelivery = self.policy.after_failed_attempt(delivery.attempt);

        match redelivery {
            Redelivery::Scheduled { after } => {
                sqlx::query(
                    r#"
                    update notification_jobs
                    set locked_until=null,
                        next_attempt_at=now() + make_interval(secs => $2),
                        last_error=$3
                    where id=$1
                    "#,
                )
                .bind(delivery.receipt)
                .bind(after.as_secs_f64())
                .bind(reason)
                .execute(&self.pool)
                .await?;
            }
            Redelivery::Exhausted => self.dead_letter(delivery.receipt, reason).await?,
        }

        Ok(redelivery)
    }
}
