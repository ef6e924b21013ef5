//! Notification worker: consumes queued confirmation jobs and texts the fan.
//!
//! Delivery is at-least-once, so every job is handled idempotently. A signup that
//! already has `sms_sent` set is acknowledged without sending again, and recording the
//! same terminal state twice is harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tokio::task::JoinSet;

use tokio_util::sync::CancellationToken;

use crate::client::{Sms, SmsError, SmsSink};
use crate::domain::PhoneNumber;
use crate::repo::{Delivery, QueueError, Redelivery, SignupStore, TaskQueue};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Task queue failure")]
    Queue(#[from] QueueError),
}

/// How a single delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Confirmation sent and recorded
    Sent,
    /// A previous delivery already sent the confirmation
    AlreadySent,
    /// The signup no longer exists; the job was dropped
    RecordMissing,
    /// The phone number cannot be texted; delivery marked failed
    InvalidPhone,
    /// The carrier refused the message; delivery marked failed
    Rejected,
    /// Returned to the queue for a later attempt
    Retrying,
    /// Out of attempts; delivery marked failed
    Exhausted,
    /// Shutdown arrived mid-job; the job stays unacknowledged for redelivery
    Interrupted,
    /// Out of attempts but the failure could not be recorded; the job stays
    /// unacknowledged for redelivery
    Deferred,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Pause between polls when the queue is empty or unreachable
    pub poll_interval: Duration,
    /// Upper bound on a single queue receive
    pub receive_timeout: Duration,
    /// Upper bound on a single SMS sink call
    pub send_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            receive_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(15),
        }
    }
}

/// Fixed confirmation text, personalized with the fan's name
pub fn confirmation_message(name: &str) -> String {
    format!(
        "\u{1F389} Hey {}!\n\n\
         Thanks for signing up for the Kansas City FIFA Fan Fest!\n\n\
         Your registration is confirmed and we're excited to see you there! \u{26BD}\n\n\
         Keep an eye out for updates as we get closer to the event.\n\n\
         Need to make changes? Reply STOP to unsubscribe.\n\n\
         #KCFIFAFest #WorldCup",
        name
    )
}

pub struct NotificationWorker {
    queue: Arc<dyn TaskQueue>,
    signups: Arc<dyn SignupStore>,
    sms: Arc<dyn SmsSink>,
    options: WorkerOptions,
}

impl NotificationWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        signups: Arc<dyn SignupStore>,
        sms: Arc<dyn SmsSink>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            signups,
            sms,
            options,
        }
    }

    /// Run `concurrency` consumer loops until `shutdown` is cancelled
    pub async fn run(self: Arc<Self>, concurrency: usize, shutdown: CancellationToken) {
        let mut consumers = JoinSet::new();
        for consumer in 0..concurrency.max(1) {
            let worker = Arc::clone(&self);
            let shutdown = shutdown.clone();
            consumers.spawn(async move { worker.run_until_stopped(consumer, shutdown).await });
        }

        while let Some(joined) = consumers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error.cause_chain = ?e, "Notification consumer panicked");
            }
        }
    }

    /// Consume jobs one at a time until `shutdown` is cancelled
    #[tracing::instrument(name = "Notification consumer", skip(self, shutdown))]
    pub async fn run_until_stopped(&self, consumer: usize, shutdown: CancellationToken) {
        tracing::info!("Consumer started");

        loop {
            let received = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                received = tokio::time::timeout(self.options.receive_timeout, self.queue.receive()) => received,
            };

            match received {
                Ok(Ok(Some(delivery))) => match self.process(&delivery, &shutdown).await {
                    Ok(outcome) => tracing::debug!(?outcome, "Finished notification job"),
                    Err(e) => tracing::error!(error.cause_chain = ?e, "Failed to settle notification job"),
                },
                Ok(Ok(None)) => self.idle(&shutdown).await,
                Ok(Err(e)) => {
                    tracing::error!(error.cause_chain = ?e, "Failed to receive notification job");
                    self.idle(&shutdown).await;
                }
                Err(_) => tracing::warn!("Timed out waiting for the task queue"),
            }
        }

        tracing::info!("Consumer stopped");
    }

    async fn idle(&self, shutdown: &CancellationToken) {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(self.options.poll_interval) => {}
        }
    }

    /// Handle one delivery, acknowledging or returning it to the queue
    #[tracing::instrument(
        name = "Process notification job",
        skip_all,
        fields(job_id = %delivery.receipt, signup_id = %delivery.job.signup_id, attempt = delivery.attempt)
    )]
    pub async fn process(
        &self,
        delivery: &Delivery,
        shutdown: &CancellationToken,
    ) -> Result<JobOutcome, WorkerError> {
        let job = &delivery.job;

        let record = match self.signups.fetch_by_id(job.signup_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("Signup no longer exists, dropping job");
                self.queue.ack(delivery).await?;
                return Ok(JobOutcome::RecordMissing);
            }
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Failed to load signup");
                return self.retry(delivery, "failed to load signup").await;
            }
        };

        if record.sms_sent {
            tracing::info!("Confirmation already sent");
            self.queue.ack(delivery).await?;
            return Ok(JobOutcome::AlreadySent);
        }

        let recipient = match PhoneNumber::normalize(&job.phone) {
            Ok(recipient) => recipient,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot text this phone number");
                return self.fail(delivery, JobOutcome::InvalidPhone).await;
            }
        };

        let sms = Sms {
            recipient,
            body: confirmation_message(&job.name),
        };

        let sent = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                tracing::info!("Shutting down mid-job, leaving it for redelivery");
                return Ok(JobOutcome::Interrupted);
            }
            sent = tokio::time::timeout(self.options.send_timeout, self.sms.send(&sms)) => {
                sent.unwrap_or_else(|_| Err(SmsError::Transient("SMS sink timed out".into())))
            }
        };

        match sent {
            Ok(receipt) => {
                tracing::info!(sid = %receipt.sid, status = %receipt.status, "Confirmation sent");
                match self.signups.mark_sms_sent(job.signup_id, Utc::now()).await {
                    Ok(true) => {
                        self.queue.ack(delivery).await?;
                        Ok(JobOutcome::Sent)
                    }
                    Ok(false) => {
                        tracing::warn!("Signup disappeared before the send was recorded");
                        self.queue.ack(delivery).await?;
                        Ok(JobOutcome::RecordMissing)
                    }
                    Err(e) => {
                        tracing::error!(error.cause_chain = ?e, "Failed to record sent confirmation");
                        self.retry(delivery, "failed to record sent confirmation").await
                    }
                }
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error.cause_chain = ?e, "Transient SMS failure");
                self.retry(delivery, &e.to_string()).await
            }
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "SMS rejected");
                self.fail(delivery, JobOutcome::Rejected).await
            }
        }
    }

    /// Record a terminal failure and drop the job
    async fn fail(&self, delivery: &Delivery, outcome: JobOutcome) -> Result<JobOutcome, WorkerError> {
        if let Err(e) = self.signups.mark_sms_failed(delivery.job.signup_id).await {
            tracing::error!(error.cause_chain = ?e, "Failed to record failed confirmation");
            return self.retry(delivery, "failed to record failed confirmation").await;
        }
        self.queue.ack(delivery).await?;
        Ok(outcome)
    }

    /// Return the job under the queue's retry policy.
    ///
    /// On the last attempt the delivery is marked failed before the job is dead-lettered.
    async fn retry(&self, delivery: &Delivery, reason: &str) -> Result<JobOutcome, WorkerError> {
        let policy = self.queue.retry_policy();
        if policy.after_failed_attempt(delivery.attempt) == Redelivery::Exhausted {
            tracing::error!(reason, "Notification attempts exhausted");
            if let Err(e) = self.signups.mark_sms_failed(delivery.job.signup_id).await {
                tracing::error!(
                    error.cause_chain = ?e,
                    "Failed to record failed confirmation, leaving job for redelivery"
                );
                return Ok(JobOutcome::Deferred);
            }
        }

        match self.queue.nack(delivery, reason).await? {
            Redelivery::Scheduled { after } => {
                tracing::info!(retry_in_secs = after.as_secs(), "Scheduled notification retry");
                Ok(JobOutcome::Retrying)
            }
            Redelivery::Exhausted => Ok(JobOutcome::Exhausted),
        }
    }
}
