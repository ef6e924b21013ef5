//! In-process stand-ins for the shared stores.
//!
//! They honor the same contracts as the Postgres stores (atomic dedupe claims, visibility
//! timeouts, retry policy) but only within one process, which makes them suitable for
//! tests and local experiments, not for a fleet of web-tier instances.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

use tokio::sync::Mutex;
use tokio::time::Instant;

use uuid::Uuid;

use crate::model::{DeliveryStatus, NewSignup, NotificationJob, SignupRecord};

use super::{
    DedupeCache, Delivery, QueueError, RateLimitStore, Redelivery, RetryPolicy, SignupStore,
    TaskQueue,
};

fn unavailable() -> sqlx::Error {
    sqlx::Error::PoolTimedOut
}

/// Signup store backed by a map
#[derive(Debug, Default)]
pub struct MemorySignupStore {
    records: Mutex<HashMap<Uuid, SignupRecord>>,
    failing: AtomicBool,
    failing_marks: AtomicBool,
}

impl MemorySignupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make only notification-state updates fail, leaving reads and inserts working
    pub fn set_failing_marks(&self, failing: bool) {
        self.failing_marks.store(failing, Ordering::SeqCst);
    }

    /// Store a record as-is, bypassing the insert path
    pub async fn seed(&self, record: SignupRecord) {
        self.records.lock().await.insert(record.id, record);
    }

    /// Every stored record, oldest first
    pub async fn records(&self) -> Vec<SignupRecord> {
        let mut records: Vec<SignupRecord> = self.records.lock().await.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    fn check_available(&self) -> sqlx::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }

    fn check_markable(&self) -> sqlx::Result<()> {
        self.check_available()?;
        if self.failing_marks.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl SignupStore for MemorySignupStore {
    async fn insert(&self, new_signup: &NewSignup) -> sqlx::Result<Uuid> {
        self.check_available()?;

        let record = SignupRecord::from_new(Uuid::new_v4(), new_signup, Utc::now());
        let id = record.id;
        self.records.lock().await.insert(id, record);
        Ok(id)
    }

    async fn fetch_by_id(&self, id: Uuid) -> sqlx::Result<Option<SignupRecord>> {
        self.check_available()?;
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn mark_sms_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> sqlx::Result<bool> {
        self.check_markable()?;

        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&id) else {
            return Ok(false);
        };
        record.sms_sent = true;
        record.sms_sent_at = record.sms_sent_at.or(Some(sent_at));
        record.sms_delivery_status = Some(DeliveryStatus::Sent.to_string());
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_sms_failed(&self, id: Uuid) -> sqlx::Result<bool> {
        self.check_markable()?;

        let mut records = self.records.lock().await;
        match records.get_mut(&id) {
            Some(record) if !record.sms_sent => {
                record.sms_delivery_status = Some(DeliveryStatus::Failed.to_string());
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_all(&self) -> sqlx::Result<i64> {
        self.check_available()?;
        Ok(self.records.lock().await.len() as i64)
    }

    async fn count_created_since(&self, since: DateTime<Utc>) -> sqlx::Result<i64> {
        self.check_available()?;
        let records = self.records.lock().await;
        Ok(records.values().filter(|r| r.created_at >= since).count() as i64)
    }

    async fn ping(&self) -> sqlx::Result<()> {
        self.check_available()
    }
}

/// Dedupe cache backed by a map of expiry instants
#[derive(Debug, Default)]
pub struct MemoryDedupeCache {
    markers: Mutex<HashMap<String, Instant>>,
    failing_release: AtomicBool,
}

impl MemoryDedupeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent release fail
    pub fn set_failing_release(&self, failing: bool) {
        self.failing_release.store(failing, Ordering::SeqCst);
    }

    /// Stored markers, expired or not
    pub async fn marker_count(&self) -> usize {
        self.markers.lock().await.len()
    }

    pub async fn is_marked(&self, key: &str) -> bool {
        let markers = self.markers.lock().await;
        markers
            .get(key)
            .map_or(false, |expires_at| *expires_at > Instant::now())
    }
}

#[async_trait::async_trait]
impl DedupeCache for MemoryDedupeCache {
    async fn claim(&self, key: &str, ttl: Duration) -> sqlx::Result<bool> {
        let now = Instant::now();
        let mut markers = self.markers.lock().await;

        match markers.get(key) {
            Some(expires_at) if *expires_at > now => Ok(false),
            _ => {
                markers.insert(key.to_string(), now + ttl);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> sqlx::Result<()> {
        if self.failing_release.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.markers.lock().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> sqlx::Result<u64> {
        let now = Instant::now();
        let mut markers = self.markers.lock().await;
        let before = markers.len();
        markers.retain(|_, expires_at| *expires_at > now);
        Ok((before - markers.len()) as u64)
    }
}

/// Rate-limit counters backed by a map
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    hits: Mutex<HashMap<String, (DateTime<Utc>, i64)>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys with a stored counter
    pub async fn counter_count(&self) -> usize {
        self.hits.lock().await.len()
    }
}

#[async_trait::async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window_start: DateTime<Utc>) -> sqlx::Result<i64> {
        let mut hits = self.hits.lock().await;
        let entry = hits.entry(key.to_string()).or_insert((window_start, 0));

        // Only the current window of each key is kept
        if entry.0 != window_start {
            *entry = (window_start, 0);
        }
        entry.1 += 1;

        Ok(entry.1)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> sqlx::Result<u64> {
        let mut hits = self.hits.lock().await;
        let before = hits.len();
        hits.retain(|_, (window_start, _)| *window_start >= cutoff);
        Ok((before - hits.len()) as u64)
    }
}

#[derive(Debug, Clone)]
struct QueuedJob {
    id: Uuid,
    job: NotificationJob,
    attempts: u32,
    next_attempt_at: Instant,
    locked_until: Option<Instant>,
    dead: bool,
}

/// Task queue backed by a list
#[derive(Debug)]
pub struct MemoryTaskQueue {
    jobs: Mutex<Vec<QueuedJob>>,
    policy: RetryPolicy,
    visibility_timeout: Duration,
    failing: AtomicBool,
}

impl MemoryTaskQueue {
    pub fn new(policy: RetryPolicy, visibility_timeout: Duration) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            policy,
            visibility_timeout,
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail as if the broker were unreachable
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Jobs still waiting to be processed, in or out of flight
    pub async fn pending(&self) -> Vec<NotificationJob> {
        let jobs = self.jobs.lock().await;
        jobs.iter().filter(|q| !q.dead).map(|q| q.job.clone()).collect()
    }

    /// Jobs dead-lettered after exhausting their attempts
    pub async fn dead_letters(&self) -> Vec<NotificationJob> {
        let jobs = self.jobs.lock().await;
        jobs.iter().filter(|q| q.dead).map(|q| q.job.clone()).collect()
    }

    fn check_available(&self) -> Result<(), QueueError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(QueueError::Database(unavailable()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::DEFAULT, Duration::from_secs(60))
    }
}

#[async_trait::async_trait]
impl TaskQueue for MemoryTaskQueue {
    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn enqueue(&self, job: &NotificationJob) -> Result<Uuid, QueueError> {
        self.check_available()?;

        let id = Uuid::new_v4();
        self.jobs.lock().await.push(QueuedJob {
            id,
            job: job.clone(),
            attempts: 0,
            next_attempt_at: Instant::now(),
            locked_until: None,
            dead: false,
        });
        Ok(id)
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        self.check_available()?;

        let now = Instant::now();
        let mut jobs = self.jobs.lock().await;
        let ready = jobs
            .iter_mut()
            .filter(|q| !q.dead && q.next_attempt_at <= now)
            .filter(|q| q.locked_until.map_or(true, |until| until <= now))
            .min_by_key(|q| q.next_attempt_at);

        Ok(ready.map(|queued| {
            queued.attempts += 1;
            queued.locked_until = Some(now + self.visibility_timeout);
            Delivery {
                receipt: queued.id,
                attempt: queued.attempts,
                job: queued.job.clone(),
            }
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.check_available()?;
        self.jobs.lock().await.retain(|q| q.id != delivery.receipt);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery, _reason: &str) -> Result<Redelivery, QueueError> {
        self.check_available()?;

        let redelivery = self.policy.after_failed_attempt(delivery.attempt);
        let mut jobs = self.jobs.lock().await;
        if let Some(queued) = jobs.iter_mut().find(|q| q.id == delivery.receipt) {
            queued.locked_until = None;
            match redelivery {
                Redelivery::Scheduled { after } => queued.next_attempt_at = Instant::now() + after,
                Redelivery::Exhausted => queued.dead = true,
            }
        }
        Ok(redelivery)
    }
}
