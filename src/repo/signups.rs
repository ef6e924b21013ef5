use chrono::{DateTime, Utc};

use sqlx::PgPool;

use uuid::Uuid;

use crate::model::{NewSignup, SignupRecord};

/// Durable storage for signup records.
///
/// Only the signup pipeline inserts, and only the notification worker touches the
/// notification-state columns.
#[async_trait::async_trait]
pub trait SignupStore: Send + Sync {
    /// Insert a new signup in its own transaction, returning the assigned ID
    async fn insert(&self, new_signup: &NewSignup) -> sqlx::Result<Uuid>;

    /// Fetch a signup by ID
    async fn fetch_by_id(&self, id: Uuid) -> sqlx::Result<Option<SignupRecord>>;

    /// Record a successful SMS confirmation. Returns `false` if the signup does not exist.
    async fn mark_sms_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> sqlx::Result<bool>;

    /// Record a terminal SMS failure, unless a confirmation was already sent.
    /// Returns `false` if nothing was updated.
    async fn mark_sms_failed(&self, id: Uuid) -> sqlx::Result<bool>;

    /// Count every stored signup
    async fn count_all(&self) -> sqlx::Result<i64>;

    /// Count signups created at or after `since`
    async fn count_created_since(&self, since: DateTime<Utc>) -> sqlx::Result<i64>;

    /// Cheapest possible round trip to the store
    async fn ping(&self) -> sqlx::Result<()>;
}

/// Postgres signup store
#[derive(Debug, Clone)]
pub struct PgSignupStore {
    pool: PgPool,
}

impl PgSignupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SignupStore for PgSignupStore {
    #[tracing::instrument(name = "Insert signup", skip_all)]
    async fn insert(&self, new_signup: &NewSignup) -> sqlx::Result<Uuid> {
        let record = SignupRecord::from_new(Uuid::new_v4(), new_signup, Utc::now());

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            insert into signups(
                id, name, email, phone, zip_code, events_interested,
                ip_address, user_agent, source_url, created_at, updated_at
            )
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.email)
        .bind(&record.phone)
        .bind(&record.zip_code)
        .bind(&record.events_interested)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(&record.source_url)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(record.id)
    }

    #[tracing::instrument(name = "Fetch signup by id", skip(self))]
    async fn fetch_by_id(&self, id: Uuid) -> sqlx::Result<Option<SignupRecord>> {
        sqlx::query_as::<_, SignupRecord>("select * from signups where id=$1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    #[tracing::instrument(name = "Mark signup SMS as sent", skip(self))]
    async fn mark_sms_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> sqlx::Result<bool> {
        // A redelivered job keeps the first send time
        let result = sqlx::query(
            r#"
            update signups
            set sms_sent=true,
                sms_sent_at=coalesce(sms_sent_at, $2),
                sms_delivery_status='sent',
                updated_at=now()
            where id=$1
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Mark signup SMS as failed", skip(self))]
    async fn mark_sms_failed(&self, id: Uuid) -> sqlx::Result<bool> {
        let result = sqlx::query(
            r#"
            update signups
            set sms_delivery_status='failed', updated_at=now()
            where id=$1 and not sms_sent
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Count signups", skip(self))]
    async fn count_all(&self) -> sqlx::Result<i64> {
        sqlx::query_scalar("select count(*) from signups")
            .fetch_one(&self.pool)
            .await
    }

    #[tracing::instrument(name = "Count signups created since", skip(self))]
    async fn count_created_since(&self, since: DateTime<Utc>) -> sqlx::Result<i64> {
        sqlx::query_scalar("select count(*) from signups where created_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await
    }

    async fn ping(&self) -> sqlx::Result<()> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }
}
