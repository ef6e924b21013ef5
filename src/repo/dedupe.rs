use std::time::Duration;

use sqlx::PgPool;

/// Short-lived "recently submitted" markers shared by every web-tier instance
#[async_trait::async_trait]
pub trait DedupeCache: Send + Sync {
    /// Atomically set a marker for `key` unless a live one exists.
    ///
    /// Returns `true` if this caller now owns the marker, `false` if it was already taken.
    async fn claim(&self, key: &str, ttl: Duration) -> sqlx::Result<bool>;

    /// Remove a marker so the key can be claimed again
    async fn release(&self, key: &str) -> sqlx::Result<()>;

    /// Drop every expired marker, returning how many were removed
    async fn purge_expired(&self) -> sqlx::Result<u64>;
}

/// Postgres-backed dedupe cache.
///
/// Expired markers are overwritten in place by the next claim of the same key, and
/// swept by [`DedupeCache::purge_expired`] otherwise.
#[derive(Debug, Clone)]
pub struct PgDedupeCache {
    pool: PgPool,
}

impl PgDedupeCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DedupeCache for PgDedupeCache {
    #[tracing::instrument(name = "Claim dedupe marker", skip(self, key))]
    async fn claim(&self, key: &str, ttl: Duration) -> sqlx::Result<bool> {
        let claimed: Option<String> = sqlx::query_scalar(
            r#"
            insert into dedupe_markers(key, expires_at)
            values ($1, now() + make_interval(secs => $2))
            on conflict (key) do update
                set expires_at=excluded.expires_at
                where dedupe_markers.expires_at <= now()
            returning key
            "#,
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.is_some())
    }

    #[tracing::instrument(name = "Release dedupe marker", skip(self, key))]
    async fn release(&self, key: &str) -> sqlx::Result<()> {
        sqlx::query("delete from dedupe_markers where key=$1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(name = "Purge expired dedupe markers", skip(self))]
    async fn purge_expired(&self) -> sqlx::Result<u64> {
        let purged = sqlx::query("delete from dedupe_markers where expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(purged.rows_affected())
    }
}
