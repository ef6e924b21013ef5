use chrono::{DateTime, Utc};

use sqlx::PgPool;

/// Fixed-window hit counters shared by every web-tier instance
#[async_trait::async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one hit against `key` in the window starting at `window_start`,
    /// returning the number of hits in that window so far (this one included)
    async fn hit(&self, key: &str, window_start: DateTime<Utc>) -> sqlx::Result<i64>;

    /// Drop every counter whose window started before `cutoff`, returning how many were removed
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> sqlx::Result<u64>;
}

/// Postgres-backed rate-limit counters
#[derive(Debug, Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RateLimitStore for PgRateLimitStore {
    #[tracing::instrument(name = "Count rate-limited hit", skip(self))]
    async fn hit(&self, key: &str, window_start: DateTime<Utc>) -> sqlx::Result<i64> {
        let hits: i64 = sqlx::query_scalar(
            r#"
            insert into rate_limit_counters(bucket_key, window_start, hits)
            values ($1, $2, 1)
            on conflict (bucket_key, window_start) do update
                set hits=rate_limit_counters.hits + 1
            returning hits
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        // The first hit of a window retires the key's older windows
        if hits == 1 {
            sqlx::query("delete from rate_limit_counters where bucket_key=$1 and window_start < $2")
                .bind(key)
                .bind(window_start)
                .execute(&self.pool)
                .await?;
        }

        Ok(hits)
    }

    #[tracing::instrument(name = "Purge stale rate-limit counters", skip(self))]
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> sqlx::Result<u64> {
        let purged = sqlx::query("delete from rate_limit_counters where window_start < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(purged.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    #[ignore = "requires a Postgres database at DATABASE_URL"]
    async fn hits_are_counted_per_window(pool: PgPool) {
        let store = PgRateLimitStore::new(pool);
        let first = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let second = DateTime::from_timestamp(1_700_000_060, 0).unwrap();

        assert_eq!(1, store.hit("submit:10.0.0.1", first).await.unwrap());
        assert_eq!(2, store.hit("submit:10.0.0.1", first).await.unwrap());
        assert_eq!(1, store.hit("view:10.0.0.1", first).await.unwrap());
        assert_eq!(1, store.hit("submit:10.0.0.1", second).await.unwrap());
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres database at DATABASE_URL"]
    async fn purge_drops_windows_before_cutoff(pool: PgPool) {
        let store = PgRateLimitStore::new(pool);
        let first = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let second = DateTime::from_timestamp(1_700_000_060, 0).unwrap();

        store.hit("submit:10.0.0.1", first).await.unwrap();
        store.hit("submit:10.0.0.2", first).await.unwrap();
        store.hit("submit:10.0.0.3", second).await.unwrap();

        assert_eq!(2, store.purge_before(second).await.unwrap());
        assert_eq!(2, store.hit("submit:10.0.0.3", second).await.unwrap());
    }
}
