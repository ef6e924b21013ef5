use std::sync::Arc;

use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, HttpResponse};

use chrono::{DateTime, TimeZone, Utc};

use serde::Serialize;

use crate::error::RestResult;
use crate::repo::SignupStore;

/// Liveness and aggregate counters, read-only against the signup store
pub struct HealthReporter {
    signups: Arc<dyn SignupStore>,
    metrics_enabled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_signups: i64,
    pub today_signups: i64,
    pub timestamp: DateTime<Utc>,
}

impl HealthReporter {
    pub fn new(signups: Arc<dyn SignupStore>, metrics_enabled: bool) -> Self {
        Self {
            signups,
            metrics_enabled,
        }
    }

    pub async fn is_healthy(&self) -> bool {
        match self.signups.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Storage liveness probe failed");
                false
            }
        }
    }

    /// Counters as of `now`, or `None` when metrics are disabled
    pub async fn metrics(&self, now: DateTime<Utc>) -> sqlx::Result<Option<Metrics>> {
        if !self.metrics_enabled {
            return Ok(None);
        }

        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| Utc.from_utc_datetime(&midnight))
            .unwrap_or(now);

        Ok(Some(Metrics {
            total_signups: self.signups.count_all().await?,
            today_signups: self.signups.count_created_since(start_of_day).await?,
            timestamp: now,
        }))
    }
}

#[tracing::instrument(name = "Health check", skip_all)]
#[get("/health")]
async fn health_check(reporter: web::Data<HealthReporter>) -> HttpResponse {
    if reporter.is_healthy().await {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "timestamp": Utc::now(),
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": "Storage unavailable",
        }))
    }
}

#[tracing::instrument(name = "Collect metrics", skip_all)]
#[get("/metrics")]
async fn show_metrics(reporter: web::Data<HealthReporter>) -> RestResult<HttpResponse> {
    match reporter.metrics(Utc::now()).await? {
        Some(metrics) => Ok(HttpResponse::Ok().json(metrics)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Metrics disabled",
        }))),
    }
}

/// Operational endpoints
pub fn services() -> impl HttpServiceFactory {
    (health_check, show_metrics)
}
