use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};

use sqlx::PgPool;

use tracing_actix_web::TracingLogger;

use crate::catalog::CatalogCache;
use crate::controller::{health, signups};
use crate::pipeline::SignupPipeline;
use crate::rate_limit::RateLimiter;
use crate::repo::{
    DedupeCache, PgDedupeCache, PgRateLimitStore, PgSignupStore, PgTaskQueue, RateLimitStore,
    SignupStore, TaskQueue,
};
use crate::settings::Settings;

/// Shared infrastructure handed to the web tier and the workers
#[derive(Clone)]
pub struct Services {
    pub signups: Arc<dyn SignupStore>,
    pub dedupe: Arc<dyn DedupeCache>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub queue: Arc<dyn TaskQueue>,
}

impl Services {
    /// Every store backed by the same Postgres pool
    pub fn postgres(pool: PgPool, settings: &Settings) -> Self {
        Self {
            signups: Arc::new(PgSignupStore::new(pool.clone())),
            dedupe: Arc::new(PgDedupeCache::new(pool.clone())),
            rate_limits: Arc::new(PgRateLimitStore::new(pool.clone())),
            queue: Arc::new(PgTaskQueue::new(
                pool,
                settings.worker.retry_policy(),
                settings.worker.visibility_timeout(),
            )),
        }
    }
}

/// Run the application on a specified TCP listener
pub fn run(listener: TcpListener, services: Services, settings: &Settings) -> anyhow::Result<Server> {
    // Wrap application data
    let pipeline = web::Data::new(SignupPipeline::new(
        services.signups.clone(),
        services.dedupe.clone(),
        services.queue.clone(),
        settings.dedupe.ttl(),
    ));
    let limiter = web::Data::new(
        RateLimiter::new(
            services.rate_limits.clone(),
            settings.rate_limit.limits(),
            settings.rate_limit.window(),
        )
        .trust_forwarded_headers(settings.rate_limit.trust_forwarded_headers),
    );
    let catalog = web::Data::new(CatalogCache::new(
        settings.events.catalog.clone(),
        settings.events.cache_ttl(),
        settings.events.page_cache_ttl(),
    ));
    let reporter = web::Data::new(health::HealthReporter::new(
        services.signups.clone(),
        settings.app.metrics_enabled,
    ));
    let signup_store: web::Data<dyn SignupStore> = web::Data::from(services.signups);

    // Start the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(pipeline.clone())
            .app_data(limiter.clone())
            .app_data(catalog.clone())
            .app_data(reporter.clone())
            .app_data(signup_store.clone())
            .service(health::services())
            .service(signups::services())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
