use std::sync::Arc;

use anyhow::Context;

use sqlx::postgres::PgPoolOptions;

use tokio_util::sync::CancellationToken;

use fanfest_signup::app::Services;
use fanfest_signup::client::SmsClient;
use fanfest_signup::housekeeping::Housekeeper;
use fanfest_signup::settings::Settings;
use fanfest_signup::telemetry;
use fanfest_signup::worker::NotificationWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    telemetry::init_stdout(&settings.log.env_filter())?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(settings.database.with_db()?)
        .await
        .context("Failed to connect to the database")?;

    let services = Services::postgres(pool, &settings);

    let housekeeper = Housekeeper::new(
        services.dedupe,
        services.rate_limits,
        settings.rate_limit.window(),
        settings.worker.housekeeping_interval(),
    );

    let sms = &settings.sms;
    let sms_client = SmsClient::new(
        sms.from_number.clone(),
        sms.api_timeout(),
        sms.api_base_url()?,
        sms.account_sid.clone(),
        sms.auth_token.clone(),
    )?;

    let worker = Arc::new(NotificationWorker::new(
        services.queue,
        services.signups,
        Arc::new(sms_client),
        settings.worker.options(sms.api_timeout()),
    ));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => {
                    tracing::error!(error.cause_chain = ?e, "Failed to listen for shutdown signal")
                }
            }
        }
    });

    let housekeeping = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { housekeeper.run(shutdown).await }
    });

    tracing::info!(concurrency = settings.worker.concurrency, "Starting notification worker");
    worker.run(settings.worker.concurrency, shutdown).await;

    housekeeping.await.context("Housekeeping task panicked")?;

    Ok(())
}
