use std::net::TcpListener;

use anyhow::Context;

use sqlx::postgres::PgPoolOptions;

use fanfest_signup::app::{self, Services};
use fanfest_signup::settings::Settings;
use fanfest_signup::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    telemetry::init_stdout(&settings.log.env_filter())?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect_with(settings.database.with_db()?)
        .await
        .context("Failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let listener = TcpListener::bind(settings.app.addr())?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    let services = Services::postgres(pool, &settings);

    app::run(listener, services, &settings)?
        .await
        .context("Failed to run app")
}
