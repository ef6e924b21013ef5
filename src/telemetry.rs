use anyhow::Context;

use tracing::{subscriber::set_global_default, Subscriber};

use tracing_log::LogTracer;

use tracing_subscriber::fmt::{self, format::FmtSpan, MakeWriter};
use tracing_subscriber::EnvFilter;

/// Build a subscriber writing to `sink`, filtered by an `EnvFilter` directive
pub fn create_subscriber<Sink>(env_filter: &str, sink: Sink) -> impl Subscriber + Send + Sync
where
    Sink: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fmt::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_writer(sink)
        .finish()
}

/// Install `subscriber` globally, routing `log` records through it
pub fn set_subscriber(subscriber: impl Subscriber + Send + Sync) -> anyhow::Result<()> {
    LogTracer::init().context("Failed to initalize logging")?;

    set_global_default(subscriber).context("Failed to set global subscriber")
}

/// Log to stdout with the given filter; used by both binaries
pub fn init_stdout(env_filter: &str) -> anyhow::Result<()> {
    set_subscriber(create_subscriber(env_filter, std::io::stdout))
}
