use std::io::IsTerminal;
use tracing::{info, Subscriber};
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};

/// Log records go to `writer`; `init_logging` points it at stderr so that
/// stdout only carries the user-facing completion message.
pub fn subscriber<W>(filter: EnvFilter, writer: W, ansi: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .with(filter)
}

pub fn init_logging() {
    let level = if cfg!(debug_assertions) { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    subscriber(filter, std::io::stderr, std::io::stderr().is_terminal()).init();
    info!("logging to stderr (default level: {level})");
}
