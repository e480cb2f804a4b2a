use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Logs go to stderr so reports on stdout
/// stay pipeable.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects `debug` and the
/// configured level applies.
pub fn init_logger(default_level: &str, verbose: bool) {
    let fallback = if verbose { "debug" } else { default_level };
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(filter_layer)
        .try_init();
}
