use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "nwpfetch=debug"
    } else {
        "nwpfetch=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
