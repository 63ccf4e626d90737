//! Tracing subscriber setup
//!
//! Logs go to stderr so stdout stays reserved for results. The filter comes
//! from `DEPCHECK_LOG` (standard `EnvFilter` syntax) and defaults to
//! `depcheck=info`, or `depcheck=debug` with `--verbose`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "DEPCHECK_LOG";

pub fn init(verbose: bool) {
    let default = if verbose {
        "depcheck=debug"
    } else {
        "depcheck=info"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
