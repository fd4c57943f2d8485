//! Log output for the `bronze` and `refinery` binaries.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Used when `RUST_LOG` is unset or invalid. Object store clients log every
/// request at `debug`, so they stay at `warn` unless asked for.
const DEFAULT_DIRECTIVES: &str = "info,object_store=warn,hyper=warn,reqwest=warn";

/// Install the global subscriber, writing to stderr.
///
/// Colours are only enabled when stderr is a terminal.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVES).is_ok());
    }
}
