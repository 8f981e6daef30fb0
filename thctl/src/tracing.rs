//! Logging setup.
//!
//! Library code logs through [`prelude`]; only the binary installs a
//! subscriber. Output goes to stderr so it never mixes with command output
//! on stdout.

use time::macros::format_description;
use tracing_subscriber::{EnvFilter, fmt::time::UtcTime};

pub mod prelude {
    pub use tracing::{debug, error, info, trace, warn};
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the filter is `warn`, or `debug` for
/// this crate when `verbose` is set.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "warn,thctl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let timer = UtcTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    // A subscriber may already be installed (e.g. by a test harness).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_writer(std::io::stderr)
        .try_init();
}
