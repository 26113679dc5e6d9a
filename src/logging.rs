//! `env_logger` setup for the benchmark binary.
//!
//! The library itself only talks to the `log` facade: `debug!` when a hash
//! table rehashes and `warn!` when an allocation fails. Nothing is printed
//! unless a binary installs a backend through this module.

use std::sync::Once;

use env_logger::Builder;
use log::LevelFilter;

static INIT: Once = Once::new();

/// Install the backend at `Info`.
pub fn init_logger() {
    init_logger_with(LevelFilter::Info);
}

/// Install the backend with `level` as the default; `RUST_LOG` still wins.
/// Only the first call in a process has an effect.
pub fn init_logger_with(level: LevelFilter) {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();
        builder
            .filter_level(level)
            .format_timestamp_millis()
            .parse_default_env();

        // Another logger may already be installed by the host application.
        let _ = builder.try_init();
    });
}

#[cfg(test)]
mod tests {
    use log::{debug, warn};

    use super::*;

    #[test]
    fn test_repeated_init() {
        init_logger_with(LevelFilter::Debug);
        init_logger();
        assert!(INIT.is_completed());
        debug!("rehash message in test");
        warn!("allocation message in test");
    }
}
