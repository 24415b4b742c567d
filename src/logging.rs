//! Logger initialisation.
//!
//! Everything logs through the `log` facade; the binary installs `env_logger`.

use log::LevelFilter;

/// Map `-v` occurrences to a default level filter
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initializes the logger with the `env_logger` crate.
///
/// `RUST_LOG` takes precedence over `verbosity` when set. Calling this more
/// than once is harmless.
pub fn init_logger(verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for_verbosity(verbosity))
        .format_timestamp_millis()
        .parse_default_env();
    let _ = builder.try_init();
}
