//! Logging setup.
//!
//! `RUST_LOG` controls verbosity as usual; `--verbose` just raises the
//! default floor from `info` to `debug` when the variable isn't already set.

pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
