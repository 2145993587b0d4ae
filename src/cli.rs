//! Command-line surface: a `clap::Parser` derive exposing a single
//! default run, a full parameter sweep, and the hidden worker-tuple
//! entry point used for multiprocess fan-out.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "csma-sim", about = "Discrete-event CSMA/CA medium-access simulator")]
pub struct Args {
    /// Run the full parameter sweep instead of a single default simulation.
    #[arg(long)]
    pub simulation: bool,

    /// Skip sweep tuples whose result files already exist.
    #[arg(long)]
    pub pass_done: bool,

    /// Fan sweep tuples out across multiple OS processes (capped at 4).
    #[arg(long)]
    pub multiprocess: bool,

    /// Optional TOML configuration file; unset fields keep their default.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override a single configuration field, e.g. `--set frame-rate=50`.
    /// Repeatable; applied on top of the loaded (or default) config.
    #[arg(long = "set", value_name = "key=value")]
    pub overrides: Vec<String>,

    /// Directory result CSV/JSON files are written to.
    #[arg(long, default_value = "results/csv")]
    pub results_dir: PathBuf,

    /// Raise the default log level from info to debug.
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: re-invoked by a `--multiprocess` parent to run one tuple,
    /// passed as JSON. Not meant to be typed by hand.
    #[arg(long, hide = true)]
    pub run_tuple: Option<String>,
}
