//! Entry point: parse CLI args, load configuration, and either run a
//! single default simulation, run the full parameter sweep, or (when
//! re-invoked by a `--multiprocess` parent) run exactly one tuple.

use anyhow::Context;
use clap::Parser;
use log::info;

use csma_sim::cli::Args;
use csma_sim::config::Config;
use csma_sim::sim::World;
use csma_sim::stats::RunResult;
use csma_sim::{logging, sweep, visualization};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Some(json) = &args.run_tuple {
        let config: Config = serde_json::from_str(json).context("parsing --run-tuple payload")?;
        config.validate()?;
        return sweep::run_tuple(&config, &args.results_dir);
    }

    let mut base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    base.apply_overrides(&args.overrides)?;
    if args.verbose {
        base.log = true;
    }

    if args.simulation {
        return sweep::run(&base, &args);
    }

    info!("running a single default simulation: {}", base.summary());
    let mut world = World::new(base.clone());
    if base.log {
        world.set_after_tick(|world| println!("{}", visualization::render(world)));
    }
    let stats = world.run();
    let result = RunResult::new(&base, stats);
    result.write_to(&args.results_dir, &base.summary())?;
    Ok(())
}
