//! Parameter-sweep orchestration: building the tuple list, skipping
//! already-done tuples, and optionally fanning the run out across real OS
//! processes rather than threads, since each tuple's `World` is independent
//! and cheap to re-spawn from scratch.

use std::path::Path;
use std::process::{Child, Command};
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};

use crate::cli::Args;
use crate::config::{Config, SweepAxis, build_sweep};
use crate::sim::World;
use crate::stats::RunResult;

const MAX_CONCURRENT_WORKERS: usize = 4;

pub fn run(base: &Config, args: &Args) -> anyhow::Result<()> {
    let sweep = build_sweep(base, &SweepAxis::default());
    info!("running sweep of {} configurations", sweep.len());

    if args.multiprocess {
        run_multiprocess(&sweep, args)
    } else {
        run_serial(&sweep, args)
    }
}

pub fn run_tuple(config: &Config, results_dir: &Path) -> anyhow::Result<()> {
    run_one(config, results_dir, false)
}

fn run_serial(sweep: &[Config], args: &Args) -> anyhow::Result<()> {
    for config in sweep {
        run_one(config, &args.results_dir, args.pass_done)?;
    }
    Ok(())
}

fn run_one(config: &Config, results_dir: &Path, pass_done: bool) -> anyhow::Result<()> {
    let summary = config.summary();
    if pass_done && result_exists(results_dir, &summary) {
        info!("skipping {summary}, results already present");
        return Ok(());
    }
    info!("running {summary}");
    let stats = World::new(config.clone()).run();
    let result = RunResult::new(config, stats);
    result.write_to(results_dir, &summary).context("writing result")?;
    Ok(())
}

fn result_exists(results_dir: &Path, summary: &str) -> bool {
    results_dir.join(format!("{summary}.csv")).exists()
}

/// Re-invokes the current executable once per tuple with a hidden
/// `--run-tuple <json>` flag, keeping at most `MAX_CONCURRENT_WORKERS`
/// children alive at once.
fn run_multiprocess(sweep: &[Config], args: &Args) -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("resolving current executable")?;

    let mut pending: Vec<Config> = sweep
        .iter()
        .filter(|c| !(args.pass_done && result_exists(&args.results_dir, &c.summary())))
        .cloned()
        .collect();
    pending.reverse(); // pop() takes from the end; keep original order

    let mut workers: Vec<(String, Child)> = Vec::new();

    loop {
        while workers.len() < MAX_CONCURRENT_WORKERS {
            let Some(config) = pending.pop() else { break };
            workers.push(spawn_worker(&exe, &config, &args.results_dir)?);
        }
        if workers.is_empty() {
            break;
        }
        reap_finished(&mut workers)?;
        if workers.len() >= MAX_CONCURRENT_WORKERS || pending.is_empty() {
            std::thread::sleep(Duration::from_millis(50));
        }
    }
    Ok(())
}

fn spawn_worker(exe: &Path, config: &Config, results_dir: &Path) -> anyhow::Result<(String, Child)> {
    let json = serde_json::to_string(config).context("serializing tuple")?;
    let child = Command::new(exe)
        .arg("--run-tuple")
        .arg(json)
        .arg("--results-dir")
        .arg(results_dir)
        .spawn()
        .context("spawning worker process")?;
    Ok((config.summary(), child))
}

fn reap_finished(workers: &mut Vec<(String, Child)>) -> anyhow::Result<()> {
    let mut i = 0;
    while i < workers.len() {
        match workers[i].1.try_wait()? {
            Some(status) if status.success() => {
                workers.remove(i);
            }
            Some(status) => {
                warn!("worker for {} exited with {status}", workers[i].0);
                workers.remove(i);
            }
            None => i += 1,
        }
    }
    Ok(())
}
