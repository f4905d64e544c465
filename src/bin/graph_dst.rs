//! Seeded convergence runs for the LWW set and graph.
//!
//! ```bash
//! RUST_LOG=lww_graph=debug cargo run --bin graph-dst -- --seeds 200 --mode chaos
//! cargo run --bin graph-dst -- --config graph.toml --ops 500
//! ```

use lww_graph::dst::{run_graph_batch, run_set_batch, summarize_batch, DstConfig, DstResult};
use lww_graph::GraphConfig;
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Args {
    seeds: usize,
    base_seed: u64,
    ops: usize,
    mode: String,
    config_path: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            seeds: 100,
            base_seed: 0,
            ops: 200,
            mode: "calm".to_string(),
            config_path: None,
        }
    }
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);

    while let Some(flag) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| format!("missing value for {}", flag));
        match flag.as_str() {
            "--seeds" => args.seeds = value()?.parse().map_err(|e| format!("--seeds: {}", e))?,
            "--base-seed" => {
                args.base_seed = value()?.parse().map_err(|e| format!("--base-seed: {}", e))?
            }
            "--ops" => args.ops = value()?.parse().map_err(|e| format!("--ops: {}", e))?,
            "--mode" => args.mode = value()?,
            "--config" => args.config_path = Some(value()?),
            other => return Err(format!("unknown argument {}", other)),
        }
    }

    Ok(args)
}

fn mode_fn(mode: &str) -> Result<fn(u64) -> DstConfig, String> {
    match mode {
        "calm" => Ok(DstConfig::calm),
        "moderate" => Ok(DstConfig::moderate),
        "chaos" => Ok(DstConfig::chaos),
        other => Err(format!("unknown mode {} (calm|moderate|chaos)", other)),
    }
}

fn report(label: &str, results: &[DstResult]) -> bool {
    println!("{}:\n{}", label, summarize_batch(results));
    let failed: Vec<&DstResult> = results.iter().filter(|r| !r.is_success()).collect();
    for result in &failed {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("failed to encode result for seed {}: {}", result.seed, e),
        }
    }
    failed.is_empty()
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let config_fn = mode_fn(&args.mode)?;
    let graph_config = match &args.config_path {
        Some(path) => GraphConfig::from_file(path)?,
        None => GraphConfig::from_env()?,
    };

    info!(
        seeds = args.seeds,
        base_seed = args.base_seed,
        ops = args.ops,
        mode = %args.mode,
        ?graph_config,
        "starting DST batches"
    );

    let set_results = run_set_batch(args.base_seed, args.seeds, args.ops, config_fn);
    let graph_results = run_graph_batch(args.base_seed, args.seeds, args.ops, graph_config, config_fn);

    let set_ok = report("LWW set", &set_results);
    let graph_ok = report("LWW graph", &graph_results);

    if set_ok && graph_ok {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
