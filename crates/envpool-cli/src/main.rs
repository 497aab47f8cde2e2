//! envpool CLI
//!
//! Command-line interface for listing, benchmarking and watching the bundled
//! environments in a pool.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use envpool::{ActionRecord, PoolConfig, PoolStats};
use envpool_envs::registry::{self, DynPool};

#[derive(Parser)]
#[command(name = "envpool")]
#[command(version, about = "envpool - asynchronous environment pool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available environments
    List,

    /// Benchmark: drive a pool with random actions and report throughput
    Bench {
        /// Environment name
        #[arg(default_value = "cartpole")]
        env: String,

        /// Number of environments
        #[arg(long, default_value = "8")]
        num_envs: usize,

        /// Worker threads (0 = one per core)
        #[arg(long, default_value = "0")]
        num_threads: usize,

        /// Results per recv (0 = num_envs)
        #[arg(long, default_value = "0")]
        batch_size: usize,

        /// Total results to collect
        #[arg(long, default_value = "100000")]
        steps: u64,

        /// Base seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Demo: print every result of a small pool
    Demo {
        /// Environment name
        #[arg(default_value = "catch")]
        env: String,

        /// Number of results to print
        #[arg(long, default_value = "20")]
        steps: usize,

        /// Number of environments
        #[arg(long, default_value = "2")]
        num_envs: usize,

        /// Base seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Outcome of one `bench` run
#[derive(Debug, Serialize)]
struct BenchReport {
    version: &'static str,
    env: String,
    config: PoolConfig,
    num_threads: usize,
    batch_size: usize,
    steps: u64,
    seconds: f64,
    steps_per_sec: f64,
    episodes: u64,
    faults: u64,
    stats: PoolStats,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            list_envs();
        }
        Commands::Bench {
            env,
            num_envs,
            num_threads,
            batch_size,
            steps,
            seed,
            json,
        } => {
            let config = PoolConfig::new(num_envs)
                .with_threads(num_threads)
                .with_batch_size(batch_size)
                .with_seed(seed);
            let report = bench(&env, config, steps)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                tracing::info!(
                    env = %report.env,
                    steps = report.steps,
                    seconds = report.seconds,
                    steps_per_sec = report.steps_per_sec,
                    episodes = report.episodes,
                    faults = report.faults,
                    "Benchmark complete"
                );
            }
        }
        Commands::Demo {
            env,
            steps,
            num_envs,
            seed,
        } => {
            demo(&env, steps, num_envs, seed)?;
        }
    }

    Ok(())
}

fn list_envs() {
    println!("Available environments:");
    println!();
    for (name, description) in registry::list() {
        println!("  {name:<10} {description}");
    }
}

/// Draw one random valid action for each id
fn random_actions(pool: &DynPool, ids: &[usize], rng: &mut ChaCha8Rng) -> Vec<ActionRecord> {
    let space = &pool.spec().action_space;
    ids.iter()
        .map(|&id| ActionRecord::new(id, space.sample(rng)))
        .collect()
}

fn bench(env_name: &str, config: PoolConfig, steps: u64) -> Result<BenchReport> {
    let mut pool = registry::make_pool(env_name, config.clone())?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    tracing::info!(
        version = envpool::VERSION,
        env = env_name,
        num_envs = pool.num_envs(),
        num_threads = pool.num_threads(),
        batch_size = pool.batch_size(),
        "Starting benchmark"
    );

    let start = Instant::now();
    let mut collected = 0u64;
    let mut episodes = 0u64;
    let mut faults = 0u64;
    pool.async_reset()?;

    while collected < steps {
        let ids = {
            let batch = pool.recv()?;
            for view in &batch {
                episodes += u64::from(view.done());
                faults += u64::from(view.error().is_some());
            }
            batch.env_ids()
        };
        collected += ids.len() as u64;
        let actions = random_actions(&pool, &ids, &mut rng);
        pool.send(actions)?;
    }

    let seconds = start.elapsed().as_secs_f64();
    Ok(BenchReport {
        version: envpool::VERSION,
        env: env_name.to_string(),
        num_threads: pool.num_threads(),
        batch_size: pool.batch_size(),
        config,
        steps: collected,
        seconds,
        steps_per_sec: collected as f64 / seconds.max(f64::EPSILON),
        episodes,
        faults,
        stats: pool.stats(),
    })
}

fn demo(env_name: &str, steps: usize, num_envs: usize, seed: u64) -> Result<()> {
    let config = PoolConfig::new(num_envs)
        .with_threads(1)
        .with_batch_size(1)
        .with_seed(seed);
    let mut pool = registry::make_pool(env_name, config)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    tracing::info!(env = env_name, num_envs, "Starting demo");

    pool.async_reset()?;
    for step in 0..steps {
        let ids = {
            let batch = pool.recv()?;
            for view in &batch {
                println!(
                    "Step {}: env={} reward={:.3} done={} elapsed={}",
                    step,
                    view.env_id(),
                    view.reward(),
                    view.done(),
                    view.elapsed_step()
                );
                if let Some(err) = view.error() {
                    println!("         error: {err}");
                }
            }
            batch.env_ids()
        };
        let actions = random_actions(&pool, &ids, &mut rng);
        pool.send(actions)?;
    }

    Ok(())
}
