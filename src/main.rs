//! Test Runner Worker - tag-driven test suite execution service
//!
//! Consumes job messages, runs every registered test whose tags match the
//! job, retries flaky tests, writes HTML/CSV reports and reports the
//! aggregated outcome to the management API. Jobs whose outcome cannot be
//! delivered are dead-lettered.
//!
//! ## Usage
//!
//! ```bash
//! # Consume jobs from a spool directory until Ctrl-C
//! test-runner-worker worker --spool ./spool
//!
//! # Process job messages piped in, one JSON document per line
//! echo '{"runId":"42","environment":"dev","tags":"smoke"}' | test-runner-worker worker --stdin
//!
//! # Publish a job for the worker
//! test-runner-worker enqueue --tags smoke --env staging
//!
//! # Run one job in-process
//! test-runner-worker run --tags smoke,api --env dev --format json-pretty
//!
//! # List registered tests and which ones a tag set selects
//! test-runner-worker list --tags regression --detailed
//!
//! # Write an example configuration
//! test-runner-worker config init
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod cli;
mod config;
mod executor;
mod http;
mod intake;
mod models;
mod output;
mod reporter;
mod results;
mod suite;
mod utils;

use cli::Args;
use config::{EnvConfig, WorkerConfig};
use executor::{JobRunner, ParallelDispatcher, RetryingExecutor, WorkerPool};
use http::HttpClient;
use intake::{JobSource, MemoryQueue, SpoolQueue, Worker};
use models::{parse_tags, Job};
use output::{OutputFormat, ResultFormatter};
use reporter::{HttpRunStatusClient, ReliableReporter};
use results::ReportSet;
use suite::{HttpCheck, Registry};
use utils::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(args.effective_log_level());

    let config_path = args.config.as_deref();
    let no_color = args.no_color;

    match args.command {
        cli::Command::Worker(worker_args) => {
            run_worker(worker_args, load_config(config_path)?).await?;
        }
        cli::Command::Run(run_args) => {
            run_job(run_args, load_config(config_path)?, no_color).await?;
        }
        cli::Command::Enqueue(enqueue_args) => {
            enqueue_job(enqueue_args).await?;
        }
        cli::Command::List(list_args) => {
            list_units(list_args, &load_config(config_path)?, no_color)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, config_path)?;
        }
    }

    Ok(())
}

/// File (explicit, TEST_RUNNER_CONFIG, or discovered) then env overrides
fn load_config(path: Option<&Path>) -> Result<WorkerConfig> {
    let env = EnvConfig::load();
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let (mut config, source) = WorkerConfig::resolve(path.as_deref())?;
    match source {
        Some(source) => info!("Loaded configuration from {}", source.display()),
        None => debug!("No configuration file found, using defaults"),
    }

    if env.has_any() {
        debug!("Applying TEST_RUNNER_* environment overrides");
        env.apply_to(&mut config);
    }
    config.validate().context("Invalid configuration after environment overrides")?;
    Ok(config)
}

fn build_registry(config: &WorkerConfig) -> Result<Registry> {
    let client = HttpClient::with_timeout(config.api.timeout_secs)?;
    let registry = config
        .checks
        .iter()
        .cloned()
        .fold(Registry::builder(), |builder, spec| {
            builder.register(HttpCheck::new(spec, client.clone()))
        })
        .build();

    if registry.is_empty() {
        warn!("No tests registered; every job will fail with no matching tests");
    } else {
        debug!("Registered {} test(s)", registry.len());
    }
    Ok(registry)
}

fn build_pool(config: &WorkerConfig) -> Arc<WorkerPool> {
    Arc::new(WorkerPool::new(
        config.worker.pool_size,
        config.worker.queue_capacity,
    ))
}

fn build_runner(config: &WorkerConfig, pool: Arc<WorkerPool>) -> Result<JobRunner> {
    let registry = build_registry(config)?;
    let reports = ReportSet::from_formats(&config.reports.formats(), &config.reports.directory);
    let executor =
        RetryingExecutor::new(config.worker.max_attempts).with_reports(Arc::new(reports));

    Ok(JobRunner::new(
        Arc::new(registry),
        ParallelDispatcher::new(pool, Arc::new(executor)),
    )
    .with_environments(config.environment_urls()))
}

/// Wait for the pool's workers once nothing else holds it
async fn shutdown_pool(pool: Arc<WorkerPool>) {
    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown().await,
        Err(_) => warn!("Worker pool still in use, not waiting for it"),
    }
}

fn build_reporter(config: &WorkerConfig) -> Result<ReliableReporter> {
    let http = HttpClient::with_timeout(config.api.timeout_secs)?;
    let client = HttpRunStatusClient::new(http, config.api.base_url.clone());
    Ok(
        ReliableReporter::new(Arc::new(client), config.api.report_attempts)
            .with_retry_delay(config.api.retry_delay()),
    )
}

fn generate_run_id() -> String {
    format!(
        "local-{}-{:04x}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u16>()
    )
}

/// Queue every non-blank stdin line as one job message
fn read_stdin_jobs() -> Result<MemoryQueue> {
    let queue = MemoryQueue::new();
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        if !line.trim().is_empty() {
            queue.push_raw(line.into_bytes());
        }
    }
    Ok(queue)
}

async fn run_worker(args: cli::WorkerArgs, config: WorkerConfig) -> Result<()> {
    let mut stdin_queue = None;
    let (source, origin): (Arc<dyn JobSource>, String) = if args.stdin {
        let queue = Arc::new(read_stdin_jobs()?);
        let origin = format!("stdin ({} message(s))", queue.pending());
        stdin_queue = Some(queue.clone());
        let source: Arc<dyn JobSource> = queue;
        (source, origin)
    } else {
        let spool = SpoolQueue::open(&args.spool).await?;
        let origin = format!(
            "{} ({} pending)",
            args.spool.display(),
            spool.pending().await?
        );
        let source: Arc<dyn JobSource> = Arc::new(spool);
        (source, origin)
    };

    let pool = build_pool(&config);
    let worker = Worker::new(
        source,
        build_runner(&config, pool.clone())?,
        build_reporter(&config)?,
    )
    .consumers(config.worker.consumers)
    .poll_interval(config.worker.poll_interval());

    info!(
        "Worker consuming {} (pool: {}, attempts: {}, API: {})",
        origin, config.worker.pool_size, config.worker.max_attempts, config.api.base_url
    );

    let stats = if args.once || args.stdin {
        worker.drain().await
    } else {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown requested, finishing in-flight jobs");
                    let _ = tx.send(true);
                }
                Err(e) => {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        });
        worker.run(rx).await
    };
    drop(worker);
    shutdown_pool(pool).await;

    println!(
        "Processed {} job(s): {} acknowledged, {} dead-lettered",
        stats.processed, stats.acked, stats.rejected
    );
    if let Some(queue) = stdin_queue {
        for delivery in queue.dead_letters() {
            eprintln!(
                "✗ Dead-lettered {}: {}",
                delivery.id,
                String::from_utf8_lossy(&delivery.payload)
            );
        }
    }
    Ok(())
}

async fn run_job(args: cli::RunArgs, config: WorkerConfig, no_color: bool) -> Result<()> {
    let format = OutputFormat::from_str(&args.format)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {}", args.format))?;
    let pool = build_pool(&config);
    let runner = build_runner(&config, pool.clone())?;

    let job = Job::new(args.run_id.unwrap_or_else(generate_run_id), args.env, &args.tags);
    let (result, units) = runner.run_with_results(&job).await;
    drop(runner);
    shutdown_pool(pool).await;

    println!(
        "{}",
        formatter(format, no_color).format_job(&job.run_id, &result, &units)
    );

    if args.report {
        let outcome = build_reporter(&config)?.report(&job.run_id, &result).await;
        println!("Result {outcome}");
        if !outcome.is_delivered() {
            anyhow::bail!("Could not deliver result of run {}", job.run_id);
        }
    }

    if !result.is_success() {
        anyhow::bail!("Run {} failed", job.run_id);
    }
    Ok(())
}

async fn enqueue_job(args: cli::EnqueueArgs) -> Result<()> {
    let spool = SpoolQueue::open(&args.spool).await?;
    let job = Job::new(args.run_id.unwrap_or_else(generate_run_id), args.env, &args.tags);
    let path = spool.enqueue(&job).await?;

    println!("✓ Enqueued {job}");
    println!("  {}", path.display());
    Ok(())
}

fn list_units(args: cli::ListArgs, config: &WorkerConfig, no_color: bool) -> Result<()> {
    let registry = build_registry(config)?;
    let requested = args.tags.as_deref().map(parse_tags);

    print!(
        "{}",
        formatter(OutputFormat::Table, no_color).format_units(
            registry.units(),
            requested.as_ref(),
            args.detailed
        )
    );
    Ok(())
}

fn formatter(format: OutputFormat, no_color: bool) -> ResultFormatter {
    let formatter = ResultFormatter::new(format);
    if no_color {
        formatter.no_color()
    } else {
        formatter
    }
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }

            WorkerConfig::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { format } => {
            let config = load_config(config_path)?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Validate { path } => {
            let path = path
                .or_else(|| config_path.map(Path::to_path_buf))
                .or_else(WorkerConfig::find)
                .ok_or_else(|| anyhow::anyhow!("No configuration file found"))?;

            match WorkerConfig::load(&path) {
                Ok(config) => {
                    println!("✓ Configuration file is valid: {}", path.display());
                    println!(
                        "  {} check(s), {} environment(s)",
                        config.checks.len(),
                        config.environments.len()
                    );
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            EnvConfig::load().print_summary();
            println!();
            config::print_env_help();
        }
    }

    Ok(())
}
