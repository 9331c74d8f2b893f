//! prcontext — AI-generated review context for pull requests.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use prcontext::config;
use prcontext::constants;
use prcontext::env;
use prcontext::fingerprint;
use prcontext::input;
use prcontext::logging;
use prcontext::models::ChangeDescription;
use prcontext::pipeline;
use prcontext::providers;

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cli::args::{AnalyzeArgs, Cli, Command, FingerprintArgs, OutputFormat};
use config::Config;
use env::Env;
use input::InputSource;
use pipeline::{AnalysisPipeline, PipelineError};
use providers::rig::RigProvider;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let log_json = cli.log_json;

    match cli.command {
        Command::Analyze(args) => run_analyze(*args, verbose, log_json).await,
        Command::Fingerprint(args) => run_fingerprint(args).await,
        Command::Check => run_check(verbose, log_json),
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    Ok(())
}

/// Load layered config, then apply global CLI flags and start logging.
fn load_config(verbose: bool, log_json: bool) -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let mut config =
        Config::load(Some(&cwd), &Env::real()).context("failed to load configuration")?;
    if verbose {
        config.logging.level = "info".to_string();
    }
    if log_json {
        config.logging.json = true;
    }
    logging::init(&config.logging.level, config.logging.json);
    Ok(config)
}

/// Read every source, keeping per-source failures instead of aborting.
async fn load_inputs(
    sources: &[InputSource],
) -> (Vec<ChangeDescription>, Vec<(String, PipelineError)>) {
    let mut changes = Vec::new();
    let mut failures = Vec::new();
    for source in sources {
        match input::read_changes(source).await {
            Ok(loaded) => changes.extend(loaded),
            Err(e) => failures.push((
                source.to_string(),
                PipelineError::InvalidInput(e.to_string()),
            )),
        }
    }
    (changes, failures)
}

/// Print each failed analysis to stderr.
fn report_failures(format: OutputFormat, failures: &[(String, PipelineError)]) {
    for (title, error) in failures {
        eprintln!("{}", format.render_error(title, error));
    }
}

/// Analyze change descriptions and render the results.
async fn run_analyze(args: AnalyzeArgs, verbose: bool, log_json: bool) -> Result<()> {
    let sources = cli::args::input_sources(&args.files).map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut config = load_config(verbose, log_json)?;
    if let Some(name) = args.provider {
        config.override_provider(name, &Env::real());
    }
    if let Some(model) = args.model {
        config.provider.model = model;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    let max_concurrent = args
        .max_concurrent
        .unwrap_or(config.analysis.max_concurrent);

    let (changes, mut failures) = load_inputs(&sources).await;

    let format = args.format;
    let mut analyzed = 0usize;
    if !changes.is_empty() {
        let provider = match RigProvider::new(config.provider.clone()) {
            Ok(provider) => provider,
            Err(e) => {
                report_failures(format, &failures);
                return Err(e).context("failed to initialise LLM provider");
            }
        };
        let pipeline = AnalysisPipeline::from_config(&config, Arc::new(provider));

        let titles: Vec<String> = changes.iter().map(|c| c.title.clone()).collect();
        let results = if args.quick {
            pipeline.analyze_quick_batch(changes, max_concurrent).await
        } else {
            pipeline.analyze_batch(changes, max_concurrent).await
        };

        for (title, result) in titles.into_iter().zip(results) {
            match result {
                Ok(response) => {
                    analyzed += 1;
                    println!("{}", format.render(&response));
                }
                Err(e) => failures.push((title, e)),
            }
        }

        if args.cache_stats {
            println!("{}", format.render_cache_stats(&pipeline.cache_stats()));
        }
    }

    report_failures(format, &failures);

    if !failures.is_empty() {
        bail!(
            "{} of {} analyses failed",
            failures.len(),
            analyzed + failures.len()
        );
    }
    if analyzed == 0 {
        bail!("no change descriptions found in input");
    }
    Ok(())
}

/// Print `key  title` for each change description.
async fn run_fingerprint(args: FingerprintArgs) -> Result<()> {
    let sources = cli::args::input_sources(&args.files).map_err(|e| anyhow::anyhow!("{e}"))?;
    for source in &sources {
        let changes = input::read_changes(source).await?;
        for change in &changes {
            println!("{}  {}", fingerprint::fingerprint(change), change.title);
        }
    }
    Ok(())
}

/// Report whether the provider is usable and how the cache is set up.
fn run_check(verbose: bool, log_json: bool) -> Result<()> {
    use colored::Colorize;

    let config = load_config(verbose, log_json)?;
    let provider = &config.provider;

    let status = match RigProvider::new(provider.clone()) {
        Ok(_) => "configured".green().bold().to_string(),
        Err(e) => format!("{} ({e})", "not configured".red().bold()),
    };
    println!("  {}  {}", "Provider:".cyan(), provider.name);
    println!("  {}    {}", "Status:".cyan(), status);
    println!("  {}     {}", "Model:".cyan(), provider.model);
    if let Some(ref url) = provider.base_url {
        println!("  {}  {}", "Base URL:".cyan(), url);
    }
    let cache = if config.cache.enabled {
        format!("enabled, TTL {}s", config.cache.ttl_secs)
    } else {
        "disabled".to_string()
    };
    println!("  {}     {}", "Cache:".cyan(), cache);
    println!(
        "  {}  {}",
        "Attempts:".cyan(),
        config.analysis.max_attempts
    );
    Ok(())
}
