//! Clap argument types and input validation.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use prcontext::cache::CacheStats;
use prcontext::input::InputSource;
use prcontext::models::ProviderName;
use prcontext::output::OutputRenderer;
use prcontext::output::json::JsonRenderer;
use prcontext::output::terminal::TerminalRenderer;
use prcontext::pipeline::{AnalysisResponse, PipelineError};

/// AI-generated review context for pull requests.
#[derive(Parser, Debug)]
#[command(
    name = "prcontext",
    version = prcontext::constants::VERSION,
    about = super::ABOUT,
)]
pub struct Cli {
    /// Log progress at info level.
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    /// Write logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Analyze one or more change descriptions.
    Analyze(Box<AnalyzeArgs>),

    /// Print the cache key of each change description.
    Fingerprint(FingerprintArgs),

    /// Show provider and cache configuration.
    Check,

    /// Print version information.
    Version,
}

/// Arguments for the `analyze` subcommand.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// JSON files holding a change description or a list of them; `-` reads stdin.
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Only send the leading files and commits; skips the cache.
    #[arg(long, default_value_t = false)]
    pub quick: bool,

    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Disable result caching.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Max concurrent analyses (default from config, 4).
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Print cache statistics after the analyses.
    #[arg(long, default_value_t = false)]
    pub cache_stats: bool,

    /// Model to use, overriding config.
    #[arg(long)]
    pub model: Option<String>,

    /// Provider to use, overriding config.
    #[arg(long)]
    pub provider: Option<ProviderName>,
}

/// Arguments for the `fingerprint` subcommand.
#[derive(Parser, Debug)]
pub struct FingerprintArgs {
    /// JSON files holding change descriptions; `-` reads stdin.
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    fn renderer(&self) -> &'static dyn OutputRenderer {
        match self {
            OutputFormat::Terminal => &TerminalRenderer,
            OutputFormat::Json => &JsonRenderer,
        }
    }

    pub fn render(&self, response: &AnalysisResponse) -> String {
        self.renderer().render(response)
    }

    pub fn render_error(&self, title: &str, error: &PipelineError) -> String {
        self.renderer().render_error(title, error)
    }

    pub fn render_cache_stats(&self, stats: &CacheStats) -> String {
        self.renderer().render_cache_stats(stats)
    }
}

/// Map positional file arguments to input sources.
///
/// No files means stdin; `-` may appear at most once.
pub fn input_sources(files: &[PathBuf]) -> Result<Vec<InputSource>, String> {
    if files.is_empty() {
        return Ok(vec![InputSource::Stdin]);
    }
    let sources: Vec<InputSource> = files
        .iter()
        .map(|f| {
            if f.as_os_str() == "-" {
                InputSource::Stdin
            } else {
                InputSource::File(f.clone())
            }
        })
        .collect();
    if sources.iter().filter(|s| **s == InputSource::Stdin).count() > 1 {
        return Err("stdin (`-`) can only be given once".to_string());
    }
    Ok(sources)
}
