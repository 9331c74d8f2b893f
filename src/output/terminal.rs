//! Terminal renderer: styled sections for one analysis.

use colored::Colorize;

use crate::cache::CacheStats;
use crate::models::Priority;
use crate::output::OutputRenderer;
use crate::pipeline::{AnalysisMode, AnalysisResponse, PipelineError};

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl TerminalRenderer {
    fn section(output: &mut String, heading: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        output.push_str(&format!(" {}\n", heading.bold()));
        for item in items {
            output.push_str(&format!("   {} {}\n", "•".cyan(), item));
        }
        output.push('\n');
    }
}

fn priority_label(priority: Priority) -> String {
    let label = priority.to_string().to_uppercase();
    match priority {
        Priority::Low => label.green().bold().to_string(),
        Priority::Medium => label.yellow().bold().to_string(),
        Priority::High => label.red().bold().to_string(),
        Priority::Critical => label.white().on_red().bold().to_string(),
    }
}

impl OutputRenderer for TerminalRenderer {
    fn render(&self, response: &AnalysisResponse) -> String {
        let context = &response.context;
        let meta = &response.metadata;
        let mut output = String::new();

        output.push_str(&format!(" {}\n", "Summary".bold()));
        output.push_str(&format!("   {}\n\n", context.summary));
        output.push_str(&format!(" {}\n", "Purpose".bold()));
        output.push_str(&format!("   {}\n\n", context.purpose));

        output.push_str(&format!(
            " {} {}   {} {}\n\n",
            "Priority:".bold(),
            priority_label(context.review_priority),
            "Review time:".bold(),
            context.estimated_review_time
        ));

        Self::section(&mut output, "Key changes", &context.key_changes);
        Self::section(&mut output, "Testing focus", &context.testing_focus);
        Self::section(&mut output, "Potential risks", &context.potential_risks);
        Self::section(&mut output, "Affected areas", &context.affected_areas);

        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        let files = if meta.files_analyzed == meta.total_files {
            format!("{} files", meta.files_analyzed)
        } else {
            format!("{} of {} files", meta.files_analyzed, meta.total_files)
        };
        let mut footer = format!(
            " {} · {} · {} commits · {}ms · {}",
            meta.model, files, meta.commits_analyzed, meta.processing_time_ms, meta.fingerprint
        );
        if meta.mode == AnalysisMode::Quick {
            footer.push_str(" · quick");
        }
        output.push_str(&footer.dimmed().to_string());
        if meta.cached {
            output.push_str(&format!(" {}", "cached".cyan()));
        }
        if meta.degraded {
            output.push_str(&format!(" {}", "⚠ fallback analysis".yellow()));
        }
        output.push('\n');

        output
    }

    fn render_error(&self, title: &str, error: &PipelineError) -> String {
        format!(
            " {} {}\n   {}\n",
            "✖".red().bold(),
            title.bold(),
            error.to_string().red()
        )
    }

    fn render_cache_stats(&self, stats: &CacheStats) -> String {
        let mut output = format!(
            " {} {}   {} {}s\n",
            "Cache entries:".bold(),
            stats.total_entries,
            "TTL:".bold(),
            stats.ttl_seconds
        );
        for entry in &stats.entries {
            output.push_str(&format!(
                "   {}  {:>6}s  {}\n",
                entry.key.cyan(),
                entry.age_seconds,
                entry.label
            ));
        }
        output
    }
}
