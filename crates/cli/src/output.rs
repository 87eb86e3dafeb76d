//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as a percentage
pub fn format_probability(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Format an RFC3339 timestamp for display
pub fn format_timestamp(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| ts.to_string())
}

/// Color the verdict for an account
pub fn color_verdict(is_fake: bool) -> String {
    if is_fake {
        "FAKE".red().bold().to_string()
    } else {
        "REAL".green().bold().to_string()
    }
}

/// Color a service or serving state
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "loading" | "retraining" | "degraded" => status.yellow().to_string(),
        "unloaded" | "unhealthy" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a model score (accuracy, f1, ...) by quality band
pub fn color_score(score: f64) -> String {
    let formatted = format_probability(score);
    if score >= 0.9 {
        formatted.green().to_string()
    } else if score >= 0.75 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
