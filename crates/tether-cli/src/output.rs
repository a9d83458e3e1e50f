//! Output formatting and writing utilities
//!
//! Results are written as JSON, YAML or human-readable text. Human output
//! uses colors and a spinner when stdout is a terminal.

use crate::cli::OutputFormat;
use crate::error::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tracing::trace;

/// Summary of one completed fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchReport {
    pub endpoint: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub attempts: u32,
    pub duplicate: bool,
    pub elapsed_ms: u64,
    /// Parsed JSON when the body is JSON, a string otherwise, null once saved to a file
    pub body: serde_json::Value,
}

impl FetchReport {
    /// Body as it should be printed or saved
    pub fn body_text(&self, pretty: bool) -> Result<String> {
        let text = match &self.body {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(text) => text.clone(),
            value if pretty => serde_json::to_string_pretty(value)?,
            value => serde_json::to_string(value)?,
        };
        Ok(text)
    }
}

/// Trait for formatting output with specialized support for fetch results
pub trait OutputFormatter {
    /// Format a serializable value
    fn format<T: Serialize>(&self, value: &T) -> Result<String>;

    /// Format a fetch report
    fn format_fetch_report(&self, report: &FetchReport, pretty: bool) -> Result<String>;
}

impl OutputFormatter for OutputFormat {
    fn format<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => Ok(serde_json::to_string(value)?),
            OutputFormat::JsonPretty | OutputFormat::Human => Ok(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }

    fn format_fetch_report(&self, report: &FetchReport, pretty: bool) -> Result<String> {
        match self {
            OutputFormat::Human => format_fetch_report_human(report, pretty),
            _ => self.format(report),
        }
    }
}

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    show_progress: bool,
    quiet: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool) -> Self {
        Self {
            format,
            use_color,
            show_progress: !quiet && format == OutputFormat::Human && io::stdout().is_terminal(),
            quiet,
            writer: Box::new(io::stdout()),
        }
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(format: OutputFormat, use_color: bool, quiet: bool, writer: Box<dyn Write>) -> Self {
        Self {
            format,
            use_color,
            show_progress: false,
            quiet,
            writer,
        }
    }

    /// Write raw output
    pub fn write(&mut self, content: &str) -> Result<()> {
        write!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an info message
    pub fn info(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("{} {}", "ℹ".blue(), message))
        } else {
            self.writeln(&format!("INFO: {}", message))
        }
    }

    /// Write a success message
    pub fn success(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.green().to_string())
        } else {
            self.writeln(message)
        }
    }

    /// Write a warning message
    pub fn warning(&mut self, message: &str) -> Result<()> {
        if self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.yellow().to_string())
        } else {
            self.writeln(&format!("WARNING: {}", message))
        }
    }

    /// Write an error message
    pub fn error(&mut self, message: &str) -> Result<()> {
        if self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.red().to_string())
        } else {
            self.writeln(&format!("ERROR: {}", message))
        }
    }

    /// Write a section header
    pub fn section(&mut self, title: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        self.writeln("")?;
        if self.use_color {
            self.writeln(&format!("═══ {} ═══", title).bright_blue().to_string())
        } else {
            self.writeln(&format!("=== {} ===", title))
        }
    }

    /// Write a fetch report
    pub fn fetch_report(&mut self, report: &FetchReport, pretty: bool) -> Result<()> {
        let formatted = self.format.format_fetch_report(report, pretty)?;
        trace!(bytes = formatted.len(), "Writing fetch report");
        if formatted.ends_with('\n') {
            self.write(&formatted)
        } else {
            self.writeln(&formatted)
        }
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(default_spinner_style());
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

/// Helper function to create a spinner style
pub fn default_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Format a fetch report for human reading
fn format_fetch_report_human(report: &FetchReport, pretty: bool) -> Result<String> {
    let mut output = String::new();

    let status = format!("HTTP {}", report.status);
    let status = if report.status == 200 {
        status.green().bold().to_string()
    } else {
        status.yellow().bold().to_string()
    };

    output.push_str(&format!("{} {} {}\n", status, report.method, report.url));

    let attempts = if report.attempts == 1 {
        "1 attempt".to_string()
    } else {
        format!("{} attempts", report.attempts)
    };
    output.push_str(&format!("  {} in {} ms", attempts, report.elapsed_ms).dimmed().to_string());
    if report.duplicate {
        output.push_str(&format!(" {}", "(duplicate within window)".yellow()));
    }
    output.push('\n');

    let body = report.body_text(pretty)?;
    if !body.is_empty() {
        output.push('\n');
        output.push_str(&body);
    }

    Ok(output)
}
