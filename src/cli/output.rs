//! Output formatting for CLI commands

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::module::{Reporter, TaskReport};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
    verbose: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Prints structured data
    pub fn data<T: Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Text => {
                if let Ok(json) = serde_json::to_string_pretty(data) {
                    println!("{}", json);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(data) {
                    println!("{}", json);
                }
            }
        }
    }

    /// Prints what a task returned. Text mode only shows string results;
    /// JSON mode emits anything but null.
    pub fn task_result(&self, result: &Value) {
        match (self.format, result) {
            (_, Value::Null) => {}
            (OutputFormat::Text, Value::String(text)) => println!("{}", text),
            (OutputFormat::Text, _) => {}
            (OutputFormat::Json, value) => self.data(value),
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Returns true if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Prints a verbose debug message (only when --verbose is set)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", message);
        }
    }

    /// Prints a verbose debug message with context (only when --verbose is set)
    pub fn verbose_ctx(&self, context: &str, message: &str) {
        if self.verbose {
            eprintln!("[verbose:{}] {}", context, message);
        }
    }
}

impl Reporter for Output {
    fn report(&self, report: &TaskReport) {
        match self.format {
            OutputFormat::Text => println!("{}", report),
            OutputFormat::Json => self.data(report),
        }
    }
}
