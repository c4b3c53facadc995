use colored::Colorize;
use serde::Serialize;

/// Terminal output with optional colour and JSON mode
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    json: bool,
}

impl OutputFormatter {
    pub fn new(json: bool, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { json }
    }

    pub const fn is_json(&self) -> bool {
        self.json
    }

    pub fn success(&self, message: &str) {
        if !self.json {
            println!("{} {}", "✓".green().bold(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.json {
            println!("{message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.json {
            eprintln!("{} {}", "⚠".yellow().bold(), message);
        }
    }

    /// Errors always go to stderr, JSON mode included
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if !self.json {
            println!("  {:<28} {}", format!("{key}:").bold(), value);
        }
    }

    pub fn json<T: Serialize>(&self, value: &T) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
