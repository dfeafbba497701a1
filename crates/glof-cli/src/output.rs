use console::style;
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Writes command results.
///
/// In JSON mode stdout carries exactly one document per command (the
/// `result`); informational lines are suppressed and warnings go to stderr.
pub struct OutputWriter {
    json: bool,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn success(&self, message: impl Display) {
        self.human(|| println!("{} {}", style("✓").green().bold(), message));
    }

    pub fn info(&self, message: impl Display) {
        self.human(|| println!("{} {}", style("ℹ").blue().bold(), message));
    }

    pub fn warning(&self, message: impl Display) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "status": "warning", "message": message.to_string() }));
        } else {
            eprintln!("{} {}", style("⚠").yellow().bold(), message);
        }
    }

    pub fn kv(&self, key: impl Display, value: impl Display) {
        self.human(|| println!("  {:<24} {}", style(format!("{}:", key)).bold(), value));
    }

    /// A stage output file, dimmed when it was not written
    pub fn artifact(&self, label: impl Display, path: &Path) {
        self.human(|| {
            let shown = if path.is_file() {
                style(path.display().to_string()).cyan()
            } else {
                style(format!("{} (not written)", path.display())).dim()
            };
            println!("  {:<24} {}", style(format!("{}:", label)).bold(), shown);
        });
    }

    pub fn section(&self, title: impl Display) {
        self.human(|| println!("\n{}", style(title).bold().underlined()));
    }

    pub fn table<T: Tabled>(&self, rows: Vec<T>) {
        self.human(|| {
            if rows.is_empty() {
                println!("{}", style("(none)").dim());
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        });
    }

    /// Final result of a command; only JSON mode prints it
    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let document = serde_json::json!({ "status": "success", "data": data });
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Ok(())
    }

    fn human(&self, print: impl FnOnce()) {
        if !self.json {
            print();
        }
    }
}
