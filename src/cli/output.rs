//! Output formatting module for confpush
//!
//! Human output is colored with `colored`; JSON output goes to stdout as a
//! single document so it can be piped into other tools. Diagnostics always
//! go to stderr.

use colored::Colorize;
use confpush::error::Error;
use confpush::report::{ResultStatus, StructuredResult};
use confpush::session::FamilyInfo;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Output formatter for different output modes
pub struct OutputFormatter {
    /// Use colored output
    use_color: bool,
    /// JSON output mode
    json_mode: bool,
    /// Verbosity level
    verbosity: u8,
    /// Start time for duration calculations
    start_time: Instant,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(use_color: bool, json_mode: bool, verbosity: u8) -> Self {
        Self {
            use_color,
            json_mode,
            verbosity,
            start_time: Instant::now(),
        }
    }

    /// Whether output is JSON
    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print a JSON document to stdout
    pub fn json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => self.error(&format!("cannot serialize output: {}", e)),
        }
    }

    /// JSON document describing a device whose run failed
    pub fn error_json(host: &str, err: &Error) -> Value {
        json!({
            "host": host,
            "changed": false,
            "applied": false,
            "failed": true,
            "status": "failed",
            "phase": err.phase(),
            "msg": err.to_string(),
            "exit_code": err.exit_code(),
        })
    }

    /// Print the result of one device
    pub fn result(&self, result: &StructuredResult) {
        let status = match result.status {
            ResultStatus::Ok => self.paint("ok", |s| s.green().to_string()),
            ResultStatus::Changed => self.paint("changed", |s| s.yellow().to_string()),
            ResultStatus::Failed => self.paint("failed", |s| s.red().bold().to_string()),
        };
        let host = self.paint(&result.host, |s| s.bright_white().bold().to_string());
        println!("{}: [{}] => {}", status, host, result.msg);

        if !result.diff.is_empty() {
            self.diff(&result.diff);
        }
        if let Some(ref path) = result.diff_file {
            self.detail("diff file", &path.display().to_string());
        }
        if let Some(ref path) = result.backup_file {
            self.detail("backup file", &path.display().to_string());
        }
        if self.verbosity >= 1 {
            self.detail("resolution", &result.resolution.to_string());
            if let Some(ref checksum) = result.candidate_checksum {
                self.detail("candidate sha256", checksum);
            }
        }
        for warning in &result.warnings {
            self.warning(&format!("{}: {}", result.host, warning));
        }
    }

    /// Print a failed device
    pub fn failure(&self, host: &str, err: &Error) {
        let status = self.paint("failed", |s| s.red().bold().to_string());
        let host_str = self.paint(host, |s| s.bright_white().bold().to_string());
        match err.phase() {
            Some(phase) => println!("{}: [{}] ({}) => {}", status, host_str, phase, err),
            None => println!("{}: [{}] => {}", status, host_str, err),
        }
    }

    /// Print a unified diff, colored by line kind
    pub fn diff(&self, diff: &str) {
        for line in diff.lines() {
            if !self.use_color {
                println!("{}", line);
            } else if line.starts_with("+++") || line.starts_with("---") {
                println!("{}", line.bold());
            } else if line.starts_with('+') {
                println!("{}", line.green());
            } else if line.starts_with('-') {
                println!("{}", line.red());
            } else if line.starts_with("@@") {
                println!("{}", line.cyan());
            } else {
                println!("{}", line);
            }
        }
    }

    /// Print a summary line per device
    pub fn recap(&self, rows: &[(String, Option<&StructuredResult>)]) {
        let header = "RECAP";
        let stars = "*".repeat(80 - header.len() - 1);
        println!(
            "\n{} {}",
            self.paint(header, |s| s.bright_white().bold().to_string()),
            self.paint(&stars, |s| s.bright_black().to_string())
        );

        let mut failures = 0;
        for (host, result) in rows {
            let (changed, applied, failed) = match result {
                Some(r) => (r.changed, r.applied, r.failed),
                None => (false, false, true),
            };
            if failed {
                failures += 1;
            }
            let line = format!(
                "{:<30} : changed={:<5} applied={:<5} failed={:<5}",
                host, changed, applied, failed
            );
            if failed {
                println!("{}", self.paint(&line, |s| s.red().to_string()));
            } else if changed {
                println!("{}", self.paint(&line, |s| s.yellow().to_string()));
            } else {
                println!("{}", self.paint(&line, |s| s.green().to_string()));
            }
        }

        let took = format!("Run took {}", format_duration(self.start_time.elapsed()));
        println!("\n{}", self.paint(&took, |s| s.bright_black().to_string()));
        if failures > 0 {
            println!(
                "{}",
                self.paint(&format!("{} device(s) failed.", failures), |s| s
                    .red()
                    .bold()
                    .to_string())
            );
        }
    }

    /// Print the registered device families
    pub fn families(&self, families: &[&FamilyInfo]) {
        if self.json_mode {
            self.json(&json!(families));
            return;
        }
        println!(
            "{}",
            self.paint(
                &format!("{:<8} {:<28} {}", "FAMILY", "ALIASES", "DESCRIPTION"),
                |s| s.bold().to_string()
            )
        );
        for family in families {
            println!(
                "{:<8} {:<28} {}",
                family.name,
                family.aliases.join(", "),
                family.description
            );
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "ERROR:".red().bold(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.use_color {
            eprintln!("{} {}", "WARNING:".yellow().bold(), message);
        } else {
            eprintln!("WARNING: {}", message);
        }
    }

    fn detail(&self, key: &str, value: &str) {
        if self.use_color {
            println!("    {}: {}", key.bright_black(), value);
        } else {
            println!("    {}: {}", key, value);
        }
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> String) -> String {
        if self.use_color {
            style(text)
        } else {
            text.to_string()
        }
    }
}

/// Format a duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        let mins = duration.as_secs() / 60;
        let rem = duration.as_secs() % 60;
        format!("{}m {}s", mins, rem)
    }
}
