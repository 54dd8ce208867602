use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

/// How a failing step affects the whole task.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Abort with an error
    Fail,
    /// Report and keep going
    Warn,
}

/// One `cargo` invocation with a label.
pub struct Step {
    pub label: &'static str,
    pub args: &'static [&'static str],
    pub on_failure: OnFailure,
}

impl Step {
    pub const fn required(label: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            label,
            args,
            on_failure: OnFailure::Fail,
        }
    }

    pub const fn advisory(label: &'static str, args: &'static [&'static str]) -> Self {
        Self {
            label,
            args,
            on_failure: OnFailure::Warn,
        }
    }

    /// Run the step, returning its output when it succeeded.
    pub fn run(&self) -> Result<Option<Output>> {
        println!("{}", format!("  {}...", self.label).cyan());
        let start = Instant::now();

        let output = Command::new("cargo")
            .args(self.args)
            .output()
            .with_context(|| format!("Failed to spawn cargo for '{}'", self.label))?;

        if output.status.success() {
            println!(
                "{}",
                format!(
                    "  ✓ {} passed in {:.2}s",
                    self.label,
                    start.elapsed().as_secs_f64()
                )
                .green()
            );
            return Ok(Some(output));
        }

        match self.on_failure {
            OnFailure::Fail => {
                eprintln!("{}", format!("  ✗ {} failed", self.label).red().bold());
                eprintln!();
                eprintln!("{}", String::from_utf8_lossy(&output.stdout));
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                anyhow::bail!("{} failed", self.label);
            }
            OnFailure::Warn => {
                eprintln!("{}", format!("  ⚠ {} reported issues", self.label).yellow().bold());
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                Ok(None)
            }
        }
    }
}

/// Pull the `test result:` line out of libtest output.
pub fn test_summary(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split("test result:").nth(1))
        .map(str::trim)
        .last()
        .map_or_else(|| "(summary not available)".to_string(), str::to_string)
}
