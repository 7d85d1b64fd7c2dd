//! Output formatting for CLI

use anyhow::Result;
use bypasser_common::{Report, RuntimeStatus};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    /// Machine-readable formats print whole results instead of prose
    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a value as JSON or YAML
pub fn print_serialized<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> Result<()> {
    if format.is_structured() {
        return print_serialized(items, format);
    }
    if items.is_empty() {
        println!("No items found.");
        return Ok(());
    }

    match format {
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
        _ => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
    }
    Ok(())
}

/// Print the changes, warnings and runtime commands of an operation
pub fn print_report(report: &Report) {
    if report.is_empty() {
        println!("No changes.");
        return;
    }
    print!("{}", render_report(report, false));
}

fn render_report(report: &Report, plain: bool) -> String {
    let heading = |text: &str| {
        if plain {
            text.to_string()
        } else {
            text.bold().to_string()
        }
    };
    let mut out = String::new();

    if !report.changes.is_empty() {
        out.push_str(&format!("{}\n", heading("Changes:")));
        for change in &report.changes {
            out.push_str(&format!("  - {} {}\n", change.action, change.path.display()));
        }
    }

    if !report.warnings.is_empty() {
        out.push_str(&format!("{}\n", heading("Warnings:")));
        for warning in &report.warnings {
            let line = if plain {
                warning.clone()
            } else {
                warning.yellow().to_string()
            };
            out.push_str(&format!("  - {}\n", line));
        }
    }

    if !report.runtime_actions.is_empty() {
        out.push_str(&format!("{}\n", heading("Runtime helper:")));
        for action in &report.runtime_actions {
            match action.status {
                RuntimeStatus::Executed => out.push_str(&format!(
                    "  - executed: {} ({})\n",
                    action.command, action.description
                )),
                RuntimeStatus::Suggested => {
                    let message = if action.message.is_empty() {
                        "not executed"
                    } else {
                        action.message.as_str()
                    };
                    out.push_str(&format!(
                        "  - suggested: {} ({}; {})\n",
                        action.command, action.description, message
                    ));
                }
            }
        }
    }
    out
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print a labelled detail line
pub fn print_detail(label: &str, value: impl std::fmt::Display) {
    println!("{} {}", format!("{}:", label).dimmed(), value);
}
