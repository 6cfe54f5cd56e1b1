// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Output formatting module for CLI
//!
//! Provides JSON and pretty-printed text output with colors

use anyhow::Result;
use colored::Colorize;
use pvs_editor::bus::{BusEvent, StatusEvent};
use pvs_editor::protocol::StatusUpdate;
use pvs_editor::tree::{SymbolKind, SymbolNode};
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid output format: {}. Must be 'text' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Output formatter for different output formats
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Output a success message
    pub fn success(&self, message: &str) -> Result<()> {
        self.message("success", message, |m| println!("{}", m.green().bold()))
    }

    /// Output an error message
    pub fn error(&self, message: &str) -> Result<()> {
        self.message("error", message, |m| eprintln!("{}", m.red().bold()))
    }

    pub fn warning(&self, message: &str) -> Result<()> {
        self.message("warning", message, |m| println!("{}", m.yellow()))
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.message("info", message, |m| println!("{}", m))
    }

    fn message(&self, level: &str, message: &str, text: impl FnOnce(&str)) -> Result<()> {
        match self.format {
            OutputFormat::Text => text(message),
            OutputFormat::Json => self.output_json(&JsonMessage { level, message })?,
        }
        Ok(())
    }

    /// Output the symbol tree
    pub fn output_tree(&self, root: &SymbolNode) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                if root.children.is_empty() {
                    println!("{}", "(no symbols)".dimmed());
                } else {
                    print!("{}", render_tree(root));
                }
            }
            OutputFormat::Json => self.output_json(root)?,
        }
        Ok(())
    }

    /// Output one bus event as a console line
    pub fn output_event(&self, event: &BusEvent) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                if let Some(line) = render_event(event) {
                    println!("{}", line);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        Ok(())
    }

    /// Output JSON
    fn output_json<T: Serialize + ?Sized>(&self, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        println!("{}", json);
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonMessage<'a> {
    level: &'a str,
    message: &'a str,
}

/// Indented text rendering of everything below `root`
pub fn render_tree(root: &SymbolNode) -> String {
    let mut out = String::new();
    let count = root.children.len();
    for (i, child) in root.children.iter().enumerate() {
        render_node(child, "", i + 1 == count, &mut out);
    }
    out
}

fn render_node(node: &SymbolNode, prefix: &str, last: bool, out: &mut String) {
    let branch = if last { "└── " } else { "├── " };
    let name = match node.kind {
        SymbolKind::File => node.name.bold().to_string(),
        SymbolKind::Theory => node.name.cyan().bold().to_string(),
        SymbolKind::Formula => node.name.bright_magenta().to_string(),
        SymbolKind::Error => node.name.red().to_string(),
        SymbolKind::Warning => node.name.yellow().to_string(),
        _ => node.name.clone(),
    };

    out.push_str(prefix);
    out.push_str(branch);
    out.push_str(&name);
    if node.kind.is_leaf() {
        out.push_str(&format!(" [{}]", node.kind.label().to_lowercase()).dimmed().to_string());
    }
    if let Some(location) = &node.location {
        out.push_str(&format!(" {}", location.dimmed()));
    }
    out.push('\n');

    let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        render_node(child, &child_prefix, i + 1 == count, out);
    }
}

/// Console rendering of a bus event; `None` for events with no console text
pub fn render_event(event: &BusEvent) -> Option<String> {
    match event {
        BusEvent::InitializeConsole => Some("PVS console ready".dimmed().to_string()),
        BusEvent::UpdateFrame => None,
        BusEvent::ConsoleWriteLine(line) => Some(line.clone()),
        BusEvent::ConsoleWritePrompt(prompt) => Some(prompt.green().to_string()),
        BusEvent::PvsStatus(StatusEvent::ModeChanged { to, .. }) => {
            Some(to.label().cyan().bold().to_string())
        }
        BusEvent::PvsStatus(StatusEvent::Error { message }) => {
            Some(format!("✗ {}", message).red().to_string())
        }
        BusEvent::PvsStatus(StatusEvent::Update(update)) => match update {
            StatusUpdate::Node(desc) if desc.kind.is_diagnostic() => {
                let place = desc.location.as_deref().unwrap_or("");
                let line = format!("{}: {} {}", desc.kind, desc.name, place);
                Some(match desc.kind {
                    SymbolKind::Error => line.trim_end().red().to_string(),
                    SymbolKind::Warning => line.trim_end().yellow().to_string(),
                    _ => line.trim_end().to_string(),
                })
            }
            StatusUpdate::ProcessExited { code } => Some(
                match code {
                    Some(code) => format!("PVS exited with code {}", code),
                    None => "PVS exited".to_string(),
                }
                .yellow()
                .to_string(),
            ),
            StatusUpdate::Node(_) | StatusUpdate::Section(_) => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvs_editor::mode::Mode;
    use pvs_editor::tree::{NodeDescription, TreeBuilder};

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_render_tree_nests_and_annotates() {
        colored::control::set_override(false);
        let mut builder = TreeBuilder::new();
        builder.begin_file("nat.pvs");
        builder.insert(NodeDescription::new(SymbolKind::Theory, "Nat"));
        builder.insert(NodeDescription::new(SymbolKind::Formula, "comm").at("nat.pvs:4:3"));

        assert_eq!(
            render_tree(builder.root()),
            "└── nat.pvs\n    └── Nat\n        └── comm [formula] nat.pvs:4:3\n"
        );
    }

    #[test]
    fn test_render_event_skips_frame_updates() {
        colored::control::set_override(false);
        assert_eq!(render_event(&BusEvent::UpdateFrame), None);
        assert_eq!(
            render_event(&BusEvent::PvsStatus(StatusEvent::ModeChanged {
                from: Mode::Off,
                to: Mode::Prover,
            })),
            Some("PVS Mode: Prover".to_string())
        );
        assert_eq!(
            render_event(&BusEvent::PvsStatus(StatusEvent::Update(
                StatusUpdate::ProcessExited { code: Some(3) }
            ))),
            Some("PVS exited with code 3".to_string())
        );
    }
}
