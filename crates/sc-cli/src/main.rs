#![forbid(unsafe_code)]

//! StreamChart CLI - parse and lay out flowchart diagrams.
//!
//! # Commands
//!
//! - `parse`: Output the parsed diagram (or a summary) as JSON
//! - `layout`: Run the full pipeline and output positions and routed edges
//! - `detect`: Show the diagram kind named by the header line

use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sc_engine::{evidence_json, process_with_config};
use sc_layout::LayoutConfig;
use sc_parser::{detect_kind, parse, parse_evidence_json};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Environment variable overriding the crossing minimization pass cap.
const CROSSING_PASSES_ENV: &str = "SC_CROSSING_PASSES";

/// StreamChart CLI - parse and lay out flowchart diagrams.
#[derive(Debug, Parser)]
#[command(
    name = "sc-cli",
    version,
    about = "StreamChart CLI - parse and lay out flowchart diagrams",
    long_about = "Parses diagram DSL text and computes a layered layout.\n\n\
        Output is JSON meant for a renderer: node positions, routed edges\n\
        and canvas size. Non-flowchart diagrams are passed through verbatim."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging (can be repeated for more detail: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a diagram and output it as JSON.
    Parse {
        /// Input file path, inline diagram text, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output the full diagram (default is summary)
        #[arg(long)]
        full: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lay out a diagram and output positions and routed edges as JSON.
    Layout {
        /// Input file path, inline diagram text, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Layout config file (.toml or .json)
        #[arg(short, long)]
        config: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Output a one-line run summary instead of the full layout
        #[arg(long)]
        evidence: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Detect the diagram kind.
    Detect {
        /// Input file path, inline diagram text, or "-" for stdin.
        #[arg(default_value = "-")]
        input: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Result of detecting the diagram kind.
#[derive(Debug, Serialize)]
struct DetectResult {
    diagram_kind: String,
    supported: bool,
    first_line: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Parse {
            input,
            full,
            pretty,
        } => cmd_parse(&input, full, pretty),

        Command::Layout {
            input,
            config,
            output,
            evidence,
            pretty,
        } => cmd_layout(
            &input,
            config.as_deref(),
            output.as_deref(),
            evidence,
            pretty,
        ),

        Command::Detect { input, json } => cmd_detect(&input, json),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .try_init();
}

fn load_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else if Path::new(input).exists() {
        std::fs::read_to_string(input).context(format!("Failed to read file: {input}"))
    } else {
        // Treat as inline diagram text
        Ok(input.to_string())
    }
}

fn write_output(output: Option<&str>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).context(format!("Failed to write to: {path}"))?;
            info!("Wrote output to: {path}");
        }
        None => {
            let mut stdout = io::stdout();
            stdout
                .write_all(content.as_bytes())
                .and_then(|()| stdout.write_all(b"\n"))
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Config file (if any), then the environment override, then validation.
fn load_config(path: Option<&str>) -> Result<LayoutConfig> {
    let mut config = match path {
        Some(path) => {
            let text =
                std::fs::read_to_string(path).context(format!("Failed to read config: {path}"))?;
            let extension = Path::new(path)
                .extension()
                .and_then(|extension| extension.to_str())
                .map(str::to_ascii_lowercase);
            let parsed = match extension.as_deref() {
                Some("toml") => LayoutConfig::from_toml_str(&text),
                Some("json") => LayoutConfig::from_json_str(&text),
                _ => bail!("Unsupported config format (expected .toml or .json): {path}"),
            };
            parsed.context(format!("Invalid config: {path}"))?
        }
        None => LayoutConfig::default(),
    };

    if let Some(passes) = crossing_passes_override()? {
        debug!(passes, "crossing pass cap from environment");
        config.crossing_passes = passes;
    }
    config
        .validate()
        .context(format!("Invalid {CROSSING_PASSES_ENV} value"))?;
    Ok(config)
}

fn crossing_passes_override() -> Result<Option<usize>> {
    match std::env::var(CROSSING_PASSES_ENV) {
        Ok(value) => {
            let passes = value
                .trim()
                .parse::<usize>()
                .context(format!("{CROSSING_PASSES_ENV} must be a positive integer, got {value:?}"))?;
            Ok(Some(passes))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).context(format!("Failed to read {CROSSING_PASSES_ENV}")),
    }
}

// =============================================================================
// Command: parse
// =============================================================================

fn cmd_parse(input: &str, full: bool, pretty: bool) -> Result<()> {
    let source = load_input(input)?;
    let parsed = parse(&source);

    let output = if full {
        to_json(&parsed, pretty)?
    } else if pretty {
        let value: serde_json::Value = serde_json::from_str(&parse_evidence_json(&parsed))?;
        serde_json::to_string_pretty(&value)?
    } else {
        parse_evidence_json(&parsed)
    };

    println!("{output}");

    for warning in &parsed.warnings {
        warn!("Parse warning: {warning}");
    }

    Ok(())
}

// =============================================================================
// Command: layout
// =============================================================================

fn cmd_layout(
    input: &str,
    config_path: Option<&str>,
    output: Option<&str>,
    evidence: bool,
    pretty: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let source = load_input(input)?;
    let result = process_with_config(&source, &config);

    if result.is_unsupported() {
        info!(
            "{} diagrams are passed through without layout",
            result.detected_kind.as_str()
        );
    }
    for warning in &result.warnings {
        warn!("Parse warning: {warning}");
    }
    if let Some(stats) = result.stats {
        if stats.unresolved_edges > 0 {
            warn!(
                "{} edge(s) could not be routed clear of other nodes",
                stats.unresolved_edges
            );
        }
    }

    let content = if evidence {
        let summary = evidence_json(&result);
        if pretty {
            let value: serde_json::Value = serde_json::from_str(&summary)?;
            serde_json::to_string_pretty(&value)?
        } else {
            summary
        }
    } else {
        to_json(&result, pretty)?
    };

    write_output(output, &content)
}

// =============================================================================
// Command: detect
// =============================================================================

fn cmd_detect(input: &str, json_output: bool) -> Result<()> {
    let source = load_input(input)?;
    let kind = detect_kind(&source);
    let first_line = source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("%%"))
        .unwrap_or("");
    let supported = kind == sc_core::DiagramKind::Flowchart;

    if json_output {
        let result = DetectResult {
            diagram_kind: kind.as_str().to_string(),
            supported,
            first_line: first_line.chars().take(100).collect(),
        };
        println!("{}", to_json(&result, true)?);
    } else {
        println!("Diagram kind: {}", kind.as_str());
        println!(
            "Layout:       {}",
            if supported { "layered" } else { "passthrough" }
        );
        if !first_line.is_empty() {
            println!(
                "First line:   {}",
                first_line.chars().take(60).collect::<String>()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Cli, load_config, to_json};
    use clap::Parser;

    #[test]
    fn verbosity_flags_are_global() {
        let cli = Cli::try_parse_from(["sc-cli", "layout", "-vv", "graph TD"]).expect("valid args");
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(Some("/definitely/not/here.toml")).expect_err("missing file");
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn unknown_config_extension_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("layout.yaml");
        std::fs::write(&path, "crossing_passes: 3").expect("write config");
        let err = load_config(path.to_str()).expect_err("yaml is not supported");
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn pretty_json_is_multiline() {
        let json = to_json(&serde_json::json!({ "a": 1 }), true).expect("serializable");
        assert!(json.contains('\n'));
    }
}
