// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `imgdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "imgdag",
    version,
    about = "Run a DAG of image and geometry operations.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Pipeline.toml")]
    pub pipeline: PathBuf,

    /// Number of passes to execute.
    #[arg(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub passes: u32,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `IMGDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and assemble, print the execution order, but run
    /// nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Write a node's image output as PGM after the last pass.
    #[arg(long = "export", value_name = "NODE=PATH")]
    pub exports: Vec<ExportTarget>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// `--export NODE=PATH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub node: String,
    pub path: PathBuf,
}

impl FromStr for ExportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((node, path)) if !node.trim().is_empty() && !path.trim().is_empty() => Ok(Self {
                node: node.trim().to_string(),
                path: PathBuf::from(path.trim()),
            }),
            _ => Err(format!("expected NODE=PATH, got '{s}'")),
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_command_line() {
        let args = CliArgs::try_parse_from([
            "imgdag",
            "--pipeline",
            "demo.toml",
            "--passes",
            "3",
            "--log-level",
            "debug",
            "--export",
            "blur=out.pgm",
            "--export",
            "edges = edges.pgm",
        ])
        .unwrap();

        assert_eq!(args.pipeline, PathBuf::from("demo.toml"));
        assert_eq!(args.passes, 3);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(!args.dry_run);
        assert_eq!(
            args.exports,
            vec![
                ExportTarget { node: "blur".into(), path: "out.pgm".into() },
                ExportTarget { node: "edges".into(), path: "edges.pgm".into() },
            ]
        );
    }

    #[test]
    fn zero_passes_and_bad_exports_are_rejected() {
        assert!(CliArgs::try_parse_from(["imgdag", "--passes", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["imgdag", "--export", "nopath"]).is_err());
    }
}
