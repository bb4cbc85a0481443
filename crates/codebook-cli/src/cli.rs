//! CLI argument definitions for Codebook Studio.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "codebook-studio",
    version,
    about = "Codebook Studio - normalize clinical codebooks into selection trees",
    long_about = "Normalize clinical data-set definitions into a unified selection tree.\n\n\
                  Reads dataset-export XML and flattened openEHR archetypes from a local\n\
                  cache directory and prints the normalized item tree per dataset and\n\
                  language."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build one codebook document and print its normalized tree.
    Tree(TreeArgs),

    /// List the codebooks declared in the catalog.
    Codebooks(CodebooksArgs),
}

#[derive(Parser)]
pub struct TreeArgs {
    /// Codebook name as declared in the catalog.
    #[arg(value_name = "CODEBOOK")]
    pub codebook: String,

    /// Dataset id (dataset-XML codebooks) or archetype id (archetype
    /// codebooks).
    #[arg(value_name = "DOCUMENT")]
    pub document: String,

    /// Build language, e.g. nl-NL or en.
    #[arg(long = "language", default_value = "en-US")]
    pub language: String,

    /// Path to the codebook catalog TOML.
    #[arg(long = "catalog", value_name = "PATH", default_value = "codebooks.toml")]
    pub catalog: PathBuf,

    /// Local cache directory holding the downloaded source documents.
    #[arg(long = "cache-dir", value_name = "DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Print item codelists below each leaf.
    #[arg(long = "codelists")]
    pub codelists: bool,
}

#[derive(Parser)]
pub struct CodebooksArgs {
    /// Path to the codebook catalog TOML.
    #[arg(long = "catalog", value_name = "PATH", default_value = "codebooks.toml")]
    pub catalog: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
