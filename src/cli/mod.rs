//! CLI command definitions and handlers

mod doctor;
mod init;
mod predict;
mod tokenize;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressStyle;

use vadima::config::load_config;

/// Parse and validate a count that must be at least 1
fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// vadima - parameter type suggestions
///
/// Runs locally against a model directory; nothing is downloaded.
#[derive(Parser, Debug)]
#[command(name = "vadima")]
#[command(
    version,
    about = "Suggest parameter types for a function from its source text",
    after_help = "\
Examples:
  vadima predict add.py --params 2          Rank type labels for both parameters
  vadima predict - --format json < add.py   Read stdin, print JSON
  vadima tokenize add.py                    Show tokens and ids fed to the model
  vadima init                               Write an example vadima.toml
  vadima doctor                             Check model files and configuration"
)]
pub struct Cli {
    /// Config file (default: ./vadima.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Predict parameter types for the function in FILE ("-" for stdin)
    Predict {
        file: PathBuf,

        /// Number of parameters (default: counted from the `def` header)
        #[arg(long, short = 'p')]
        params: Option<usize>,

        /// Number of merged candidates to show
        #[arg(long, short = 'k', value_parser = parse_positive)]
        top_k: Option<usize>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show the token sequence and ids for FILE ("-" for stdin)
    Tokenize {
        file: PathBuf,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Write an example vadima.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check configuration and model files
    Doctor,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => init::run(cli.config.as_deref(), force),

        Commands::Predict {
            file,
            params,
            top_k,
            format,
        } => {
            let config = load_config(cli.config.as_deref())?;
            predict::run(config, &file, params, top_k, &format)
        }

        Commands::Tokenize { file, format } => {
            let config = load_config(cli.config.as_deref())?;
            tokenize::run(&config, &file, &format)
        }

        Commands::Doctor => doctor::run(cli.config.as_deref()),
    }
}

/// Read source text from a file, or stdin for `-`.
fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .expect("valid template")
}
