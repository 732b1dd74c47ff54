use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};

#[derive(Parser)]
#[command(name = "pii-annotator")]
#[command(
    about = "Annotate large text files with personal-data category tags through LLM endpoints",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Print the command report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chunked annotation loop over one input file, resuming from its cursor
    Annotate {
        /// Plain UTF-8 text file to annotate
        #[arg(short, long)]
        input: PathBuf,

        /// Config file (default: ANNOTATOR_CONFIG_PATH or ~/.pii-annotator/annotator.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many requests (0 runs until end of file)
        #[arg(long)]
        requests: Option<u64>,

        /// Directory that holds per-input job directories
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Convert hand-tagged text into the JSON segment format
    Convert {
        /// Tagged text file
        #[arg(short, long)]
        input: PathBuf,

        /// JSON output path (default: input with .json extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also append per-category text dumps to this directory
        #[arg(long)]
        dumps_dir: Option<PathBuf>,
    },

    /// Word-level diff of two text files
    Diff {
        original: PathBuf,
        changed: PathBuf,
    },

    /// Read one word-aligned chunk from a file
    ReadChunk {
        #[arg(short, long)]
        input: PathBuf,

        /// Byte offset to start from
        #[arg(long, default_value = "0")]
        position: u64,

        /// Approximate chunk length in characters
        #[arg(long)]
        chars: Option<usize>,
    },

    /// Show the job state for one input file
    Status {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        let state = if report.ok { "ok" } else { "failed" };
        println!("{} {state}", report.command);
        for detail in &report.details {
            println!("  {detail}");
        }
        for issue in &report.issues {
            println!("  issue: {issue}");
        }
    }

    if !report.ok {
        bail!(
            "{} reported {} issue(s)",
            report.command,
            report.issues.len()
        );
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Annotate {
            input,
            config,
            requests,
            output_dir,
        } => commands::annotate::run(&commands::annotate::AnnotateOptions {
            input,
            config,
            requests,
            output_dir,
        })?,
        Commands::Convert {
            input,
            output,
            dumps_dir,
        } => commands::convert::run(&commands::convert::ConvertOptions {
            input,
            output,
            dumps_dir,
        })?,
        Commands::Diff { original, changed } => {
            commands::diff::run(&commands::diff::DiffOptions { original, changed })?
        }
        Commands::ReadChunk {
            input,
            position,
            chars,
        } => commands::read_chunk::run(&commands::read_chunk::ReadChunkOptions {
            input,
            position,
            chars,
        })?,
        Commands::Status {
            input,
            config,
            output_dir,
        } => commands::status::run(&commands::status::StatusOptions {
            input,
            config,
            output_dir,
        })?,
    };

    render(&report, cli.json)
}
