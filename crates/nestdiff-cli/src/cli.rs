use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "nestdiff",
    about = "Recursively compare two files, archives or directories",
    version
)]
pub struct Cli {
    /// First file or directory to compare
    pub file1: PathBuf,

    /// Second file or directory to compare
    pub file2: PathBuf,

    /// Write a text report to PATH ("-" for stdout)
    #[arg(long, value_name = "PATH")]
    pub text: Option<String>,

    /// Write a JSON report to PATH ("-" for stdout)
    #[arg(long, value_name = "PATH")]
    pub json: Option<String>,

    /// Compare members present on one side only against an empty artifact
    #[arg(long)]
    pub new_file: bool,

    /// Minimum similarity for pairing renamed members (0 disables)
    #[arg(long, value_name = "F")]
    pub fuzzy_threshold: Option<f64>,

    /// Stop once the report reaches this many bytes of diff text
    #[arg(long, value_name = "BYTES")]
    pub max_report_size: Option<u64>,

    /// Maximum container nesting depth
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Read comparison options from a TOML file; flags override it
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long)]
    pub debug: bool,

    /// Show progress on stderr
    #[arg(long)]
    pub progress: bool,
}

/// Where a report is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Stdout,
    File(PathBuf),
}

impl Target {
    pub fn parse(value: &str) -> Self {
        match value {
            "-" => Self::Stdout,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

impl Cli {
    /// The text report goes to stdout unless some report was requested.
    pub fn text_target(&self) -> Option<Target> {
        match (&self.text, &self.json) {
            (None, None) => Some(Target::Stdout),
            (text, _) => text.as_deref().map(Target::parse),
        }
    }

    pub fn json_target(&self) -> Option<Target> {
        self.json.as_deref().map(Target::parse)
    }
}
