use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ustar_format::{HeaderDialect, DEFAULT_RECORDS_PER_BLOCK};

#[derive(Debug, Parser)]
#[command(
    name = "ustar",
    about = "Create, list and extract tar archives.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(visible_alias = "c", about = "Create a new archive")]
    Create(CreateArgs),

    #[command(visible_alias = "x", about = "Extract files from an archive")]
    Extract(ExtractArgs),

    #[command(visible_aliases = ["l", "ls", "t"], about = "List files in an archive")]
    List(ListArgs),
}

/// Header dialect to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dialect {
    /// POSIX ustar (names up to 255 bytes)
    Ustar,
    /// GNU tar's ustar variant
    Gnu,
    /// Pre-POSIX headers (names up to 100 bytes)
    V7,
}

impl From<Dialect> for HeaderDialect {
    fn from(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Ustar => HeaderDialect::UsTar,
            Dialect::Gnu => HeaderDialect::Gnu,
            Dialect::V7 => HeaderDialect::LegacyUnix,
        }
    }
}

#[derive(Debug, clap::Args)]
#[command(after_help = "\
\x1b[1m\x1b[4mExamples:\x1b[0m
  ustar create backup.tar src/ Cargo.toml
  ustar create --dialect v7 old.tar notes.txt
  ustar create -f --block-size 1 tiny.tar file")]
pub struct CreateArgs {
    /// Output archive path
    pub archive: PathBuf,

    /// Header dialect for every entry
    #[arg(long, value_enum, default_value_t = Dialect::Ustar)]
    pub dialect: Dialect,

    /// Don't recurse into directories
    #[arg(long = "no-recursive")]
    pub no_recursive: bool,

    /// Records (512 bytes each) per block
    #[arg(long = "block-size", value_name = "RECORDS", default_value_t = DEFAULT_RECORDS_PER_BLOCK)]
    pub records_per_block: usize,

    /// Suppress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Overwrite existing archive
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Files and directories to archive
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct ExtractArgs {
    /// Path to the archive to extract
    pub archive: PathBuf,

    /// Output directory (defaults to current directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Replace files that already exist
    #[arg(long)]
    pub overwrite: bool,

    /// Don't apply the stored permissions
    #[arg(long = "no-permissions")]
    pub no_permissions: bool,

    /// Fail on header checksum mismatches
    #[arg(long)]
    pub verify: bool,

    /// Records (512 bytes each) per block
    #[arg(long = "block-size", value_name = "RECORDS", default_value_t = DEFAULT_RECORDS_PER_BLOCK)]
    pub records_per_block: usize,

    /// Suppress output (quiet mode)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, clap::Args)]
pub struct ListArgs {
    /// Path to the archive
    pub archive: PathBuf,

    /// Show detailed information (permissions, owner, timestamps, checksums)
    #[arg(short = 'l', long)]
    pub long: bool,

    /// Output in JSON format
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Fail on header checksum mismatches
    #[arg(long)]
    pub verify: bool,
}
