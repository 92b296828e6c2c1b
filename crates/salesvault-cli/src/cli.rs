use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "salesvault",
    about = "Encrypted storage and loading of monthly sales exports",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt every matching export in the source directory.
    Encrypt {
        /// Directory holding plaintext exports (defaults to `source_dir` from config).
        #[arg(long, value_name = "DIR")]
        source: Option<PathBuf>,
        /// File-name pattern; `*` and `?` are wildcards.
        #[arg(long, default_value = "*.csv")]
        pattern: String,
    },
    /// Decrypt and consolidate periods into one dataset.
    Load {
        /// Period to load; repeat for several. Defaults to every configured period.
        #[arg(long = "period", value_name = "ID")]
        periods: Vec<String>,
        /// Decode periods on parallel workers.
        #[arg(long)]
        parallel: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Load the optional aggregate source.
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Print a freshly generated encryption key.
    Keygen,
    /// Print version and exit.
    Version,
    /// Run a health check against core subsystems (key, cipher, directories).
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
