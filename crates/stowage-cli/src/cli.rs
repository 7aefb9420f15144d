use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stowage",
    about = "Store and fetch blobs in a relational database or a pinning cluster",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Backend configuration file (TOML with a [sql] or [cluster] section)
    #[arg(short, long, global = true, default_value = "stowage.toml")]
    pub config: PathBuf,

    /// Per-call timeout in milliseconds, 0 for none. Overrides the file.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the key-value table (relational backend only)
    Setup,
    /// Store a file and print its identifier
    Put(PutArgs),
    /// Fetch a blob by identifier
    Get(GetArgs),
    /// Delete a blob by identifier
    Del(DelArgs),
    /// Connect to the backend and report its status
    Ping,
}

#[derive(Args)]
pub struct PutArgs {
    /// File to store, or `-` for stdin
    pub input: String,
}

#[derive(Args)]
pub struct GetArgs {
    /// Hex-encoded blob identifier
    pub id: String,
    /// Write the blob here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DelArgs {
    /// Hex-encoded blob identifier
    pub id: String,
}
