use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Detect business-registration forms in page snapshots.
#[derive(Parser)]
#[command(name = "formscout")]
#[command(version)]
pub(crate) struct Cli {
    /// JSON configuration file (defaults apply to any key left out)
    #[arg(short, long, env = "FORMSCOUT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run one detection pass and print the result
    Detect {
        /// Page snapshot (JSON)
        snapshot: PathBuf,

        /// Print the DetectionResult as JSON instead of a card
        #[arg(long)]
        json: bool,

        /// Show the rules each field matched
        #[arg(long)]
        rules: bool,
    },

    /// Write classified fields to an Arrow IPC file
    Export {
        /// Page snapshot (JSON)
        snapshot: PathBuf,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Also print the exported rows as a table
        #[arg(long)]
        print: bool,
    },

    /// Detect and publish the settled result to a consumer over HTTP
    Push {
        /// Page snapshot (JSON)
        snapshot: PathBuf,

        /// Consumer base URL, e.g. http://localhost:4000
        #[arg(long, env = "FORMSCOUT_ENDPOINT")]
        endpoint: String,

        /// Give up if nothing has been delivered after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}
