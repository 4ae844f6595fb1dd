use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "esuser")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of Elasticsearch security users", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file declaring the cluster and its users
    #[arg(short, long, global = true, env = "ESUSER_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file recording what was last applied
    #[arg(short, long, global = true, env = "ESUSER_STATE")]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the cluster's users to the config
    Apply(ApplyArgs),

    /// Re-read every tracked user from the cluster
    Refresh,

    /// Delete tracked users from the cluster
    Destroy {
        /// Only destroy this user
        username: Option<String>,
    },

    /// Start tracking a user that already exists on the cluster
    Import {
        /// Username on the cluster
        username: String,
    },

    /// Show declared and tracked users without contacting the cluster
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of users to converge in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}
