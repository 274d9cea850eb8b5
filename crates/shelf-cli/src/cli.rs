use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shelf_core::SyncMode;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Manage the product inventory from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Which collection backs reads and writes
    #[arg(long, global = true, value_enum, default_value_t = ModeArg::Offline)]
    pub mode: ModeArg,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Base URL of the products API (overrides SHELF_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List products
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a product
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stock: i64,
        /// Use this id instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },
    /// Change fields of an existing product
    Edit {
        /// Product ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        stock: Option<i64>,
    },
    /// Delete a product
    #[command(alias = "rm")]
    Delete {
        /// Product ID
        id: String,
    },
    /// Run one replication cycle (offline) or refresh the cache (query)
    Sync,
    /// Show pending changes and replication settings
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep replicating in the foreground until interrupted
    Watch,
    /// List recent push conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    Query,
    Offline,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Query => Self::Query,
            ModeArg::Offline => Self::Offline,
        }
    }
}
