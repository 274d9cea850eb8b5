//! Shelf CLI - manage the product inventory from the terminal
//!
//! Reads and writes go through the offline store by default; `--mode query`
//! talks to the products API directly.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use cli::{Cli, Commands};
use commands::add::{run_add, AddArgs};
use commands::common::{ProductPatch, Session};
use commands::conflicts::run_conflicts;
use commands::delete::run_delete;
use commands::edit::run_edit;
use commands::list::run_list;
use commands::status::run_status;
use commands::sync::run_sync;
use commands::watch::run_watch;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "shelf=info"
        .parse()
        .map_err(|error| CliError::Io(std::io::Error::other(error)))?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session = Session::resolve(cli.mode.into(), cli.db_path, cli.api_url)?;

    match cli.command {
        Commands::List { json } => run_list(&session, json).await?,
        Commands::Add {
            name,
            category,
            price,
            stock,
            id,
        } => {
            let args = AddArgs {
                name,
                category,
                price,
                stock,
                id,
            };
            run_add(&session, args).await?;
        }
        Commands::Edit {
            id,
            name,
            category,
            price,
            stock,
        } => {
            let patch = ProductPatch::new(name, category, price, stock);
            run_edit(&session, &id, patch).await?;
        }
        Commands::Delete { id } => run_delete(&session, &id).await?,
        Commands::Sync => run_sync(&session).await?,
        Commands::Status { json } => run_status(&session, json).await?,
        Commands::Watch => run_watch(&session).await?,
        Commands::Conflicts { limit, json } => run_conflicts(&session, limit, json).await?,
    }

    Ok(())
}
