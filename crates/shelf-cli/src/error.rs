use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shelf_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Product ID cannot be empty")]
    EmptyProductId,
    #[error("Nothing to change; pass at least one of --name, --category, --price, --stock")]
    NothingToEdit,
    #[error("`shelf {0}` needs the offline collection; drop `--mode query`")]
    OfflineOnly(&'static str),
}
