use shelf_core::{ProductCollection, SyncMode};

use crate::commands::common::{parse_product_id, Session};
use crate::error::CliError;

pub async fn run_delete(session: &Session, id: &str) -> Result<(), CliError> {
    let product_id = parse_product_id(id)?;

    let inventory = session.open_inventory().await?;
    let handle = inventory.delete(&product_id).await?;
    if session.mode == SyncMode::Query {
        handle.persisted().await?;
    }

    println!("{product_id}");
    Ok(())
}
