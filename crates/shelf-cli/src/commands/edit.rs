use shelf_core::{ProductCollection, SyncMode};

use crate::commands::common::{parse_product_id, ProductPatch, Session};
use crate::error::CliError;

pub async fn run_edit(session: &Session, id: &str, patch: ProductPatch) -> Result<(), CliError> {
    if patch.is_empty() {
        return Err(CliError::NothingToEdit);
    }
    let product_id = parse_product_id(id)?;

    let inventory = session.open_inventory().await?;
    let handle = inventory
        .update(&product_id, move |product| patch.apply(product))
        .await?;
    if session.mode == SyncMode::Query {
        handle.persisted().await?;
    }

    println!("{product_id}");
    Ok(())
}
