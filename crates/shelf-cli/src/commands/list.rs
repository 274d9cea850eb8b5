use shelf_core::ProductCollection;

use crate::commands::common::{format_product_lines, Session};
use crate::error::CliError;

pub async fn run_list(session: &Session, as_json: bool) -> Result<(), CliError> {
    let inventory = session.open_inventory().await?;
    let products = inventory.list().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }

    for line in format_product_lines(&products) {
        println!("{line}");
    }
    Ok(())
}
