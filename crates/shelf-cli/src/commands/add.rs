use shelf_core::{NewProduct, ProductCollection, SyncMode};

use crate::commands::common::{parse_product_id, Session};
use crate::error::CliError;

pub struct AddArgs {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub stock: i64,
    pub id: Option<String>,
}

pub fn build_new_product(args: AddArgs) -> Result<NewProduct, CliError> {
    let mut draft = NewProduct::new(args.name.trim(), args.category.trim(), args.price, args.stock);
    if let Some(raw_id) = args.id.as_deref() {
        draft = draft.with_id(parse_product_id(raw_id)?);
    }
    Ok(draft)
}

pub async fn run_add(session: &Session, args: AddArgs) -> Result<(), CliError> {
    let draft = build_new_product(args)?;
    let inventory = session.open_inventory().await?;
    let handle = inventory.insert(draft).await?;
    let id = handle.id().clone();

    // The query cache only holds the row for the lifetime of this process.
    if session.mode == SyncMode::Query {
        handle.persisted().await?;
    }

    println!("{id}");
    Ok(())
}
