use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{RegisterSampleArgs, StoreArgs};
use crate::store::with_immediate_transaction;

use super::open_connection;

pub fn run(store_args: &StoreArgs, args: RegisterSampleArgs) -> Result<()> {
    let mut connection = open_connection(store_args)?;
    let created = with_immediate_transaction(&mut connection, |store| {
        store.register_sample(args.lot_id, args.sample_id)
    })
    .with_context(|| {
        format!(
            "failed to register sample {} in lot {}",
            args.sample_id, args.lot_id
        )
    })?;

    if created {
        info!(lot_id = args.lot_id, sample_id = args.sample_id, "sample registered");
    } else {
        info!(lot_id = args.lot_id, sample_id = args.sample_id, "sample already registered");
    }
    Ok(())
}
