use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{RecomputeArgs, StoreArgs};
use crate::store::with_immediate_transaction;

use super::{grading_engine, open_connection};

pub fn run(store_args: &StoreArgs, args: RecomputeArgs) -> Result<()> {
    let engine = grading_engine(store_args)?;
    let mut connection = open_connection(store_args)?;

    let (samples, lot_label) = with_immediate_transaction(&mut connection, |store| {
        engine.recompute_lot_fully(store, args.lot_id)
    })
    .with_context(|| format!("failed to recompute lot {}", args.lot_id))?;

    for (sample_id, label) in &samples {
        info!(sample_id = *sample_id, label = %label, "sample label");
    }
    info!(
        lot_id = args.lot_id,
        samples = samples.len(),
        lot_label = %lot_label,
        "lot label persisted"
    );
    Ok(())
}
