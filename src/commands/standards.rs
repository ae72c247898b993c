use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cli::{ImportStandardsArgs, StoreArgs};
use crate::model::StandardsFile;
use crate::store::with_immediate_transaction;
use crate::util::read_json;

use super::open_connection;

pub fn run(store_args: &StoreArgs, args: ImportStandardsArgs) -> Result<()> {
    let file: StandardsFile = read_json(&args.file)?;
    if file.standards.is_empty() {
        bail!("no standards found in {}", args.file.display());
    }

    let mut connection = open_connection(store_args)?;
    let inserted = with_immediate_transaction(&mut connection, |store| {
        store.replace_standards(&file.standards)
    })
    .with_context(|| format!("failed to import standards from {}", args.file.display()))?;

    info!(
        path = %args.file.display(),
        entries = file.standards.len(),
        stored = inserted,
        "standards imported"
    );
    Ok(())
}
