use anyhow::Result;
use tracing::info;

use crate::cli::StoreArgs;
use crate::store::sqlite::DB_SCHEMA_VERSION;

use super::open_connection;

pub fn run(args: &StoreArgs) -> Result<()> {
    open_connection(args)?;
    info!(
        path = %args.db_path.display(),
        schema_version = DB_SCHEMA_VERSION,
        "database ready"
    );
    Ok(())
}
