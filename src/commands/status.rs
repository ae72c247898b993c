use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::cli::StoreArgs;
use crate::store::{LabelSource, SqliteStore};
use crate::store::sqlite::DB_SCHEMA_VERSION;

use super::open_connection;

pub fn run(args: &StoreArgs) -> Result<()> {
    info!(db_path = %args.db_path.display(), "status requested");

    if !args.db_path.exists() {
        warn!(path = %args.db_path.display(), "database file missing; run `seedlot init`");
        return Ok(());
    }

    let connection = open_connection(args)?;
    let recorded_version = schema_version(&connection)?.unwrap_or_default();
    if recorded_version != DB_SCHEMA_VERSION {
        warn!(
            recorded = %recorded_version,
            expected = DB_SCHEMA_VERSION,
            "schema version mismatch"
        );
    }

    let store = SqliteStore::open(&connection).context("failed to load label catalog")?;
    let catalog = store.catalog();
    for label in catalog.all() {
        let precedence = catalog.precedence(&label.name)?;
        info!(
            label_id = label.id,
            name = %label.name,
            grade = %label.grade,
            precedence,
            "label"
        );
    }

    let counts = store.counts().context("failed to count rows")?;
    info!(
        schema_version = %recorded_version,
        labels = counts.labels,
        standards = counts.standards,
        lots = counts.lots,
        lots_not_analyzed = counts.lots_not_analyzed,
        samples = counts.samples,
        measurements = counts.measurements,
        "database status"
    );

    Ok(())
}

fn schema_version(connection: &Connection) -> Result<Option<String>> {
    let version = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}
