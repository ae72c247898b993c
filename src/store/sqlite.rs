use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use tracing::{debug, info};

use super::{LabelSource, MeasurementStore, PersistenceGateway, StandardsStore};
use crate::grading::error::{GradingError, GradingResult};
use crate::grading::label::{Grade, LabelCatalog, LotLabel};
use crate::model::{Measurement, RawMeasurement, Standard, StandardEntry, StoreCounts};
use crate::util::{ensure_directory, now_utc_string};

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

const SEED_LABELS: [(i64, &str); 3] = [
    (1, "Retenido"),
    (2, "Calidad Standard"),
    (3, "Calidad Superior"),
];

pub fn open_database(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    prepare_connection(&connection)?;
    Ok(connection)
}

pub fn prepare_connection(connection: &Connection) -> Result<()> {
    configure_connection(connection)?;
    ensure_schema(connection)?;
    Ok(())
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to set foreign_keys=ON")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS labels (
              label_id INTEGER PRIMARY KEY,
              name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS standards (
              standard_id INTEGER PRIMARY KEY AUTOINCREMENT,
              test_id INTEGER NOT NULL,
              parameter_id INTEGER NOT NULL,
              label_id INTEGER NOT NULL,
              min_value REAL NOT NULL,
              max_value REAL NOT NULL,
              UNIQUE(test_id, parameter_id, label_id),
              FOREIGN KEY(label_id) REFERENCES labels(label_id)
            );

            CREATE TABLE IF NOT EXISTS lots (
              lot_id INTEGER PRIMARY KEY,
              calculated_label_id INTEGER,
              updated_at TEXT,
              FOREIGN KEY(calculated_label_id) REFERENCES labels(label_id)
            );

            CREATE TABLE IF NOT EXISTS samples (
              sample_id INTEGER PRIMARY KEY,
              lot_id INTEGER NOT NULL,
              resolved_label_id INTEGER,
              updated_at TEXT,
              FOREIGN KEY(lot_id) REFERENCES lots(lot_id),
              FOREIGN KEY(resolved_label_id) REFERENCES labels(label_id)
            );

            CREATE TABLE IF NOT EXISTS measurements (
              measurement_id INTEGER PRIMARY KEY AUTOINCREMENT,
              sample_id INTEGER NOT NULL,
              test_id INTEGER NOT NULL,
              parameter_id INTEGER NOT NULL,
              value TEXT NOT NULL,
              is_valid INTEGER NOT NULL DEFAULT 0,
              resolved_label_id INTEGER,
              created_at TEXT NOT NULL,
              FOREIGN KEY(sample_id) REFERENCES samples(sample_id),
              FOREIGN KEY(resolved_label_id) REFERENCES labels(label_id)
            );

            CREATE INDEX IF NOT EXISTS idx_standards_test_parameter
              ON standards(test_id, parameter_id);
            CREATE INDEX IF NOT EXISTS idx_samples_lot ON samples(lot_id);
            CREATE INDEX IF NOT EXISTS idx_measurements_sample ON measurements(sample_id);
            ",
        )
        .context("failed to create schema")?;

    for (label_id, name) in SEED_LABELS {
        connection
            .execute(
                "INSERT OR IGNORE INTO labels(label_id, name) VALUES(?1, ?2)",
                params![label_id, name],
            )
            .with_context(|| format!("failed to seed label {name}"))?;
    }

    connection
        .execute(
            "
            INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            ",
            params![DB_SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;

    Ok(())
}

/// Runs `work` inside one `IMMEDIATE` transaction. SQLite admits a single
/// writer, so two recomputations of the same lot can never interleave their
/// read-then-write. Any error rolls back every label written by `work`.
pub fn with_immediate_transaction<T, F>(connection: &mut Connection, work: F) -> GradingResult<T>
where
    F: FnOnce(&SqliteStore<'_>) -> GradingResult<T>,
{
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let value = {
        let store = SqliteStore::open(&transaction)?;
        work(&store)?
    };
    transaction.commit()?;
    Ok(value)
}

struct MeasurementRow {
    id: i64,
    sample_id: i64,
    test_id: i64,
    parameter_id: i64,
    value: String,
    is_valid: bool,
    label_id: Option<i64>,
    created_at: DateTime<Utc>,
}

pub struct SqliteStore<'c> {
    connection: &'c Connection,
    catalog: LabelCatalog,
}

impl<'c> SqliteStore<'c> {
    pub fn open(connection: &'c Connection) -> GradingResult<Self> {
        let mut statement =
            connection.prepare("SELECT label_id, name FROM labels ORDER BY label_id ASC")?;
        let rows = statement
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = LabelCatalog::from_rows(rows)?;

        Ok(Self {
            connection,
            catalog,
        })
    }

    pub fn register_sample(&self, lot_id: i64, sample_id: i64) -> GradingResult<bool> {
        self.connection.execute(
            "INSERT OR IGNORE INTO lots(lot_id, calculated_label_id, updated_at) VALUES(?1, NULL, NULL)",
            params![lot_id],
        )?;

        let existing_lot = self
            .connection
            .query_row(
                "SELECT lot_id FROM samples WHERE sample_id = ?1",
                params![sample_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        match existing_lot {
            Some(current) if current == lot_id => Ok(false),
            Some(current) => Err(GradingError::SampleConflict {
                sample_id,
                lot_id: current,
            }),
            None => {
                self.connection.execute(
                    "INSERT INTO samples(sample_id, lot_id, resolved_label_id, updated_at) VALUES(?1, ?2, NULL, NULL)",
                    params![sample_id, lot_id],
                )?;
                Ok(true)
            }
        }
    }

    /// Replaces every standard of each (test, parameter) present in
    /// `entries`. Label names are normalized here and nowhere else.
    pub fn replace_standards(&self, entries: &[StandardEntry]) -> GradingResult<usize> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            let grade = self.catalog.normalize(&entry.label)?;
            let label_id = self.catalog.id_for(grade)?;
            resolved.push((entry, label_id));
        }

        let pairs = entries
            .iter()
            .map(|entry| (entry.test_id, entry.parameter_id))
            .collect::<BTreeSet<_>>();
        for (test_id, parameter_id) in &pairs {
            self.connection.execute(
                "DELETE FROM standards WHERE test_id = ?1 AND parameter_id = ?2",
                params![test_id, parameter_id],
            )?;
        }

        let mut inserted = 0_usize;
        for (entry, label_id) in resolved {
            inserted += self.connection.execute(
                "
                INSERT INTO standards(test_id, parameter_id, label_id, min_value, max_value)
                VALUES(?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(test_id, parameter_id, label_id) DO UPDATE SET
                  min_value=excluded.min_value,
                  max_value=excluded.max_value
                ",
                params![
                    entry.test_id,
                    entry.parameter_id,
                    label_id,
                    entry.criteria.min,
                    entry.criteria.max,
                ],
            )?;
        }

        info!(
            pairs = pairs.len(),
            standards = inserted,
            "replaced standards"
        );
        Ok(inserted)
    }

    pub fn stored_sample_label(&self, sample_id: i64) -> GradingResult<Option<Grade>> {
        let label_id = self
            .connection
            .query_row(
                "SELECT resolved_label_id FROM samples WHERE sample_id = ?1",
                params![sample_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .ok_or(GradingError::UnknownSample { sample_id })?;

        label_id
            .map(|id| self.catalog.grade_for_id(id))
            .transpose()
    }

    pub fn stored_lot_label(&self, lot_id: i64) -> GradingResult<LotLabel> {
        let label_id = self
            .connection
            .query_row(
                "SELECT calculated_label_id FROM lots WHERE lot_id = ?1",
                params![lot_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .ok_or(GradingError::UnknownLot { lot_id })?;

        match label_id {
            Some(id) => Ok(LotLabel::Graded(self.catalog.grade_for_id(id)?)),
            None => Ok(LotLabel::NotAnalyzed),
        }
    }

    pub fn counts(&self) -> GradingResult<StoreCounts> {
        Ok(StoreCounts {
            labels: self.count("SELECT COUNT(*) FROM labels")?,
            standards: self.count("SELECT COUNT(*) FROM standards")?,
            lots: self.count("SELECT COUNT(*) FROM lots")?,
            samples: self.count("SELECT COUNT(*) FROM samples")?,
            measurements: self.count("SELECT COUNT(*) FROM measurements")?,
            lots_not_analyzed: self
                .count("SELECT COUNT(*) FROM lots WHERE calculated_label_id IS NULL")?,
        })
    }

    fn count(&self, sql: &str) -> GradingResult<i64> {
        Ok(self.connection.query_row(sql, [], |row| row.get(0))?)
    }

    fn load_measurements(&self, sql: &str, key: i64) -> GradingResult<Vec<Measurement>> {
        let mut statement = self.connection.prepare(sql)?;
        let rows = statement
            .query_map(params![key], |row| {
                Ok(MeasurementRow {
                    id: row.get(0)?,
                    sample_id: row.get(1)?,
                    test_id: row.get(2)?,
                    parameter_id: row.get(3)?,
                    value: row.get(4)?,
                    is_valid: row.get(5)?,
                    label_id: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let label_id = row.label_id.ok_or_else(|| GradingError::UnknownLabel {
                    label: format!("measurement {} has no label", row.id),
                })?;
                Ok(Measurement {
                    id: row.id,
                    sample_id: row.sample_id,
                    test_id: row.test_id,
                    parameter_id: row.parameter_id,
                    value: row.value,
                    is_valid: row.is_valid,
                    label: self.catalog.grade_for_id(label_id)?,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

impl LabelSource for SqliteStore<'_> {
    fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }
}

impl StandardsStore for SqliteStore<'_> {
    fn standards_for(
        &self,
        test_ids: &[i64],
        parameter_ids: &[i64],
    ) -> GradingResult<Vec<Standard>> {
        if test_ids.is_empty() || parameter_ids.is_empty() {
            return Ok(Vec::new());
        }

        let test_slots = vec!["?"; test_ids.len()].join(", ");
        let parameter_slots = vec!["?"; parameter_ids.len()].join(", ");
        let sql = format!(
            "
            SELECT test_id, parameter_id, label_id, min_value, max_value
            FROM standards
            WHERE test_id IN ({test_slots}) AND parameter_id IN ({parameter_slots})
            ORDER BY test_id ASC, parameter_id ASC, label_id ASC
            "
        );

        let mut statement = self.connection.prepare(&sql)?;
        let rows = statement
            .query_map(params_from_iter(test_ids.iter().chain(parameter_ids)), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(test_id, parameter_id, label_id, min, max)| {
                Ok(Standard {
                    test_id,
                    parameter_id,
                    grade: self.catalog.grade_for_id(label_id)?,
                    min,
                    max,
                })
            })
            .collect()
    }
}

impl MeasurementStore for SqliteStore<'_> {
    fn lot_of_sample(&self, sample_id: i64) -> GradingResult<i64> {
        self.connection
            .query_row(
                "SELECT lot_id FROM samples WHERE sample_id = ?1",
                params![sample_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(GradingError::UnknownSample { sample_id })
    }

    fn samples_of_lot(&self, lot_id: i64) -> GradingResult<Vec<i64>> {
        let exists = self
            .connection
            .query_row(
                "SELECT 1 FROM lots WHERE lot_id = ?1",
                params![lot_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(GradingError::UnknownLot { lot_id });
        }

        let mut statement = self
            .connection
            .prepare("SELECT sample_id FROM samples WHERE lot_id = ?1 ORDER BY sample_id ASC")?;
        let sample_ids = statement
            .query_map(params![lot_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(sample_ids)
    }

    fn for_sample(&self, sample_id: i64) -> GradingResult<Vec<Measurement>> {
        self.load_measurements(
            "
            SELECT measurement_id, sample_id, test_id, parameter_id, value, is_valid,
                   resolved_label_id, created_at
            FROM measurements
            WHERE sample_id = ?1
            ORDER BY measurement_id ASC
            ",
            sample_id,
        )
    }

    fn for_lot(&self, lot_id: i64) -> GradingResult<Vec<Measurement>> {
        self.load_measurements(
            "
            SELECT m.measurement_id, m.sample_id, m.test_id, m.parameter_id, m.value,
                   m.is_valid, m.resolved_label_id, m.created_at
            FROM measurements m
            JOIN samples s ON s.sample_id = m.sample_id
            WHERE s.lot_id = ?1
            ORDER BY m.measurement_id ASC
            ",
            lot_id,
        )
    }
}

impl PersistenceGateway for SqliteStore<'_> {
    fn record_measurement(
        &self,
        sample_id: i64,
        raw: &RawMeasurement,
        created_at: DateTime<Utc>,
    ) -> GradingResult<i64> {
        self.connection.execute(
            "
            INSERT INTO measurements(sample_id, test_id, parameter_id, value, is_valid, resolved_label_id, created_at)
            VALUES(?1, ?2, ?3, ?4, 0, NULL, ?5)
            ",
            params![
                sample_id,
                raw.test_id,
                raw.parameter_id,
                raw.value,
                created_at
            ],
        )?;
        let measurement_id = self.connection.last_insert_rowid();
        debug!(measurement_id, sample_id, parameter_id = raw.parameter_id, "recorded measurement");
        Ok(measurement_id)
    }

    fn save_measurement_label(
        &self,
        measurement_id: i64,
        is_valid: bool,
        label: Grade,
    ) -> GradingResult<()> {
        let label_id = self.catalog.id_for(label)?;
        self.connection.execute(
            "UPDATE measurements SET is_valid = ?2, resolved_label_id = ?3 WHERE measurement_id = ?1",
            params![measurement_id, is_valid, label_id],
        )?;
        Ok(())
    }

    fn save_sample_label(&self, sample_id: i64, label: Grade) -> GradingResult<()> {
        let label_id = self.catalog.id_for(label)?;
        let updated = self.connection.execute(
            "UPDATE samples SET resolved_label_id = ?2, updated_at = ?3 WHERE sample_id = ?1",
            params![sample_id, label_id, now_utc_string()],
        )?;
        if updated == 0 {
            return Err(GradingError::UnknownSample { sample_id });
        }
        Ok(())
    }

    fn save_lot_label(&self, lot_id: i64, label: LotLabel) -> GradingResult<()> {
        let label_id = label
            .grade()
            .map(|grade| self.catalog.id_for(grade))
            .transpose()?;
        let updated = self.connection.execute(
            "UPDATE lots SET calculated_label_id = ?2, updated_at = ?3 WHERE lot_id = ?1",
            params![lot_id, label_id, now_utc_string()],
        )?;
        if updated == 0 {
            return Err(GradingError::UnknownLot { lot_id });
        }
        Ok(())
    }
}
