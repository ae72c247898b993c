use chrono::{DateTime, Utc};

use crate::grading::error::GradingResult;
use crate::grading::label::{Grade, LabelCatalog, LotLabel};
use crate::model::{Measurement, RawMeasurement, Standard};

pub mod sqlite;

pub use sqlite::{SqliteStore, open_database, with_immediate_transaction};

pub trait LabelSource {
    fn catalog(&self) -> &LabelCatalog;
}

pub trait StandardsStore {
    /// Every standard whose test is in `test_ids` and parameter is in
    /// `parameter_ids`, labels already normalized.
    fn standards_for(&self, test_ids: &[i64], parameter_ids: &[i64])
    -> GradingResult<Vec<Standard>>;
}

pub trait MeasurementStore {
    fn lot_of_sample(&self, sample_id: i64) -> GradingResult<i64>;

    fn samples_of_lot(&self, lot_id: i64) -> GradingResult<Vec<i64>>;

    fn for_sample(&self, sample_id: i64) -> GradingResult<Vec<Measurement>>;

    /// Joined across every sample of the lot.
    fn for_lot(&self, lot_id: i64) -> GradingResult<Vec<Measurement>>;
}

/// The only side-effecting seam of the engine.
pub trait PersistenceGateway {
    fn record_measurement(
        &self,
        sample_id: i64,
        raw: &RawMeasurement,
        created_at: DateTime<Utc>,
    ) -> GradingResult<i64>;

    fn save_measurement_label(
        &self,
        measurement_id: i64,
        is_valid: bool,
        label: Grade,
    ) -> GradingResult<()>;

    fn save_sample_label(&self, sample_id: i64, label: Grade) -> GradingResult<()>;

    fn save_lot_label(&self, lot_id: i64, label: LotLabel) -> GradingResult<()>;
}

pub trait GradingStore: LabelSource + StandardsStore + MeasurementStore + PersistenceGateway {}

impl<T> GradingStore for T where T: LabelSource + StandardsStore + MeasurementStore + PersistenceGateway
{}
