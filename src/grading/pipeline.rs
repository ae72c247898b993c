use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::aggregate::{
    current_results, latest_per_parameter, lot_label, lot_label_from_winners, sample_label,
};
use super::error::{GradingError, GradingResult};
use super::evaluator::ParameterEvaluator;
use super::label::{Grade, LotLabel};
use super::resolver::resolve_measurement;
use crate::config::GradingPolicy;
use crate::model::{LotReport, Measurement, MeasurementOutcome, RawMeasurement, SubmissionOutcome};
use crate::store::GradingStore;
use crate::util::now_utc_string;

pub struct GradingEngine {
    evaluator: ParameterEvaluator,
    policy: GradingPolicy,
}

impl GradingEngine {
    pub fn new(policy: GradingPolicy) -> GradingResult<Self> {
        Ok(Self {
            evaluator: ParameterEvaluator::new(policy.accept_decimal_comma)?,
            policy,
        })
    }

    pub fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    /// Records a lab submission for one sample, then regrades the sample and
    /// its lot from everything stored. The caller owns the transaction.
    pub fn evaluate_and_persist<S: GradingStore>(
        &self,
        store: &S,
        sample_id: i64,
        raw: &[RawMeasurement],
        recorded_at: DateTime<Utc>,
    ) -> GradingResult<SubmissionOutcome> {
        if raw.is_empty() {
            return Err(GradingError::EmptySubmission { sample_id });
        }
        let lot_id = store.lot_of_sample(sample_id)?;

        let test_ids = distinct(raw.iter().map(|item| item.test_id));
        let parameter_ids = distinct(raw.iter().map(|item| item.parameter_id));
        let standards = store.standards_for(&test_ids, &parameter_ids)?;

        let mut measurements = Vec::with_capacity(raw.len());
        for item in raw {
            let applicable = standards
                .iter()
                .filter(|standard| standard.applies_to(item.test_id, item.parameter_id))
                .cloned()
                .collect::<Vec<_>>();
            if applicable.is_empty() {
                warn!(
                    sample_id,
                    test_id = item.test_id,
                    parameter_id = item.parameter_id,
                    "no standards for parameter; result will be held"
                );
            }

            let evaluation = self.evaluator.evaluate(&item.value, &applicable);
            let label = resolve_measurement(&evaluation);

            let measurement_id = store.record_measurement(sample_id, item, recorded_at)?;
            store.save_measurement_label(measurement_id, evaluation.is_valid, label)?;

            debug!(
                measurement_id,
                parameter_id = item.parameter_id,
                value = %item.value,
                is_valid = evaluation.is_valid,
                candidates = evaluation.candidates.len(),
                label = %label,
                "graded measurement"
            );

            measurements.push(MeasurementOutcome {
                measurement_id,
                test_id: item.test_id,
                parameter_id: item.parameter_id,
                value: item.value.clone(),
                is_valid: evaluation.is_valid,
                label,
            });
        }

        let sample_label = self.recompute_sample(store, sample_id)?;
        let lot_label = self.recompute_lot(store, lot_id)?;

        info!(
            sample_id,
            lot_id,
            measurements = measurements.len(),
            sample_label = %sample_label,
            lot_label = %lot_label,
            "submission graded"
        );

        Ok(SubmissionOutcome {
            sample_id,
            lot_id,
            measurements,
            sample_label,
            lot_label,
        })
    }

    /// Grades the sample from its current results only; a resubmitted
    /// parameter no longer counts its earlier rows.
    pub fn recompute_sample<S: GradingStore>(
        &self,
        store: &S,
        sample_id: i64,
    ) -> GradingResult<Grade> {
        let measurements = store.for_sample(sample_id)?;
        let labels = current_results(&measurements)
            .into_iter()
            .map(|measurement| measurement.label)
            .collect::<Vec<_>>();
        let label = sample_label(&labels);
        store.save_sample_label(sample_id, label)?;

        debug!(
            sample_id,
            measurements = measurements.len(),
            current = labels.len(),
            label = %label,
            "sample regraded"
        );
        Ok(label)
    }

    pub fn recompute_lot<S: GradingStore>(&self, store: &S, lot_id: i64) -> GradingResult<LotLabel> {
        let measurements = store.for_lot(lot_id)?;
        let label = lot_label(&measurements, self.policy.empty_lot_label);
        store.save_lot_label(lot_id, label)?;

        debug!(lot_id, measurements = measurements.len(), label = %label, "lot regraded");
        Ok(label)
    }

    /// Regrades every sample of the lot, then the lot itself.
    pub fn recompute_lot_fully<S: GradingStore>(
        &self,
        store: &S,
        lot_id: i64,
    ) -> GradingResult<(Vec<(i64, Grade)>, LotLabel)> {
        let mut samples = Vec::new();
        for sample_id in store.samples_of_lot(lot_id)? {
            samples.push((sample_id, self.recompute_sample(store, sample_id)?));
        }
        let label = self.recompute_lot(store, lot_id)?;

        info!(lot_id, samples = samples.len(), label = %label, "lot recomputed");
        Ok((samples, label))
    }

    /// Read-only: which measurement decided each parameter, and the grade
    /// those winners produce.
    pub fn explain_lot<S: GradingStore>(&self, store: &S, lot_id: i64) -> GradingResult<LotReport> {
        let sample_ids = store.samples_of_lot(lot_id)?;
        let measurements = store.for_lot(lot_id)?;
        let parameters = latest_per_parameter(&measurements);
        let calculated_label = lot_label_from_winners(&parameters, self.policy.empty_lot_label);

        Ok(LotReport {
            lot_id,
            generated_at: now_utc_string(),
            sample_count: sample_ids.len(),
            measurement_count: measurements.len(),
            parameters,
            calculated_label,
            input_digest: input_digest(&measurements),
        })
    }
}

fn distinct(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Stable over the fields that decide a lot grade; independent of read order.
pub fn input_digest(measurements: &[Measurement]) -> String {
    let mut ordered = measurements.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|measurement| measurement.id);

    let mut hasher = Sha256::new();
    for measurement in ordered {
        hasher.update(
            format!(
                "{}|{}|{}|{}|{}\n",
                measurement.id,
                measurement.sample_id,
                measurement.parameter_id,
                measurement.label.as_str(),
                measurement.created_at.to_rfc3339()
            )
            .as_bytes(),
        );
    }
    format!("{:x}", hasher.finalize())
}
