use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{StoreArgs, SubmitArgs};
use crate::model::ResultsFile;
use crate::store::with_immediate_transaction;
use crate::util::{print_json_pretty, read_json};

use super::{grading_engine, open_connection};

pub fn run(store_args: &StoreArgs, args: SubmitArgs) -> Result<()> {
    let results: ResultsFile = read_json(&args.results)?;
    let engine = grading_engine(store_args)?;
    let mut connection = open_connection(store_args)?;

    info!(
        sample_id = args.sample_id,
        results = results.results.len(),
        path = %args.results.display(),
        "grading submission"
    );

    let outcome = with_immediate_transaction(&mut connection, |store| {
        engine.evaluate_and_persist(store, args.sample_id, &results.results, Utc::now())
    })
    .inspect_err(|err| {
        warn!(
            sample_id = args.sample_id,
            code = err.error_code(),
            "submission rolled back; nothing was persisted"
        );
    })
    .with_context(|| format!("failed to grade submission for sample {}", args.sample_id))?;

    if args.json {
        return print_json_pretty(&outcome);
    }

    for measurement in &outcome.measurements {
        info!(
            measurement_id = measurement.measurement_id,
            test_id = measurement.test_id,
            parameter_id = measurement.parameter_id,
            value = %measurement.value,
            is_valid = measurement.is_valid,
            label = %measurement.label,
            "measurement"
        );
    }
    info!(
        sample_id = outcome.sample_id,
        sample_label = %outcome.sample_label,
        lot_id = outcome.lot_id,
        lot_label = %outcome.lot_label,
        "submission persisted"
    );
    Ok(())
}
