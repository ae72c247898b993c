use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{ReportArgs, StoreArgs};
use crate::store::SqliteStore;
use crate::util::{print_json_pretty, write_json_pretty};

use super::{grading_engine, open_connection};

pub fn run(store_args: &StoreArgs, args: ReportArgs) -> Result<()> {
    let engine = grading_engine(store_args)?;
    let connection = open_connection(store_args)?;
    let store = SqliteStore::open(&connection).context("failed to load label catalog")?;

    let report = engine
        .explain_lot(&store, args.lot_id)
        .with_context(|| format!("failed to explain lot {}", args.lot_id))?;
    let stored = store
        .stored_lot_label(args.lot_id)
        .with_context(|| format!("failed to read stored label of lot {}", args.lot_id))?;

    if stored != report.calculated_label {
        warn!(
            lot_id = args.lot_id,
            stored = %stored,
            recomputed = %report.calculated_label,
            "stored lot label is stale; run `seedlot recompute`"
        );
    }

    if let Some(output) = &args.output {
        write_json_pretty(output, &report)?;
        info!(path = %output.display(), "wrote lot report");
    }

    if args.json {
        return print_json_pretty(&report);
    }

    for winner in &report.parameters {
        info!(
            parameter_id = winner.parameter_id,
            test_id = winner.test_id,
            measurement_id = winner.measurement_id,
            sample_id = winner.sample_id,
            created_at = %winner.created_at.to_rfc3339(),
            superseded = winner.superseded,
            label = %winner.label,
            "latest result"
        );
    }
    info!(
        lot_id = report.lot_id,
        samples = report.sample_count,
        measurements = report.measurement_count,
        empty_lot_label = ?engine.policy().empty_lot_label,
        calculated_label = %report.calculated_label,
        input_digest = %report.input_digest,
        "lot report"
    );
    Ok(())
}
