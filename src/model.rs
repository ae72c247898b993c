use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::grading::label::{Grade, LotLabel};

/// Inclusive acceptance range for one (test, parameter, grade).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standard {
    pub test_id: i64,
    pub parameter_id: i64,
    pub grade: Grade,
    pub min: f64,
    pub max: f64,
}

impl Standard {
    pub fn admits(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn applies_to(&self, test_id: i64, parameter_id: i64) -> bool {
        self.test_id == test_id && self.parameter_id == parameter_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub test_id: i64,
    pub parameter_id: i64,
    #[serde(deserialize_with = "value_as_text")]
    pub value: String,
}

/// Lab sheets send either `"12,5"` or `12.5`; both are kept as entered text.
fn value_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match TextOrNumber::deserialize(deserializer)? {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(number) => number.to_string(),
    })
}

/// Stored test result, read back with its label already normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub id: i64,
    pub sample_id: i64,
    pub test_id: i64,
    pub parameter_id: i64,
    pub value: String,
    pub is_valid: bool,
    pub label: Grade,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandardsFile {
    pub standards: Vec<StandardEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandardEntry {
    pub test_id: i64,
    pub parameter_id: i64,
    pub label: String,
    pub criteria: Criteria,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Criteria {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsFile {
    pub results: Vec<RawMeasurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementOutcome {
    pub measurement_id: i64,
    pub test_id: i64,
    pub parameter_id: i64,
    pub value: String,
    pub is_valid: bool,
    pub label: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub sample_id: i64,
    pub lot_id: i64,
    pub measurements: Vec<MeasurementOutcome>,
    pub sample_label: Grade,
    pub lot_label: LotLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterWinner {
    pub parameter_id: i64,
    pub test_id: i64,
    pub measurement_id: i64,
    pub sample_id: i64,
    pub created_at: DateTime<Utc>,
    pub label: Grade,
    pub superseded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotReport {
    pub lot_id: i64,
    pub generated_at: String,
    pub sample_count: usize,
    pub measurement_count: usize,
    pub parameters: Vec<ParameterWinner>,
    pub calculated_label: LotLabel,
    pub input_digest: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreCounts {
    pub labels: i64,
    pub standards: i64,
    pub lots: i64,
    pub samples: i64,
    pub measurements: i64,
    pub lots_not_analyzed: i64,
}
