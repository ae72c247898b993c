use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Grade given to a lot with no measurements at all.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyLotPolicy {
    #[default]
    NotAnalyzed,
    MostDemanding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradingPolicy {
    pub empty_lot_label: EmptyLotPolicy,
    pub accept_decimal_comma: bool,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            empty_lot_label: EmptyLotPolicy::NotAnalyzed,
            accept_decimal_comma: true,
        }
    }
}

impl GradingPolicy {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            info!(path = %path.display(), "policy file missing; using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let policy: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        info!(
            path = %path.display(),
            empty_lot_label = ?policy.empty_lot_label,
            accept_decimal_comma = policy.accept_decimal_comma,
            "loaded grading policy"
        );
        Ok(policy)
    }
}
