use regex::Regex;
use tracing::warn;

use super::error::GradingResult;
use super::label::Grade;
use crate::model::Standard;

/// Plain decimal notation only: no exponents, no `inf`/`NaN`.
const DECIMAL_PATTERN: &str = r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)$";

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub is_valid: bool,
    pub value: Option<f64>,
    pub candidates: Vec<Grade>,
}

impl Evaluation {
    fn unparseable() -> Self {
        Self {
            is_valid: false,
            value: None,
            candidates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterEvaluator {
    decimal: Regex,
    accept_decimal_comma: bool,
}

impl ParameterEvaluator {
    pub fn new(accept_decimal_comma: bool) -> GradingResult<Self> {
        Ok(Self {
            decimal: Regex::new(DECIMAL_PATTERN)?,
            accept_decimal_comma,
        })
    }

    pub fn parse_value(&self, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        let normalized = if self.accept_decimal_comma
            && !trimmed.contains('.')
            && trimmed.matches(',').count() == 1
        {
            if looks_like_thousands(trimmed) {
                warn!(value = %trimmed, "comma could be a thousands separator; value is held");
                return None;
            }
            trimmed.replace(',', ".")
        } else {
            trimmed.to_string()
        };

        if !self.decimal.is_match(&normalized) {
            return None;
        }
        normalized.parse::<f64>().ok().filter(|value| value.is_finite())
    }

    /// `standards` must already be narrowed to the measurement's
    /// (test, parameter). Each admitted range contributes its grade once.
    pub fn evaluate(&self, raw: &str, standards: &[Standard]) -> Evaluation {
        let Some(value) = self.parse_value(raw) else {
            return Evaluation::unparseable();
        };

        let mut candidates = Vec::<Grade>::new();
        for standard in standards {
            if standard.min > standard.max {
                warn!(
                    test_id = standard.test_id,
                    parameter_id = standard.parameter_id,
                    label = %standard.grade,
                    min = standard.min,
                    max = standard.max,
                    "standard range is inverted; it can never match"
                );
                continue;
            }
            if standard.admits(value) && !candidates.contains(&standard.grade) {
                candidates.push(standard.grade);
            }
        }
        candidates.sort_by_key(|grade| grade.precedence());

        Evaluation {
            is_valid: true,
            value: Some(value),
            candidates,
        }
    }
}

/// `1,000` reads as one thousand or as one; `0,125` and `12,5` do not.
fn looks_like_thousands(value: &str) -> bool {
    let Some((whole, fraction)) = value.split_once(',') else {
        return false;
    };
    let whole = whole.trim_start_matches(['+', '-']);
    fraction.len() == 3
        && fraction.bytes().all(|byte| byte.is_ascii_digit())
        && whole.bytes().all(|byte| byte.is_ascii_digit())
        && !whole.trim_start_matches('0').is_empty()
}
