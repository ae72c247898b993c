use tracing::debug;

use super::evaluator::Evaluation;
use super::label::{Grade, most_demanding};

/// Collapses an evaluation into one grade. Unparseable values and values no
/// standard admits fall back to the most demanding grade.
pub fn resolve_measurement(evaluation: &Evaluation) -> Grade {
    if evaluation.candidates.len() > 1 {
        debug!(
            candidates = ?evaluation.candidates,
            "value admitted by overlapping standards"
        );
    }
    most_demanding(&evaluation.candidates).unwrap_or(Grade::MOST_DEMANDING)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(is_valid: bool, candidates: Vec<Grade>) -> Evaluation {
        Evaluation {
            is_valid,
            value: is_valid.then_some(1.0),
            candidates,
        }
    }

    #[test]
    fn single_candidate_is_kept() {
        assert_eq!(
            resolve_measurement(&evaluation(true, vec![Grade::Superior])),
            Grade::Superior
        );
    }

    #[test]
    fn overlap_resolves_to_most_demanding_candidate() {
        assert_eq!(
            resolve_measurement(&evaluation(true, vec![Grade::Standard, Grade::Superior])),
            Grade::Standard
        );
        assert_eq!(
            resolve_measurement(&evaluation(
                true,
                vec![Grade::Superior, Grade::Retenido, Grade::Standard]
            )),
            Grade::Retenido
        );
    }

    #[test]
    fn invalid_value_defaults_to_retenido() {
        assert_eq!(
            resolve_measurement(&evaluation(false, Vec::new())),
            Grade::Retenido
        );
    }

    #[test]
    fn unmatched_value_defaults_to_retenido() {
        assert_eq!(
            resolve_measurement(&evaluation(true, Vec::new())),
            Grade::Retenido
        );
    }
}
