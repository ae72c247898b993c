use std::collections::BTreeMap;

use super::label::{Grade, LotLabel, all_agree};
use crate::config::EmptyLotPolicy;
use crate::model::{Measurement, ParameterWinner};

/// One occurrence of a worse grade pulls the aggregate down; the best grade
/// needs every entry to agree. `None` only for an empty input.
pub fn aggregate_grades(labels: &[Grade]) -> Option<Grade> {
    if labels.contains(&Grade::Retenido) {
        return Some(Grade::Retenido);
    }
    if labels.contains(&Grade::Standard) {
        return Some(Grade::Standard);
    }
    if all_agree(labels, Grade::LEAST_DEMANDING) {
        return Some(Grade::LEAST_DEMANDING);
    }
    None
}

/// A sample with nothing measured is held.
pub fn sample_label(labels: &[Grade]) -> Grade {
    aggregate_grades(labels).unwrap_or(Grade::MOST_DEMANDING)
}

fn newest<'a>(group: impl IntoIterator<Item = &'a Measurement>) -> Option<&'a Measurement> {
    group
        .into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

/// A sample's current results: a resubmitted (test, parameter) replaces the
/// earlier rows, ordered the same way as [`latest_per_parameter`].
pub fn current_results(measurements: &[Measurement]) -> Vec<&Measurement> {
    let mut groups = BTreeMap::<(i64, i64), Vec<&Measurement>>::new();
    for measurement in measurements {
        groups
            .entry((measurement.test_id, measurement.parameter_id))
            .or_default()
            .push(measurement);
    }

    groups.into_values().filter_map(newest).collect()
}

/// Latest measurement of every parameter across the whole lot, ordered by
/// parameter id. Later `created_at` wins; equal timestamps go to the higher
/// measurement id.
pub fn latest_per_parameter(measurements: &[Measurement]) -> Vec<ParameterWinner> {
    let mut groups = BTreeMap::<i64, Vec<&Measurement>>::new();
    for measurement in measurements {
        groups
            .entry(measurement.parameter_id)
            .or_default()
            .push(measurement);
    }

    groups
        .into_iter()
        .filter_map(|(parameter_id, group)| {
            let superseded = group.len() - 1;
            newest(group).map(|latest| ParameterWinner {
                    parameter_id,
                    test_id: latest.test_id,
                    measurement_id: latest.id,
                    sample_id: latest.sample_id,
                    created_at: latest.created_at,
                    label: latest.label,
                    superseded,
                })
        })
        .collect()
}

pub fn lot_label_from_winners(winners: &[ParameterWinner], empty: EmptyLotPolicy) -> LotLabel {
    let labels = winners
        .iter()
        .map(|winner| winner.label)
        .collect::<Vec<Grade>>();

    match aggregate_grades(&labels) {
        Some(grade) => LotLabel::Graded(grade),
        None => match empty {
            EmptyLotPolicy::NotAnalyzed => LotLabel::NotAnalyzed,
            EmptyLotPolicy::MostDemanding => LotLabel::Graded(Grade::MOST_DEMANDING),
        },
    }
}

pub fn lot_label(measurements: &[Measurement], empty: EmptyLotPolicy) -> LotLabel {
    lot_label_from_winners(&latest_per_parameter(measurements), empty)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn measurement(
        id: i64,
        sample_id: i64,
        parameter_id: i64,
        label: Grade,
        minutes: i64,
    ) -> Measurement {
        Measurement {
            id,
            sample_id,
            test_id: 1,
            parameter_id,
            value: "0".to_string(),
            is_valid: true,
            label,
            created_at: at(minutes),
        }
    }

    #[test]
    fn sample_with_one_retenido_is_retenido() {
        assert_eq!(
            sample_label(&[Grade::Superior, Grade::Retenido]),
            Grade::Retenido
        );
        let mut many = vec![Grade::Superior; 25];
        many.push(Grade::Retenido);
        assert_eq!(sample_label(&many), Grade::Retenido);
    }

    #[test]
    fn sample_with_standard_and_superior_is_standard() {
        assert_eq!(
            sample_label(&[Grade::Superior, Grade::Standard, Grade::Superior]),
            Grade::Standard
        );
    }

    #[test]
    fn sample_unanimous_superior_is_superior() {
        assert_eq!(
            sample_label(&[Grade::Superior, Grade::Superior, Grade::Superior]),
            Grade::Superior
        );
    }

    #[test]
    fn empty_sample_is_held() {
        assert_eq!(sample_label(&[]), Grade::Retenido);
    }

    #[test]
    fn superior_iff_every_label_is_superior() {
        let sets: Vec<Vec<Grade>> = vec![
            vec![],
            vec![Grade::Superior],
            vec![Grade::Standard],
            vec![Grade::Retenido],
            vec![Grade::Superior, Grade::Standard],
            vec![Grade::Superior, Grade::Retenido],
            vec![Grade::Superior, Grade::Superior],
            vec![Grade::Standard, Grade::Retenido, Grade::Superior],
        ];
        for set in sets {
            let unanimous = !set.is_empty() && set.iter().all(|grade| *grade == Grade::Superior);
            assert_eq!(sample_label(&set) == Grade::Superior, unanimous, "{set:?}");
        }
    }

    #[test]
    fn resubmitted_result_replaces_the_earlier_one_in_a_sample() {
        let measurements = vec![
            measurement(1, 100, 1, Grade::Retenido, 0),
            measurement(2, 100, 2, Grade::Superior, 0),
            measurement(3, 100, 1, Grade::Superior, 30),
        ];
        let current = current_results(&measurements)
            .into_iter()
            .map(|measurement| measurement.id)
            .collect::<Vec<_>>();
        assert_eq!(current, vec![3, 2]);

        let labels = current_results(&measurements)
            .into_iter()
            .map(|measurement| measurement.label)
            .collect::<Vec<_>>();
        assert_eq!(sample_label(&labels), Grade::Superior);
    }

    #[test]
    fn current_results_keep_tests_apart_and_break_ties_by_id() {
        let mut other_test = measurement(4, 100, 1, Grade::Standard, 0);
        other_test.test_id = 2;
        let measurements = vec![
            measurement(6, 100, 1, Grade::Retenido, 10),
            measurement(5, 100, 1, Grade::Superior, 10),
            other_test,
        ];
        let current = current_results(&measurements)
            .into_iter()
            .map(|measurement| measurement.id)
            .collect::<Vec<_>>();
        assert_eq!(current, vec![6, 4]);
    }

    #[test]
    fn latest_measurement_per_parameter_wins() {
        let measurements = vec![
            measurement(1, 100, 1, Grade::Superior, 0),
            measurement(2, 100, 1, Grade::Standard, 30),
            measurement(3, 200, 2, Grade::Superior, 10),
        ];

        let winners = latest_per_parameter(&measurements);
        assert_eq!(winners.len(), 2);
        assert_eq!(winners[0].parameter_id, 1);
        assert_eq!(winners[0].measurement_id, 2);
        assert_eq!(winners[0].superseded, 1);
        assert_eq!(winners[1].measurement_id, 3);
        assert_eq!(winners[1].superseded, 0);

        assert_eq!(
            lot_label(&measurements, EmptyLotPolicy::NotAnalyzed),
            LotLabel::Graded(Grade::Standard)
        );
    }

    #[test]
    fn newer_better_result_replaces_older_worse_one() {
        let measurements = vec![
            measurement(5, 100, 1, Grade::Superior, 60),
            measurement(4, 101, 1, Grade::Retenido, 0),
        ];
        assert_eq!(
            lot_label(&measurements, EmptyLotPolicy::NotAnalyzed),
            LotLabel::Graded(Grade::Superior)
        );
    }

    #[test]
    fn equal_timestamps_break_ties_by_highest_id() {
        let measurements = vec![
            measurement(9, 100, 1, Grade::Retenido, 5),
            measurement(12, 101, 1, Grade::Superior, 5),
            measurement(10, 100, 1, Grade::Standard, 5),
        ];
        let winners = latest_per_parameter(&measurements);
        assert_eq!(winners[0].measurement_id, 12);

        let mut reversed = measurements.clone();
        reversed.reverse();
        assert_eq!(latest_per_parameter(&reversed), winners);
    }

    #[test]
    fn empty_lot_follows_policy() {
        assert_eq!(
            lot_label(&[], EmptyLotPolicy::NotAnalyzed),
            LotLabel::NotAnalyzed
        );
        assert_eq!(
            lot_label(&[], EmptyLotPolicy::MostDemanding),
            LotLabel::Graded(Grade::Retenido)
        );
    }
}
