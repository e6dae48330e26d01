use chrono::{DateTime, NaiveDate, Utc};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{DailyFeatureTally, FeatureKind, MomentumScore};

/// Fraction of an event's weight that survives `days_ago` days under the
/// configured half-life.
pub fn decay_factor(days_ago: i64, half_life_days: f64) -> f64 {
    0.5_f64.powf(days_ago as f64 / half_life_days)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Weighted, decayed sum over the tally window. Tallies dated after `as_of`
/// do not contribute.
pub fn raw_score(tallies: &[DailyFeatureTally], as_of: NaiveDate, config: &EngineConfig) -> f64 {
    let mut total = 0.0;
    for tally in tallies {
        if tally.date > as_of {
            continue;
        }
        let days_ago = (as_of - tally.date).num_days();
        let decay = decay_factor(days_ago, config.half_life_days);
        for feature in FeatureKind::ALL {
            let count = tally.count(feature);
            if count > 0 {
                total += count as f64 * config.weight(feature) * decay;
            }
        }
    }
    total
}

/// Compute the bounded momentum value for `as_of` from a tally window.
///
/// A window with no counted events scores exactly 0.0 (the cold-start
/// contract) rather than the sigmoid midpoint. The as-of day is still in
/// progress, so its score is flagged provisional.
pub fn score(
    user_id: uuid::Uuid,
    tallies: &[DailyFeatureTally],
    as_of: NaiveDate,
    config: &EngineConfig,
    computed_at: DateTime<Utc>,
) -> EngineResult<MomentumScore> {
    config.validate()?;

    let observed: Vec<FeatureKind> = FeatureKind::ALL
        .into_iter()
        .filter(|f| tallies.iter().any(|t| t.date <= as_of && t.count(*f) > 0))
        .collect();
    config.require_weights(observed.iter())?;

    let value = if observed.is_empty() {
        0.0
    } else {
        let raw = raw_score(tallies, as_of, config);
        (sigmoid(raw / config.score_scale) * 100.0).clamp(0.0, 100.0)
    };

    Ok(MomentumScore {
        user_id,
        score_date: as_of,
        value,
        is_provisional: as_of == computed_at.date_naive(),
        computed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn day(date: &str) -> NaiveDate {
        date.parse().unwrap()
    }

    fn tally_with(date: NaiveDate, feature: FeatureKind, count: u32) -> DailyFeatureTally {
        let mut tally = DailyFeatureTally::empty(date);
        for _ in 0..count {
            tally.bump(feature);
        }
        tally
    }

    fn window(as_of: NaiveDate, days: i64) -> Vec<DailyFeatureTally> {
        (0..=days)
            .map(|offset| DailyFeatureTally::empty(as_of - Duration::days(days - offset)))
            .collect()
    }

    fn noon(date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
    }

    #[test]
    fn decay_halves_at_half_life() {
        assert!((decay_factor(0, 10.0) - 1.0).abs() < 1e-12);
        assert!((decay_factor(10, 10.0) - 0.5).abs() < 1e-12);
        assert!((decay_factor(20, 10.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn older_events_contribute_strictly_less() {
        let as_of = day("2026-08-30");
        let config = EngineConfig::default();
        let newer = raw_score(
            &[tally_with(as_of - Duration::days(1), FeatureKind::LessonCompletion, 1)],
            as_of,
            &config,
        );
        let older = raw_score(
            &[tally_with(as_of - Duration::days(9), FeatureKind::LessonCompletion, 1)],
            as_of,
            &config,
        );
        assert!(older < newer);
        assert!(older > 0.0);
    }

    #[test]
    fn cold_start_scores_exactly_zero() {
        let as_of = day("2026-08-30");
        let tallies = window(as_of, 30);
        let score = score(Uuid::new_v4(), &tallies, as_of, &EngineConfig::default(), noon(as_of))
            .unwrap();
        assert_eq!(score.value, 0.0);
        assert!(score.is_provisional);
    }

    #[test]
    fn worked_example_lands_in_rising_band() {
        // One lesson (+8) a day ago, one completed action step (+10) three
        // days ago, half-life 10, default scale.
        let as_of = day("2026-08-30");
        let mut tallies = window(as_of, 30);
        let len = tallies.len();
        tallies[len - 2] = tally_with(as_of - Duration::days(1), FeatureKind::LessonCompletion, 1);
        tallies[len - 4] = tally_with(as_of - Duration::days(3), FeatureKind::ActionStepSuccess, 1);

        let score = score(Uuid::new_v4(), &tallies, as_of, &EngineConfig::default(), noon(as_of))
            .unwrap();
        assert!(
            (70.0..=76.0).contains(&score.value),
            "expected the worked example in 70..=76, got {}",
            score.value
        );
    }

    #[test]
    fn scoring_is_deterministic() {
        let as_of = day("2026-08-30");
        let mut tallies = window(as_of, 30);
        let len = tallies.len();
        tallies[len - 1] = tally_with(as_of, FeatureKind::Session, 3);
        tallies[len - 6] = tally_with(as_of - Duration::days(5), FeatureKind::BiometricEntry, 2);

        let config = EngineConfig::default();
        let first = score(Uuid::new_v4(), &tallies, as_of, &config, noon(as_of)).unwrap();
        let second = score(Uuid::new_v4(), &tallies, as_of, &config, noon(as_of)).unwrap();
        assert!((first.value - second.value).abs() < 1e-9);
    }

    #[test]
    fn skip_heavy_window_stays_bounded_below_midpoint() {
        let as_of = day("2026-08-30");
        let tallies = vec![tally_with(as_of, FeatureKind::ActionStepSkip, 8)];
        let score = score(Uuid::new_v4(), &tallies, as_of, &EngineConfig::default(), noon(as_of))
            .unwrap();
        assert!(score.value < 50.0);
        assert!(score.value >= 0.0);
    }

    #[test]
    fn heavy_activity_saturates_below_cap() {
        let as_of = day("2026-08-30");
        let tallies = vec![tally_with(as_of, FeatureKind::ActionStepSuccess, 100)];
        let score = score(Uuid::new_v4(), &tallies, as_of, &EngineConfig::default(), noon(as_of))
            .unwrap();
        assert!(score.value <= 100.0);
        assert!(score.value > 99.0);
    }

    #[test]
    fn historical_score_is_not_provisional() {
        let as_of = day("2026-08-28");
        let tallies = vec![tally_with(as_of, FeatureKind::Session, 1)];
        let computed_at = noon(day("2026-08-30"));
        let score =
            score(Uuid::new_v4(), &tallies, as_of, &EngineConfig::default(), computed_at).unwrap();
        assert!(!score.is_provisional);
    }

    #[test]
    fn observed_feature_without_weight_is_a_config_error() {
        let as_of = day("2026-08-30");
        let tallies = vec![tally_with(as_of, FeatureKind::CoachInteraction, 1)];
        let mut config = EngineConfig::default();
        config.feature_weights.remove(&FeatureKind::CoachInteraction);
        let err = score(Uuid::new_v4(), &tallies, as_of, &config, noon(as_of)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }
}
