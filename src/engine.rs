use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::aggregate;
use crate::classify::{self, Classification};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{DailyFeatureTally, EngagementEvent, MomentumScore, TrendPoint, WeeklyTrend};
use crate::scorer;

/// Everything one scoring run produces for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Per-day tallies across the lookback window.
    pub tallies: Vec<DailyFeatureTally>,
    /// One score per day in the window, ascending by date.
    pub scores: Vec<MomentumScore>,
    /// The as-of day's score (last element of `scores`).
    pub latest: MomentumScore,
    pub classification: Classification,
    pub weekly_trend: WeeklyTrend,
}

/// Run the full pipeline for one user: aggregate the event log into daily
/// tallies, score every day in the window, then classify the series.
///
/// Pure and idempotent: the same `(events, as_of, config, computed_at)`
/// always yields the same evaluation, so retries after a failed persist are
/// safe. Each historical day is scored against the events visible up to that
/// day with decay measured from that day; days near the start of the window
/// see a truncated history, which is the same policy that already drops
/// late-arriving data.
pub fn evaluate(
    user_id: Uuid,
    events: &[EngagementEvent],
    as_of: NaiveDate,
    config: &EngineConfig,
    computed_at: DateTime<Utc>,
) -> EngineResult<Evaluation> {
    let tallies = aggregate::aggregate(events, as_of, config)?;

    let mut scores = Vec::with_capacity(tallies.len());
    for tally in &tallies {
        scores.push(scorer::score(
            user_id,
            &tallies,
            tally.date,
            config,
            computed_at,
        )?);
    }

    let classification = classify::classify(user_id, &scores, config)?;

    let trail = scores.len().saturating_sub(7);
    let weekly_trend = WeeklyTrend {
        points: scores[trail..]
            .iter()
            .map(|score| TrendPoint {
                date: score.score_date,
                value: score.value,
                state: classify::zone_for(score.value),
            })
            .collect(),
    };

    let latest = scores.last().expect("window is never empty").clone();

    Ok(Evaluation {
        tallies,
        scores,
        latest,
        classification,
        weekly_trend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventDetail, EventType, MomentumState};
    use chrono::{Duration, TimeZone};

    fn day(date: &str) -> NaiveDate {
        date.parse().unwrap()
    }

    fn noon(date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
    }

    fn event(
        user_id: Uuid,
        event_type: EventType,
        date: NaiveDate,
        metadata: serde_json::Value,
    ) -> EngagementEvent {
        EngagementEvent {
            id: Uuid::new_v4(),
            user_id,
            event_type,
            occurred_at: Utc.from_utc_datetime(&date.and_hms_opt(9, 30, 0).unwrap()),
            detail: EventDetail::from_metadata(event_type, &metadata),
        }
    }

    #[test]
    fn cold_start_user_scores_zero_needs_care_no_transitions() {
        let user = Uuid::new_v4();
        let as_of = day("2026-08-30");
        let result = evaluate(user, &[], as_of, &EngineConfig::default(), noon(as_of)).unwrap();

        assert_eq!(result.latest.value, 0.0);
        assert_eq!(result.classification.state, MomentumState::NeedsCare);
        assert!(result.classification.transitions.is_empty());
        assert!(
            result.classification.triggers.is_empty(),
            "zero-history user must not trigger interventions, got {:?}",
            result.classification.triggers
        );
        assert!(result.latest.is_provisional);
    }

    #[test]
    fn worked_example_is_rising() {
        let user = Uuid::new_v4();
        let as_of = day("2026-08-30");
        let events = vec![
            event(
                user,
                EventType::LessonComplete,
                as_of - Duration::days(1),
                serde_json::json!({}),
            ),
            event(
                user,
                EventType::ActionStepLogged,
                as_of - Duration::days(3),
                serde_json::json!({ "status": "completed" }),
            ),
        ];

        let result =
            evaluate(user, &events, as_of, &EngineConfig::default(), noon(as_of)).unwrap();
        assert!((70.0..=76.0).contains(&result.latest.value));
        assert_eq!(result.classification.state, MomentumState::Rising);
    }

    #[test]
    fn pipeline_is_deterministic_end_to_end() {
        let user = Uuid::new_v4();
        let as_of = day("2026-08-30");
        let computed_at = noon(as_of);
        let events: Vec<EngagementEvent> = (0..10)
            .map(|offset| {
                event(
                    user,
                    EventType::SessionStart,
                    as_of - Duration::days(offset * 2),
                    serde_json::json!({ "duration_minutes": 5 }),
                )
            })
            .collect();

        let config = EngineConfig::default();
        let first = evaluate(user, &events, as_of, &config, computed_at).unwrap();
        let second = evaluate(user, &events, as_of, &config, computed_at).unwrap();

        assert!((first.latest.value - second.latest.value).abs() < 1e-9);
        assert_eq!(first.classification, second.classification);
        assert_eq!(first.scores, second.scores);
    }

    #[test]
    fn window_and_trend_have_expected_shape() {
        let user = Uuid::new_v4();
        let as_of = day("2026-08-30");
        let result = evaluate(user, &[], as_of, &EngineConfig::default(), noon(as_of)).unwrap();

        assert_eq!(result.scores.len(), 31);
        assert_eq!(result.weekly_trend.points.len(), 7);
        assert_eq!(result.weekly_trend.points.last().unwrap().date, as_of);
        assert_eq!(result.weekly_trend.points.first().unwrap().date, as_of - Duration::days(6));
    }

    #[test]
    fn only_the_as_of_day_is_provisional() {
        let user = Uuid::new_v4();
        let as_of = day("2026-08-30");
        let result = evaluate(user, &[], as_of, &EngineConfig::default(), noon(as_of)).unwrap();

        let provisional: Vec<_> =
            result.scores.iter().filter(|s| s.is_provisional).collect();
        assert_eq!(provisional.len(), 1);
        assert_eq!(provisional[0].score_date, as_of);
    }

    #[test]
    fn sustained_activity_builds_momentum_over_the_series() {
        let user = Uuid::new_v4();
        let as_of = day("2026-08-30");
        let mut events = Vec::new();
        for offset in 0..7 {
            let date = as_of - Duration::days(offset);
            events.push(event(user, EventType::LessonComplete, date, serde_json::json!({})));
            events.push(event(
                user,
                EventType::ActionStepLogged,
                date,
                serde_json::json!({ "status": "completed" }),
            ));
        }

        let result =
            evaluate(user, &events, as_of, &EngineConfig::default(), noon(as_of)).unwrap();
        let week_ago = &result.scores[result.scores.len() - 8];
        assert!(result.latest.value > week_ago.value);
        assert_eq!(result.classification.state, MomentumState::Rising);
        assert!(result.weekly_trend.delta() > 0.0);
    }
}
