use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::engine::Evaluation;
use crate::models::{DailyFeatureTally, FeatureKind, InterventionTrigger};

/// Total events per scoring dimension across the window, busiest first.
pub fn summarize_activity(tallies: &[DailyFeatureTally]) -> Vec<(FeatureKind, u32)> {
    let mut totals: Vec<(FeatureKind, u32)> = FeatureKind::ALL
        .into_iter()
        .map(|feature| {
            (
                feature,
                tallies.iter().map(|t| t.count(feature)).sum::<u32>(),
            )
        })
        .filter(|(_, count)| *count > 0)
        .collect();

    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals
}

fn trend_arrow(delta: f64) -> &'static str {
    if delta > 1.0 {
        "up"
    } else if delta < -1.0 {
        "down"
    } else {
        "flat"
    }
}

pub fn build_report(user_id: Uuid, as_of: NaiveDate, evaluation: &Evaluation) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Momentum Report");
    let _ = writeln!(output, "User {} as of {}", user_id, as_of);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Current Momentum");
    let provisional = if evaluation.latest.is_provisional {
        " (provisional, day in progress)"
    } else {
        ""
    };
    let _ = writeln!(
        output,
        "Score {:.1} / 100 - {}{}",
        evaluation.latest.value, evaluation.classification.state, provisional
    );
    let _ = writeln!(
        output,
        "State confirmed since {}",
        evaluation.classification.confirmed_at
    );

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Weekly Trend ({})",
        trend_arrow(evaluation.weekly_trend.delta())
    );
    for point in &evaluation.weekly_trend.points {
        let _ = writeln!(
            output,
            "- {}: {:.1} ({})",
            point.date, point.value, point.state
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Confirmed Transitions");
    if evaluation.classification.transitions.is_empty() {
        let _ = writeln!(output, "No confirmed state changes in this window.");
    } else {
        for transition in &evaluation.classification.transitions {
            let mut tags = Vec::new();
            if transition.is_recovery {
                tags.push("recovery");
            }
            if transition.is_decline {
                tags.push("decline");
            }
            let suffix = if tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tags.join(", "))
            };
            let _ = writeln!(
                output,
                "- {}: {} -> {}{}",
                transition.detected_at, transition.from_state, transition.to_state, suffix
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Intervention Triggers");
    if evaluation.classification.triggers.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for trigger in &evaluation.classification.triggers {
            match trigger {
                InterventionTrigger::ScoreDrop { detected_at, drop } => {
                    let _ = writeln!(
                        output,
                        "- {}: score dropped {:.1} points, send a supportive check-in",
                        detected_at, drop
                    );
                }
                InterventionTrigger::EscalateToCoach { detected_at } => {
                    let _ = writeln!(
                        output,
                        "- {}: consecutive NeedsCare days, escalate to coach",
                        detected_at
                    );
                }
                InterventionTrigger::Celebrate { detected_at } => {
                    let _ = writeln!(
                        output,
                        "- {}: sustained positive momentum, celebrate",
                        detected_at
                    );
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Mix");
    let totals = summarize_activity(&evaluation.tallies);
    if totals.is_empty() {
        let _ = writeln!(output, "No engagement events recorded in this window.");
    } else {
        for (feature, count) in totals {
            let _ = writeln!(output, "- {}: {}", feature.label(), count);
        }
    }

    output
}
