use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{InterventionTrigger, MomentumScore, MomentumState, TransitionEvent};

/// Result of walking a score series: the confirmed state as of the last day,
/// plus every confirmed transition and intervention trigger along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: MomentumState,
    pub confirmed_at: NaiveDate,
    pub transitions: Vec<TransitionEvent>,
    pub triggers: Vec<InterventionTrigger>,
}

/// Raw zone for a single day's value. Boundary values belong to the band
/// above them: 70.0 is Rising, 45.0 is Steady.
pub fn zone_for(value: f64) -> MomentumState {
    if value >= 70.0 {
        MomentumState::Rising
    } else if value >= 45.0 {
        MomentumState::Steady
    } else {
        MomentumState::NeedsCare
    }
}

/// A zone crossing only becomes a confirmed transition once the new band has
/// held for `hysteresis_days` consecutive days; errors when there is no
/// prior confirmed state to compare against.
fn confirm(
    confirmed: Option<MomentumState>,
    pending_run: usize,
    config: &EngineConfig,
) -> EngineResult<bool> {
    match confirmed {
        None => Err(EngineError::InsufficientHistory),
        Some(_) => Ok(pending_run >= config.hysteresis_days),
    }
}

/// Walk a user's score series in date order and derive the confirmed state,
/// transitions, and intervention triggers.
///
/// The raw zone tracks every day's value immediately; the confirmed state
/// lags behind by the hysteresis window so single-day wobbles across a
/// threshold do not flap. The decline fast path compares each day against
/// the best value in its trailing window and bypasses hysteresis entirely.
/// Every detector emits only when its condition becomes newly true, so one
/// episode produces one event no matter how long it lasts. The consecutive
/// confirmed-day rules only start counting once the series shows a score
/// above zero; an all-zero cold-start window emits nothing at all.
pub fn classify(
    user_id: Uuid,
    scores: &[MomentumScore],
    config: &EngineConfig,
) -> EngineResult<Classification> {
    config.validate()?;
    if scores.is_empty() {
        return Err(EngineError::InsufficientHistory);
    }

    let mut series: Vec<&MomentumScore> = scores.iter().collect();
    series.sort_by_key(|s| s.score_date);

    let mut confirmed: Option<MomentumState> = None;
    let mut confirmed_at = series[0].score_date;
    let mut pending: Option<(MomentumState, usize)> = None;

    let mut transitions = Vec::new();
    let mut triggers = Vec::new();

    let mut needs_care_run = 0usize;
    let mut positive_run = 0usize;
    let mut decline_active = false;
    let mut seen_activity = false;

    for (index, score) in series.iter().enumerate() {
        let zone = zone_for(score.value);
        let date = score.score_date;
        if score.value > 0.0 {
            seen_activity = true;
        }

        // Decline fast path, checked before the hysteresis walk so it fires
        // even while a zone change is still pending confirmation.
        let window_start = date - Duration::days(config.decline_window_days);
        let best_recent = series[..index]
            .iter()
            .filter(|prior| prior.score_date >= window_start)
            .map(|prior| prior.value)
            .fold(f64::NEG_INFINITY, f64::max);
        let drop = best_recent - score.value;
        let declining = best_recent.is_finite() && drop >= config.decline_threshold;
        let decline_started = declining && !decline_active;
        decline_active = declining;

        let mut transitioned = false;
        match confirmed {
            None => {
                // Very first data point: no prior state to debounce against,
                // so classify it immediately.
                confirmed = Some(zone);
                confirmed_at = date;
            }
            Some(current) if zone == current => {
                pending = None;
            }
            Some(current) => {
                let run = match pending {
                    Some((pending_zone, run)) if pending_zone == zone => run + 1,
                    _ => 1,
                };
                pending = Some((zone, run));
                if confirm(confirmed, run, config)? {
                    transitions.push(TransitionEvent {
                        user_id,
                        from_state: current,
                        to_state: zone,
                        is_recovery: current == MomentumState::NeedsCare
                            && zone != MomentumState::NeedsCare,
                        is_decline: decline_started,
                        detected_at: date,
                    });
                    confirmed = Some(zone);
                    confirmed_at = date;
                    pending = None;
                    transitioned = true;
                }
            }
        }

        if decline_started {
            triggers.push(InterventionTrigger::ScoreDrop {
                detected_at: date,
                drop,
            });
            if !transitioned {
                // No state change to hang the flag on; record the alert as a
                // same-state transition event.
                let state = confirmed.unwrap_or(zone);
                transitions.push(TransitionEvent {
                    user_id,
                    from_state: state,
                    to_state: state,
                    is_recovery: false,
                    is_decline: true,
                    detected_at: date,
                });
            }
        }

        // Consecutive confirmed-day counters for the escalation and
        // celebration rules. Days before the user has ever scored above
        // zero do not count: a brand-new user's empty window is not a
        // NeedsCare streak worth escalating.
        if !seen_activity {
            continue;
        }
        match confirmed {
            Some(MomentumState::NeedsCare) => {
                needs_care_run += 1;
                positive_run = 0;
                if needs_care_run == config.escalation_days {
                    triggers.push(InterventionTrigger::EscalateToCoach { detected_at: date });
                }
            }
            Some(_) => {
                positive_run += 1;
                needs_care_run = 0;
                if positive_run == config.celebration_days {
                    triggers.push(InterventionTrigger::Celebrate { detected_at: date });
                }
            }
            None => {}
        }
    }

    Ok(Classification {
        state: confirmed.expect("series is non-empty"),
        confirmed_at,
        transitions,
        triggers,
    })
}
