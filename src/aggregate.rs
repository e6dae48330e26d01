use std::collections::HashSet;

use chrono::{Duration, NaiveDate};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{DailyFeatureTally, EngagementEvent};

/// Collapse a raw event list into one tally per UTC calendar day across
/// `[as_of - lookback_days, as_of]`, ascending, zero-filled.
///
/// The input may be unsorted and may repeat events (same id); duplicates are
/// counted once. Events outside the window are dropped silently: the event
/// log is append-only and upstream replays or late arrivals are expected,
/// not errors.
pub fn aggregate(
    events: &[EngagementEvent],
    as_of: NaiveDate,
    config: &EngineConfig,
) -> EngineResult<Vec<DailyFeatureTally>> {
    config.validate()?;

    let window_start = as_of - Duration::days(config.lookback_days);
    let mut tallies: Vec<DailyFeatureTally> = (0..=config.lookback_days)
        .map(|offset| DailyFeatureTally::empty(window_start + Duration::days(offset)))
        .collect();

    let mut seen = HashSet::new();
    for event in events {
        if !seen.insert(event.id) {
            continue;
        }
        let date = event.occurred_at.date_naive();
        if date < window_start || date > as_of {
            continue;
        }
        let index = (date - window_start).num_days() as usize;
        tallies[index].bump(event.feature());
    }

    Ok(tallies)
}
