use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw engagement event kinds, as recorded by app instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    LessonComplete,
    ActionStepLogged,
    BiometricEntry,
    CoachInteraction,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStart => "session_start",
            EventType::LessonComplete => "lesson_complete",
            EventType::ActionStepLogged => "action_step_logged",
            EventType::BiometricEntry => "biometric_entry",
            EventType::CoachInteraction => "coach_interaction",
        }
    }

    pub fn parse(value: &str) -> Option<EventType> {
        match value {
            "session_start" => Some(EventType::SessionStart),
            "lesson_complete" => Some(EventType::LessonComplete),
            "action_step_logged" => Some(EventType::ActionStepLogged),
            "biometric_entry" => Some(EventType::BiometricEntry),
            "coach_interaction" => Some(EventType::CoachInteraction),
            _ => None,
        }
    }
}

/// Whether a logged action step was completed or skipped. Skips carry a
/// negative scoring weight, so the distinction matters to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStepStatus {
    Completed,
    Skipped,
}

/// Typed view of the event metadata blob, keyed by event type. Each variant
/// carries only what scoring needs; everything else in the upstream JSON is
/// ignored rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetail {
    Session { duration_minutes: Option<u32> },
    Lesson { lesson_id: Option<String> },
    ActionStep { status: ActionStepStatus },
    Biometric { kind: Option<String> },
    Coach { coach_id: Option<Uuid> },
}

impl EventDetail {
    /// Lenient parse of the upstream metadata map. Missing or malformed
    /// fields fall back to defaults; an action step with no recognizable
    /// status counts as completed, matching upstream logging that only
    /// annotates skips.
    pub fn from_metadata(event_type: EventType, metadata: &serde_json::Value) -> EventDetail {
        match event_type {
            EventType::SessionStart => EventDetail::Session {
                duration_minutes: metadata
                    .get("duration_minutes")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
            },
            EventType::LessonComplete => EventDetail::Lesson {
                lesson_id: metadata
                    .get("lesson_id")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned),
            },
            EventType::ActionStepLogged => {
                let skipped = metadata
                    .get("status")
                    .and_then(|v| v.as_str())
                    .map(|s| s.eq_ignore_ascii_case("skipped"))
                    .unwrap_or(false);
                EventDetail::ActionStep {
                    status: if skipped {
                        ActionStepStatus::Skipped
                    } else {
                        ActionStepStatus::Completed
                    },
                }
            }
            EventType::BiometricEntry => EventDetail::Biometric {
                kind: metadata
                    .get("kind")
                    .and_then(|v| v.as_str())
                    .map(str::to_owned),
            },
            EventType::CoachInteraction => EventDetail::Coach {
                coach_id: metadata
                    .get("coach_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| Uuid::parse_str(s).ok()),
            },
        }
    }
}

/// One immutable engagement fact from the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: EventType,
    pub occurred_at: DateTime<Utc>,
    pub detail: EventDetail,
}

impl EngagementEvent {
    /// The scoring dimension this event counts toward.
    pub fn feature(&self) -> FeatureKind {
        match (&self.event_type, &self.detail) {
            (EventType::ActionStepLogged, EventDetail::ActionStep { status }) => match status {
                ActionStepStatus::Completed => FeatureKind::ActionStepSuccess,
                ActionStepStatus::Skipped => FeatureKind::ActionStepSkip,
            },
            (EventType::SessionStart, _) => FeatureKind::Session,
            (EventType::LessonComplete, _) => FeatureKind::LessonCompletion,
            (EventType::ActionStepLogged, _) => FeatureKind::ActionStepSuccess,
            (EventType::BiometricEntry, _) => FeatureKind::BiometricEntry,
            (EventType::CoachInteraction, _) => FeatureKind::CoachInteraction,
        }
    }
}

/// Scoring dimensions. Action steps split into success/skip because the two
/// carry opposite-signed weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Session,
    LessonCompletion,
    ActionStepSuccess,
    ActionStepSkip,
    BiometricEntry,
    CoachInteraction,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 6] = [
        FeatureKind::Session,
        FeatureKind::LessonCompletion,
        FeatureKind::ActionStepSuccess,
        FeatureKind::ActionStepSkip,
        FeatureKind::BiometricEntry,
        FeatureKind::CoachInteraction,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FeatureKind::Session => "sessions",
            FeatureKind::LessonCompletion => "lessons completed",
            FeatureKind::ActionStepSuccess => "action steps completed",
            FeatureKind::ActionStepSkip => "action steps skipped",
            FeatureKind::BiometricEntry => "biometric entries",
            FeatureKind::CoachInteraction => "coach interactions",
        }
    }
}

/// Per-day event counts for one user. A day with no events is an all-zero
/// tally, not an absent row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyFeatureTally {
    pub date: NaiveDate,
    pub sessions: u32,
    pub lesson_completions: u32,
    pub action_step_successes: u32,
    pub action_step_skips: u32,
    pub biometric_entries: u32,
    pub coach_interactions: u32,
}

impl DailyFeatureTally {
    pub fn empty(date: NaiveDate) -> DailyFeatureTally {
        DailyFeatureTally {
            date,
            sessions: 0,
            lesson_completions: 0,
            action_step_successes: 0,
            action_step_skips: 0,
            biometric_entries: 0,
            coach_interactions: 0,
        }
    }

    pub fn count(&self, feature: FeatureKind) -> u32 {
        match feature {
            FeatureKind::Session => self.sessions,
            FeatureKind::LessonCompletion => self.lesson_completions,
            FeatureKind::ActionStepSuccess => self.action_step_successes,
            FeatureKind::ActionStepSkip => self.action_step_skips,
            FeatureKind::BiometricEntry => self.biometric_entries,
            FeatureKind::CoachInteraction => self.coach_interactions,
        }
    }

    pub fn bump(&mut self, feature: FeatureKind) {
        match feature {
            FeatureKind::Session => self.sessions += 1,
            FeatureKind::LessonCompletion => self.lesson_completions += 1,
            FeatureKind::ActionStepSuccess => self.action_step_successes += 1,
            FeatureKind::ActionStepSkip => self.action_step_skips += 1,
            FeatureKind::BiometricEntry => self.biometric_entries += 1,
            FeatureKind::CoachInteraction => self.coach_interactions += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        FeatureKind::ALL.iter().all(|f| self.count(*f) == 0)
    }

    pub fn total_events(&self) -> u32 {
        FeatureKind::ALL.iter().map(|f| self.count(*f)).sum()
    }
}

/// Bounded [0, 100] momentum value for one user on one day. The score for
/// the as-of day is provisional: it will change as more events arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumScore {
    pub user_id: Uuid,
    pub score_date: NaiveDate,
    pub value: f64,
    pub is_provisional: bool,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumState {
    Rising,
    Steady,
    NeedsCare,
}

impl MomentumState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentumState::Rising => "Rising",
            MomentumState::Steady => "Steady",
            MomentumState::NeedsCare => "NeedsCare",
        }
    }
}

impl std::fmt::Display for MomentumState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed state change, or a decline alert when `from_state ==
/// to_state` and `is_decline` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub user_id: Uuid,
    pub from_state: MomentumState,
    pub to_state: MomentumState,
    pub is_recovery: bool,
    pub is_decline: bool,
    pub detected_at: NaiveDate,
}

/// Intervention hooks for external consumers (notifications, coach
/// dashboard). The engine detects; delivery is someone else's job.
#[derive(Debug, Clone, PartialEq)]
pub enum InterventionTrigger {
    /// Score fell by at least the configured threshold within the trailing
    /// decline window. Fast path, not subject to hysteresis.
    ScoreDrop { detected_at: NaiveDate, drop: f64 },
    /// Two consecutive confirmed NeedsCare days.
    EscalateToCoach { detected_at: NaiveDate },
    /// Five consecutive confirmed Rising/Steady days.
    Celebrate { detected_at: NaiveDate },
}

/// One display point of the weekly trend.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub state: MomentumState,
}

/// Last seven computed days, most recent last. Display-only; derived from
/// the score series, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeeklyTrend {
    pub points: Vec<TrendPoint>,
}

impl WeeklyTrend {
    /// Net change across the window, for the trend arrow.
    pub fn delta(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.value - first.value,
            _ => 0.0,
        }
    }
}
