use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{EngagementEvent, EventDetail, EventType, MomentumScore, TransitionEvent};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let users = vec![
        Uuid::parse_str("8f1c2a74-5d0e-4f3b-9a6c-2b917e4d30aa")?,
        Uuid::parse_str("41be7a55-90c3-4e2f-b8d1-6f2a0c85d9e3")?,
        Uuid::parse_str("c9e04d18-7b6a-42f5-a3c8-50d1e92f47bb")?,
    ];

    let events = vec![
        ("seed-001", users[0], "lesson_complete", "2026-08-28T14:00:00Z", serde_json::json!({"lesson_id": "sleep-hygiene-101"})),
        ("seed-002", users[0], "action_step_logged", "2026-08-27T08:30:00Z", serde_json::json!({"status": "completed"})),
        ("seed-003", users[0], "session_start", "2026-08-29T07:15:00Z", serde_json::json!({"duration_minutes": 12})),
        ("seed-004", users[1], "action_step_logged", "2026-08-26T19:00:00Z", serde_json::json!({"status": "skipped"})),
        ("seed-005", users[1], "biometric_entry", "2026-08-28T06:45:00Z", serde_json::json!({"kind": "weight"})),
        ("seed-006", users[2], "coach_interaction", "2026-08-25T16:20:00Z", serde_json::json!({"coach_id": "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2"})),
        ("seed-007", users[2], "session_start", "2026-08-29T21:05:00Z", serde_json::json!({"duration_minutes": 4})),
    ];

    for (source_key, user_id, event_type, occurred_at, metadata) in events {
        let occurred_at: DateTime<Utc> = occurred_at
            .parse()
            .context("invalid seed timestamp")?;
        sqlx::query(
            r#"
            INSERT INTO momentum.engagement_events
            (id, user_id, event_type, occurred_at, metadata, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_type)
        .bind(occurred_at)
        .bind(metadata)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_events(
    pool: &PgPool,
    user_id: Uuid,
    since: NaiveDate,
) -> anyhow::Result<Vec<EngagementEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, event_type, occurred_at, metadata
        FROM momentum.engagement_events
        WHERE user_id = $1 AND occurred_at >= $2::date
        ORDER BY occurred_at
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut events = Vec::new();
    for row in rows {
        let type_text: String = row.get("event_type");
        // Unknown event kinds from newer app builds are skipped, not fatal.
        let Some(event_type) = EventType::parse(&type_text) else {
            continue;
        };
        let metadata: serde_json::Value = row.get("metadata");
        events.push(EngagementEvent {
            id: row.get("id"),
            user_id: row.get("user_id"),
            event_type,
            occurred_at: row.get("occurred_at"),
            detail: EventDetail::from_metadata(event_type, &metadata),
        });
    }

    Ok(events)
}

/// Users with any event since the cutoff; the scoring run iterates these.
pub async fn active_user_ids(pool: &PgPool, since: NaiveDate) -> anyhow::Result<Vec<Uuid>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT user_id
        FROM momentum.engagement_events
        WHERE occurred_at >= $1::date
        ORDER BY user_id
        "#,
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("user_id")).collect())
}

/// Idempotent write; recomputing the current (still partial) day overwrites
/// the earlier provisional row.
pub async fn upsert_score(
    pool: &PgPool,
    score: &MomentumScore,
    state: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO momentum.momentum_scores
        (user_id, score_date, value, is_provisional, momentum_state, computed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, score_date) DO UPDATE
        SET value = EXCLUDED.value,
            is_provisional = EXCLUDED.is_provisional,
            momentum_state = EXCLUDED.momentum_state,
            computed_at = EXCLUDED.computed_at
        "#,
    )
    .bind(score.user_id)
    .bind(score.score_date)
    .bind(score.value)
    .bind(score.is_provisional)
    .bind(state)
    .bind(score.computed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append transitions; replays of the same window are deduplicated by the
/// table's uniqueness constraint.
pub async fn insert_transitions(
    pool: &PgPool,
    transitions: &[TransitionEvent],
) -> anyhow::Result<usize> {
    let mut inserted = 0usize;
    for transition in transitions {
        let result = sqlx::query(
            r#"
            INSERT INTO momentum.momentum_transitions
            (id, user_id, from_state, to_state, is_recovery, is_decline, detected_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id, detected_at, from_state, to_state, is_decline) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transition.user_id)
        .bind(transition.from_state.as_str())
        .bind(transition.to_state.as_str())
        .bind(transition.is_recovery)
        .bind(transition.is_decline)
        .bind(transition.detected_at)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        user_id: Uuid,
        event_type: String,
        occurred_at: DateTime<Utc>,
        metadata: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        if EventType::parse(&row.event_type).is_none() {
            anyhow::bail!("unknown event_type '{}' in {}", row.event_type, csv_path.display());
        }

        let metadata: serde_json::Value = match row.metadata.as_deref() {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(text)
                .with_context(|| format!("invalid metadata JSON for {}", row.user_id))?,
            _ => serde_json::json!({}),
        };

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO momentum.engagement_events
            (id, user_id, event_type, occurred_at, metadata, source_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.user_id)
        .bind(&row.event_type)
        .bind(row.occurred_at)
        .bind(metadata)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
