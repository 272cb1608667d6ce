// Creature sighting repository.

use serde::Serialize;

use crate::db::{epoch_ms, Database, PokemonRow};
use crate::metrics;
use crate::query::{build_plan, in_clause, viewport_plan, DiffColumns, DiffRequest};
use crate::viewport::Viewport;

const COLS: DiffColumns = DiffColumns {
    modified: "last_modified",
    latitude: "latitude",
    longitude: "longitude",
};

const SELECT: &str = "SELECT encounter_id, pokemon_id, latitude, longitude, \
                      disappear_time, last_modified FROM pokemon";

#[derive(Debug, Clone, Serialize)]
pub struct Pokemon {
    pub encounter_id: String,
    pub pokemon_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub disappear_time: i64,
    pub last_modified: i64,
}

fn normalize(row: PokemonRow) -> Pokemon {
    Pokemon {
        encounter_id: row.encounter_id,
        pokemon_id: row.pokemon_id,
        latitude: row.latitude,
        longitude: row.longitude,
        disappear_time: epoch_ms(row.disappear_time.as_deref()),
        last_modified: epoch_ms(row.last_modified.as_deref()),
    }
}

/// Diff fetch with an optional species blacklist layered on top.
pub async fn fetch(
    db: &Database,
    req: &DiffRequest,
    excluded: &[i64],
    limit: i64,
) -> Result<Vec<Pokemon>, sqlx::Error> {
    let mut plan = build_plan(req, super::now_ms(), limit);
    if !excluded.is_empty() {
        let (sql, binds) = in_clause("pokemon_id", excluded, true);
        plan.and_raw(sql, binds);
    }
    let rows: Vec<PokemonRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched pokemon");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["pokemon"])
        .inc_by(rows.len() as u64);
    Ok(rows.into_iter().map(normalize).collect())
}

/// Whitelist fetch: the client asked for specific species, so diff
/// modes do not apply and the full matching set is resent every time.
pub async fn fetch_by_ids(
    db: &Database,
    ids: &[i64],
    excluded: &[i64],
    viewport: Option<Viewport>,
    limit: i64,
) -> Result<Vec<Pokemon>, sqlx::Error> {
    let mut plan = viewport_plan(viewport, limit);
    let (sql, binds) = in_clause("pokemon_id", ids, false);
    plan.and_raw(sql, binds);
    if !excluded.is_empty() {
        let (sql, binds) = in_clause("pokemon_id", excluded, true);
        plan.and_raw(sql, binds);
    }
    let rows: Vec<PokemonRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched pokemon by id whitelist");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["pokemon"])
        .inc_by(rows.len() as u64);
    Ok(rows.into_iter().map(normalize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let recent = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        sqlx::query(
            "INSERT INTO pokemon (encounter_id, pokemon_id, latitude, longitude, disappear_time, last_modified)
             VALUES ('e1', 25, 10.5, 20.5, ?1, ?1),
                    ('e2', 16, 10.6, 20.6, ?1, ?1),
                    ('e3', 25, 10.7, 20.7, ?1, '2000-01-01 00:00:00')",
        )
        .bind(&recent)
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    fn viewport() -> Option<Viewport> {
        Viewport::from_corners(Some(10.0), Some(20.0), Some(11.0), Some(21.0))
    }

    #[tokio::test]
    async fn cold_start_returns_recent_rows_normalized() {
        let db = seeded_db().await;
        let req = DiffRequest {
            viewport: viewport(),
            previous: None,
            last_sync_ms: None,
        };
        let rows = fetch(&db, &req, &[], 50000).await.unwrap();
        // e3 was last modified far outside the recency window.
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|p| p.last_modified > 0));
    }

    #[tokio::test]
    async fn blacklist_excludes_species() {
        let db = seeded_db().await;
        let req = DiffRequest {
            viewport: viewport(),
            previous: None,
            last_sync_ms: None,
        };
        let rows = fetch(&db, &req, &[25], 50000).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pokemon_id, 16);
    }

    #[tokio::test]
    async fn whitelist_ignores_recency() {
        let db = seeded_db().await;
        // e3 is stale but matches the whitelist, so it is returned.
        let rows = fetch_by_ids(&db, &[25], &[], viewport(), 50000)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|p| p.pokemon_id == 25));
    }
}
