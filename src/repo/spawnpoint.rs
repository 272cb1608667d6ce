// Spawnpoint repository: joins each spawnpoint to its scanned cell's
// done flag and reduces the raw observation row to a reconstructed
// appear/disappear window.

use serde::Serialize;

use crate::db::{Database, SpawnpointRow};
use crate::metrics;
use crate::query::{build_plan, DiffColumns, DiffRequest};
use crate::spawn::{reconstruct, SpawnObservation};

const COLS: DiffColumns = DiffColumns {
    modified: "sp.last_scanned",
    latitude: "sp.latitude",
    longitude: "sp.longitude",
};

// Result column names are explicit: without AS, SQLite leaves the
// names of qualified columns unspecified and FromRow matches by name.
const SELECT: &str = "SELECT sp.id AS id, sp.latitude AS latitude, \
                      sp.longitude AS longitude, sp.earliest_unseen AS earliest_unseen, \
                      sp.latest_seen AS latest_seen, sp.links AS links, \
                      sp.last_scanned AS last_scanned, sl.done AS done \
                      FROM spawnpoint sp \
                      LEFT JOIN scanspawnpoint ssp ON ssp.spawnpoint_id = sp.id \
                      LEFT JOIN scannedlocation sl ON sl.cellid = ssp.scannedlocation_id";

#[derive(Debug, Clone, Serialize)]
pub struct Spawnpoint {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub appear_time: u32,
    pub disappear_time: u32,
    /// Present (true) only when the window is an estimate; clients
    /// treat the key's absence as a confirmed window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertain: Option<bool>,
}

fn normalize(row: SpawnpointRow, spawn_delay: i64) -> Spawnpoint {
    let obs = SpawnObservation {
        earliest_unseen: row.earliest_unseen,
        latest_seen: row.latest_seen,
        links: &row.links,
        done: row.done.unwrap_or(0) != 0,
    };
    let timer = reconstruct(&obs, spawn_delay, None);
    Spawnpoint {
        id: row.id,
        latitude: row.latitude,
        longitude: row.longitude,
        appear_time: timer.appear,
        disappear_time: timer.disappear,
        uncertain: timer.uncertain.then_some(true),
    }
}

pub async fn fetch(
    db: &Database,
    req: &DiffRequest,
    spawn_delay: i64,
    limit: i64,
) -> Result<Vec<Spawnpoint>, sqlx::Error> {
    let plan = build_plan(req, super::now_ms(), limit);
    let rows: Vec<SpawnpointRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched spawnpoints");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["spawnpoints"])
        .inc_by(rows.len() as u64);
    Ok(rows
        .into_iter()
        .map(|row| normalize(row, spawn_delay))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Viewport;

    async fn seeded_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let recent = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        sqlx::query(
            "INSERT INTO spawnpoint (id, latitude, longitude, earliest_unseen, latest_seen, links, last_scanned)
             VALUES ('sp1', 10.5, 20.5, 2700, 2700, '++++', ?1),
                    ('sp2', 10.6, 20.6, 900, 2700, '++++', ?1)",
        )
        .bind(&recent)
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO scannedlocation (cellid, latitude, longitude, done, last_modified)
             VALUES ('cell1', 10.5, 20.5, 1, ?1)",
        )
        .bind(&recent)
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO scanspawnpoint (spawnpoint_id, scannedlocation_id) VALUES ('sp1', 'cell1')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    fn req() -> DiffRequest {
        DiffRequest {
            viewport: Viewport::from_corners(Some(10.0), Some(20.0), Some(11.0), Some(21.0)),
            previous: None,
            last_sync_ms: None,
        }
    }

    #[tokio::test]
    async fn reconstructs_windows_per_row() {
        let db = seeded_db().await;
        let mut points = fetch(&db, &req(), 0, 50000).await.unwrap();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(points.len(), 2);

        // sp1: exact end, scanned cell done -> certain window.
        assert_eq!(points[0].appear_time, 2700);
        assert_eq!(points[0].disappear_time, 2700);
        assert_eq!(points[0].uncertain, None);

        // sp2: estimated end and no scanned cell -> uncertain.
        assert_eq!(points[1].appear_time, 900);
        assert_eq!(points[1].disappear_time, 2760);
        assert_eq!(points[1].uncertain, Some(true));
    }

    #[tokio::test]
    async fn missing_join_row_defaults_done_false() {
        let db = seeded_db().await;
        let points = fetch(&db, &req(), 0, 50000).await.unwrap();
        let sp2 = points.iter().find(|p| p.id == "sp2").unwrap();
        assert_eq!(sp2.uncertain, Some(true));
    }
}
