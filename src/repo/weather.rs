// Weather cell repository.
//
// Weather cells are large relative to typical viewports, so the
// requested box is buffered outward before querying: a cell whose
// center sits just outside the viewport can still overlap it.

use serde::Serialize;

use crate::cell::CellId;
use crate::db::{epoch_ms, Database, WeatherRow};
use crate::metrics;
use crate::query::{build_plan, DiffColumns, DiffRequest};

/// Buffer margins, in degrees, matching the cell size at the grid's
/// subdivision level with slack for projection distortion.
const LAT_DELTA: f64 = 0.15;
const LNG_DELTA: f64 = 0.4;

const COLS: DiffColumns = DiffColumns {
    modified: "last_updated",
    latitude: "latitude",
    longitude: "longitude",
};

const SELECT: &str =
    "SELECT s2_cell_id, latitude, longitude, severity, last_updated FROM weather";

#[derive(Debug, Clone, Serialize)]
pub struct WeatherCell {
    pub s2_cell_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: i64,
    pub last_updated: i64,
    pub center: [f64; 2],
    pub vertices: [[f64; 2]; 4],
}

pub(crate) fn normalize(row: WeatherRow) -> WeatherCell {
    let cell = CellId::containing(row.latitude, row.longitude);
    WeatherCell {
        s2_cell_id: row.s2_cell_id,
        latitude: row.latitude,
        longitude: row.longitude,
        severity: row.severity,
        last_updated: epoch_ms(row.last_updated.as_deref()),
        center: cell.center(),
        vertices: cell.vertices(),
    }
}

pub async fn fetch(
    db: &Database,
    req: &DiffRequest,
    alerts_only: bool,
    limit: i64,
) -> Result<Vec<WeatherCell>, sqlx::Error> {
    let buffered = DiffRequest {
        viewport: req.viewport.map(|v| v.expand(LAT_DELTA, LNG_DELTA)),
        previous: req.previous.map(|v| v.expand(LAT_DELTA, LNG_DELTA)),
        last_sync_ms: req.last_sync_ms,
    };
    let mut plan = build_plan(&buffered, super::now_ms(), limit);
    if alerts_only {
        plan.and_raw("severity > 0", Vec::new());
    }
    let rows: Vec<WeatherRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched weather cells");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["weather"])
        .inc_by(rows.len() as u64);
    Ok(rows.into_iter().map(normalize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Viewport;

    async fn seeded_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let recent = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        sqlx::query(
            "INSERT INTO weather (s2_cell_id, latitude, longitude, severity, last_updated)
             VALUES (1, 10.5, 20.5, 0, ?1),
                    (2, 11.1, 21.0, 2, ?1),
                    (3, 40.0, 40.0, 1, ?1)",
        )
        .bind(&recent)
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
    async fn viewport_is_buffered_outward() {
        let db = seeded_db().await;
        // Cell 2 sits 0.1 degrees north of the viewport; the lat
        // buffer (0.15) must still include it. Cell 3 stays out.
        let cells = fetch(&db, &req(), false, 5000).await.unwrap();
        let ids: Vec<i64> = cells.iter().map(|c| c.s2_cell_id).collect();
        assert!(ids.contains(&1));
        assert!(ids.contains(&2));
        assert!(!ids.contains(&3));
    }

    #[tokio::test]
    async fn alerts_only_filters_severity_zero() {
        let db = seeded_db().await;
        let cells = fetch(&db, &req(), true, 5000).await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].s2_cell_id, 2);
        assert!(cells[0].severity > 0);
    }

    #[tokio::test]
    async fn rows_carry_derived_geometry() {
        let db = seeded_db().await;
        let cells = fetch(&db, &req(), false, 5000).await.unwrap();
        let cell = &cells[0];
        assert_eq!(
            CellId::containing(cell.center[0], cell.center[1]),
            CellId::containing(cell.latitude, cell.longitude)
        );
        assert!(cell.vertices[0][0] < cell.vertices[2][0]);
    }
}
