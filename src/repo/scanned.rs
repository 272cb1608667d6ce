// Scanned-location (scan cell) repository.

use serde::Serialize;

use crate::db::{epoch_ms, Database, ScannedLocationRow};
use crate::metrics;
use crate::query::{build_plan, DiffColumns, DiffRequest};

const COLS: DiffColumns = DiffColumns {
    modified: "last_modified",
    latitude: "latitude",
    longitude: "longitude",
};

const SELECT: &str =
    "SELECT cellid, latitude, longitude, done, last_modified FROM scannedlocation";

#[derive(Debug, Clone, Serialize)]
pub struct ScannedLocation {
    pub cellid: String,
    pub latitude: f64,
    pub longitude: f64,
    pub done: bool,
    pub last_modified: i64,
}

fn normalize(row: ScannedLocationRow) -> ScannedLocation {
    ScannedLocation {
        cellid: row.cellid,
        latitude: row.latitude,
        longitude: row.longitude,
        done: row.done != 0,
        last_modified: epoch_ms(row.last_modified.as_deref()),
    }
}

pub async fn fetch(
    db: &Database,
    req: &DiffRequest,
    limit: i64,
) -> Result<Vec<ScannedLocation>, sqlx::Error> {
    let plan = build_plan(req, super::now_ms(), limit);
    let rows: Vec<ScannedLocationRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched scanned locations");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["scanned"])
        .inc_by(rows.len() as u64);
    Ok(rows.into_iter().map(normalize).collect())
}
