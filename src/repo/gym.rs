// Gym repository. The response payload keys gyms by id; the fold
// itself lives with the handler since it shapes the final payload.

use serde::Serialize;

use crate::db::{epoch_ms, Database, GymRow};
use crate::metrics;
use crate::query::{build_plan, DiffColumns, DiffRequest};

const COLS: DiffColumns = DiffColumns {
    modified: "last_modified",
    latitude: "latitude",
    longitude: "longitude",
};

const SELECT: &str =
    "SELECT gym_id, team_id, latitude, longitude, enabled, last_modified FROM gym";

#[derive(Debug, Clone, Serialize)]
pub struct Gym {
    pub gym_id: String,
    pub team_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub enabled: bool,
    pub last_modified: i64,
}

fn normalize(row: GymRow) -> Gym {
    Gym {
        gym_id: row.gym_id,
        team_id: row.team_id,
        latitude: row.latitude,
        longitude: row.longitude,
        enabled: row.enabled != 0,
        last_modified: epoch_ms(row.last_modified.as_deref()),
    }
}

pub async fn fetch(
    db: &Database,
    req: &DiffRequest,
    limit: i64,
) -> Result<Vec<Gym>, sqlx::Error> {
    let plan = build_plan(req, super::now_ms(), limit);
    let rows: Vec<GymRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched gyms");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["gyms"])
        .inc_by(rows.len() as u64);
    Ok(rows.into_iter().map(normalize).collect())
}
