// Point-of-interest (pokéstop) repository.

use serde::Serialize;

use crate::db::{epoch_ms, Database, PokestopRow};
use crate::metrics;
use crate::query::{build_plan, DiffColumns, DiffRequest};

const COLS: DiffColumns = DiffColumns {
    modified: "last_updated",
    latitude: "latitude",
    longitude: "longitude",
};

const SELECT: &str = "SELECT pokestop_id, latitude, longitude, lure_expiration, \
                      last_updated FROM pokestop";

#[derive(Debug, Clone, Serialize)]
pub struct Pokestop {
    pub pokestop_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lure_expiration: Option<i64>,
    pub last_updated: i64,
}

fn normalize(row: PokestopRow) -> Pokestop {
    Pokestop {
        pokestop_id: row.pokestop_id,
        latitude: row.latitude,
        longitude: row.longitude,
        lure_expiration: row
            .lure_expiration
            .as_deref()
            .map(|ts| epoch_ms(Some(ts))),
        last_updated: epoch_ms(row.last_updated.as_deref()),
    }
}

pub async fn fetch(
    db: &Database,
    req: &DiffRequest,
    lured_only: bool,
    limit: i64,
) -> Result<Vec<Pokestop>, sqlx::Error> {
    let mut plan = build_plan(req, super::now_ms(), limit);
    if lured_only {
        plan.and_raw("lure_expiration IS NOT NULL", Vec::new());
    }
    let rows: Vec<PokestopRow> = db.fetch_rows(SELECT, &COLS, &plan).await?;
    tracing::debug!(count = rows.len(), "Fetched pokestops");
    metrics::ROWS_FETCHED_TOTAL
        .with_label_values(&["pokestops"])
        .inc_by(rows.len() as u64);
    Ok(rows.into_iter().map(normalize).collect())
}
