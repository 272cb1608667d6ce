// Database access layer (SQLite via sqlx).
//
// Table and column names mirror the backing store's existing schema;
// they are an external data contract shared with the scanner that
// writes these rows. This service never mutates them.

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::FromRow;

use crate::query::{BindValue, DiffColumns, QueryPlan};

#[derive(Debug, Clone, FromRow)]
pub struct PokemonRow {
    pub encounter_id: String,
    pub pokemon_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub disappear_time: Option<String>,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PokestopRow {
    pub pokestop_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub lure_expiration: Option<String>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GymRow {
    pub gym_id: String,
    pub team_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub enabled: i64,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WeatherRow {
    pub s2_cell_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: i64,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScannedLocationRow {
    pub cellid: String,
    pub latitude: f64,
    pub longitude: f64,
    pub done: i64,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SpawnpointRow {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub earliest_unseen: i64,
    pub latest_seen: i64,
    pub links: String,
    pub last_scanned: Option<String>,
    /// From the scanned-cell join; NULL when the spawnpoint has no
    /// scanned cell yet.
    pub done: Option<i64>,
}

/// Normalize a stored naive-UTC `"YYYY-MM-DD HH:MM:SS"` timestamp to a
/// UTC epoch millisecond. NULL and unparseable values normalize to 0;
/// ambiguous local-time strings must never leak to callers.
pub fn epoch_ms(ts: Option<&str>) -> i64 {
    ts.and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // An in-memory database exists per connection, so it must be
        // pinned to a single one that never gets reaped.
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pokemon (
                encounter_id TEXT PRIMARY KEY,
                pokemon_id INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                disappear_time TEXT,
                last_modified TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pokestop (
                pokestop_id TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                lure_expiration TEXT,
                last_updated TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gym (
                gym_id TEXT PRIMARY KEY,
                team_id INTEGER NOT NULL DEFAULT 0,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                last_modified TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS weather (
                s2_cell_id INTEGER PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                severity INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scannedlocation (
                cellid TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                done INTEGER NOT NULL DEFAULT 0,
                last_modified TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spawnpoint (
                id TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                earliest_unseen INTEGER NOT NULL DEFAULT 0,
                latest_seen INTEGER NOT NULL DEFAULT 0,
                links TEXT NOT NULL DEFAULT '????',
                last_scanned TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scanspawnpoint (
                spawnpoint_id TEXT NOT NULL,
                scannedlocation_id TEXT NOT NULL,
                PRIMARY KEY (spawnpoint_id, scannedlocation_id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Run a SELECT with a rendered query plan appended, binding the
    /// plan's values in placeholder order.
    pub async fn fetch_rows<T>(
        &self,
        select: &str,
        cols: &DiffColumns,
        plan: &QueryPlan,
    ) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let (suffix, binds) = plan.render(cols);
        let sql = format!("{select}{suffix}");
        let mut query = sqlx::query_as::<_, T>(&sql);
        for bind in binds {
            query = match bind {
                BindValue::Int(v) => query.bind(v),
                BindValue::Float(v) => query.bind(v),
            };
        }
        query.fetch_all(&self.pool).await
    }

    /// All weather rows, for the cache's wholesale rebuild.
    pub async fn all_weather_rows(&self) -> Result<Vec<WeatherRow>, sqlx::Error> {
        sqlx::query_as::<_, WeatherRow>(
            "SELECT s2_cell_id, latitude, longitude, severity, last_updated FROM weather",
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{build_plan, DiffRequest};
    use crate::viewport::Viewport;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn epoch_ms_parses_naive_utc() {
        assert_eq!(epoch_ms(Some("1970-01-01 00:00:01")), 1000);
        assert_eq!(epoch_ms(Some("2023-11-14 22:13:20")), 1_700_000_000_000);
    }

    #[test]
    fn epoch_ms_null_and_garbage_are_zero() {
        assert_eq!(epoch_ms(None), 0);
        assert_eq!(epoch_ms(Some("not a date")), 0);
        assert_eq!(epoch_ms(Some("")), 0);
    }

    #[tokio::test]
    async fn fetch_rows_applies_the_plan() {
        let db = test_db().await;
        sqlx::query(
            "INSERT INTO gym (gym_id, team_id, latitude, longitude, enabled, last_modified)
             VALUES ('a', 1, 10.5, 20.5, 1, '2023-11-14 22:13:20'),
                    ('b', 2, 50.0, 60.0, 1, '2023-11-14 22:13:20')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let cols = DiffColumns {
            modified: "last_modified",
            latitude: "latitude",
            longitude: "longitude",
        };
        let req = DiffRequest {
            viewport: Viewport::from_corners(Some(10.0), Some(20.0), Some(11.0), Some(21.0)),
            previous: None,
            last_sync_ms: Some(1_699_999_999_000),
        };
        let plan = build_plan(&req, 1_700_000_001_000, 100);

        let rows: Vec<GymRow> = db
            .fetch_rows(
                "SELECT gym_id, team_id, latitude, longitude, enabled, last_modified FROM gym",
                &cols,
                &plan,
            )
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].gym_id, "a");
    }

    #[tokio::test]
    async fn empty_store_yields_empty_vec() {
        let db = test_db().await;
        let rows = db.all_weather_rows().await.unwrap();
        assert!(rows.is_empty());
    }
}
