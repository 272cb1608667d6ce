// Process-wide weather cache.
//
// The latest weather set and its derived neighbor grid are rebuilt
// wholesale on every refresh and published with a single Arc swap, so
// readers never observe a partially rebuilt snapshot — only a stale
// one until the next refresh lands. Reads never block on a refresh.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::cell::{CellId, GridCell};
use crate::db::Database;
use crate::repo::weather::{self, WeatherCell};

#[derive(Debug, Default)]
struct Snapshot {
    latest: Vec<WeatherCell>,
    grid: Vec<GridCell>,
}

pub struct WeatherCache {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl WeatherCache {
    pub fn new() -> Self {
        WeatherCache {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Rebuild the snapshot from the store and swap it in. On failure
    /// the previous snapshot stays live.
    pub async fn refresh(&self, db: &Database) -> Result<(), sqlx::Error> {
        let rows = db.all_weather_rows().await?;
        let latest: Vec<WeatherCell> = rows.into_iter().map(weather::normalize).collect();

        let mut seen = HashSet::new();
        let mut grid = Vec::new();
        for cell in &latest {
            let id = CellId::containing(cell.latitude, cell.longitude);
            if seen.insert(id) {
                grid.push(GridCell::from(id));
            }
            for neighbor in id.neighbors() {
                if seen.insert(neighbor) {
                    grid.push(GridCell::from(neighbor));
                }
            }
        }
        grid.sort_by_key(|c| c.cellid);

        let next = Arc::new(Snapshot { latest, grid });
        *self.snapshot.write().expect("weather cache lock poisoned") = next;
        tracing::debug!("Weather cache refreshed");
        Ok(())
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().expect("weather cache lock poisoned"))
    }

    /// Latest reading for every known cell.
    pub fn latest(&self) -> Vec<WeatherCell> {
        self.current().latest.clone()
    }

    /// Cells currently carrying a severity alert.
    pub fn alerts(&self) -> Vec<WeatherCell> {
        self.current()
            .latest
            .iter()
            .filter(|c| c.severity > 0)
            .cloned()
            .collect()
    }

    /// The neighbor grid derived from the latest reading set.
    pub fn grid(&self) -> Vec<GridCell> {
        self.current().grid.clone()
    }
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new()
    }
}
