// Fixed-subdivision cell grid over the lat/lng plane.
//
// Weather readings are indexed by the cell containing them; the client
// grid view draws each cell's polygon plus its immediate neighbors.
// The tiling is 2^LEVEL rows over 180 degrees of latitude and twice as
// many columns over 360 degrees of longitude, so cells are square in
// degree space. Longitude wraps at the date line; latitude clamps at
// the poles.

use serde::Serialize;

/// Subdivision level of the grid.
pub const GRID_LEVEL: u32 = 10;

const ROWS: i64 = 1 << GRID_LEVEL;
const COLS: i64 = ROWS * 2;
const CELL_DEG: f64 = 180.0 / ROWS as f64;

/// A grid cell address. The public form is the packed u64 id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    x: i64,
    y: i64,
}

impl CellId {
    /// The cell containing a point.
    pub fn containing(lat: f64, lng: f64) -> CellId {
        let lat = lat.clamp(-90.0, 90.0);
        let lng = wrap_lng(lng);
        let y = (((lat + 90.0) / CELL_DEG) as i64).min(ROWS - 1);
        let x = (((lng + 180.0) / CELL_DEG) as i64).min(COLS - 1);
        CellId { x, y }
    }

    pub fn from_packed(id: u64) -> CellId {
        CellId {
            x: (id & 0xffff_ffff) as i64,
            y: (id >> 32) as i64,
        }
    }

    pub fn packed(&self) -> u64 {
        ((self.y as u64) << 32) | self.x as u64
    }

    /// Center of the cell in degrees, `[lat, lng]`.
    pub fn center(&self) -> [f64; 2] {
        [
            -90.0 + (self.y as f64 + 0.5) * CELL_DEG,
            -180.0 + (self.x as f64 + 0.5) * CELL_DEG,
        ]
    }

    /// Corner vertices in drawing order: SW, SE, NE, NW.
    pub fn vertices(&self) -> [[f64; 2]; 4] {
        let s = -90.0 + self.y as f64 * CELL_DEG;
        let n = s + CELL_DEG;
        let w = -180.0 + self.x as f64 * CELL_DEG;
        let e = w + CELL_DEG;
        [[s, w], [s, e], [n, e], [n, w]]
    }

    /// The up-to-eight adjacent cells. Longitude wraps; rows past the
    /// poles are skipped.
    pub fn neighbors(&self) -> Vec<CellId> {
        let mut out = Vec::with_capacity(8);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let y = self.y + dy;
                if y < 0 || y >= ROWS {
                    continue;
                }
                let x = (self.x + dx).rem_euclid(COLS);
                out.push(CellId { x, y });
            }
        }
        out
    }
}

fn wrap_lng(lng: f64) -> f64 {
    let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == 180.0 {
        -180.0
    } else {
        wrapped
    }
}

/// A grid entry as sent to the client: packed id, center, polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub cellid: u64,
    pub center: [f64; 2],
    pub vertices: [[f64; 2]; 4],
}

impl From<CellId> for GridCell {
    fn from(id: CellId) -> GridCell {
        GridCell {
            cellid: id.packed(),
            center: id.center(),
            vertices: id.vertices(),
        }
    }
}
