// Viewport-diff query construction.
//
// Every entity repository answers the same three-way question: has the
// client synced before (timestamped refresh), did the viewport move
// (send only the newly uncovered slice), or is this a cold start (send
// everything recent)? The answer is expressed as a storage-agnostic
// predicate tree which is lowered to SQL just before execution.

use crate::viewport::Viewport;

/// Recency window for untimestamped queries (Modes B and C).
pub const RECENT_WINDOW_SECS: i64 = 15 * 60;

/// A parsed diff request: current viewport, the viewport of the
/// client's previous request, and the client's last sync time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffRequest {
    pub viewport: Option<Viewport>,
    pub previous: Option<Viewport>,
    pub last_sync_ms: Option<i64>,
}

/// Column names a predicate tree is rendered against. Each entity
/// table names its modification timestamp differently.
#[derive(Debug, Clone, Copy)]
pub struct DiffColumns {
    pub modified: &'static str,
    pub latitude: &'static str,
    pub longitude: &'static str,
}

/// A value bound into the rendered SQL, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Float(f64),
}

/// Storage-agnostic filter tree selecting the rows a client needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Rows modified strictly after the given UTC epoch millisecond.
    ModifiedSince(i64),
    /// Rows inside the bounding box (inclusive on all edges).
    InsideViewport(Viewport),
    Not(Box<Predicate>),
    All(Vec<Predicate>),
}

impl Predicate {
    fn render(&self, cols: &DiffColumns, sql: &mut String, binds: &mut Vec<BindValue>) {
        match self {
            Predicate::ModifiedSince(ms) => {
                sql.push_str(cols.modified);
                sql.push_str(" > datetime(?, 'unixepoch')");
                // Stored timestamps are naive-UTC text; compare against
                // the bound value interpreted as UTC epoch seconds.
                binds.push(BindValue::Int(epoch_ms_to_secs(*ms)));
            }
            Predicate::InsideViewport(v) => {
                sql.push_str(cols.latitude);
                sql.push_str(" >= ? AND ");
                sql.push_str(cols.latitude);
                sql.push_str(" <= ? AND ");
                sql.push_str(cols.longitude);
                sql.push_str(" >= ? AND ");
                sql.push_str(cols.longitude);
                sql.push_str(" <= ?");
                binds.push(BindValue::Float(v.sw_lat));
                binds.push(BindValue::Float(v.ne_lat));
                binds.push(BindValue::Float(v.sw_lng));
                binds.push(BindValue::Float(v.ne_lng));
            }
            Predicate::Not(inner) => {
                sql.push_str("NOT (");
                inner.render(cols, sql, binds);
                sql.push(')');
            }
            Predicate::All(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    part.render(cols, sql, binds);
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Predicate::All(parts) if parts.is_empty())
    }
}

/// Round an epoch-millisecond timestamp to whole epoch seconds.
fn epoch_ms_to_secs(ms: i64) -> i64 {
    (ms as f64 / 1000.0).round() as i64
}

/// A complete plan for one entity fetch: the diff predicate, whether
/// to sort by modification time, the row cap, and any kind-specific
/// raw clauses appended by the owning repository.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub predicate: Predicate,
    pub order_by_modified: bool,
    pub limit: i64,
    extras: Vec<(String, Vec<BindValue>)>,
}

impl QueryPlan {
    /// Append a kind-specific clause (lure state, severity, id lists).
    /// The fragment is ANDed onto the diff predicate verbatim.
    pub fn and_raw(&mut self, sql: impl Into<String>, binds: Vec<BindValue>) {
        self.extras.push((sql.into(), binds));
    }

    /// Lower the plan to a SQL suffix (`WHERE … [ORDER BY …] LIMIT n`)
    /// plus the bind values in placeholder order.
    pub fn render(&self, cols: &DiffColumns) -> (String, Vec<BindValue>) {
        let mut sql = String::new();
        let mut binds = Vec::new();

        let mut clauses = String::new();
        if !self.predicate.is_empty() {
            self.predicate.render(cols, &mut clauses, &mut binds);
        }
        for (extra, extra_binds) in &self.extras {
            if !clauses.is_empty() {
                clauses.push_str(" AND ");
            }
            clauses.push_str(extra);
            binds.extend(extra_binds.iter().cloned());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses);
        }

        if self.order_by_modified {
            sql.push_str(" ORDER BY ");
            sql.push_str(cols.modified);
            sql.push_str(" ASC");
        }

        sql.push_str(" LIMIT ");
        sql.push_str(&self.limit.to_string());

        (sql, binds)
    }
}

/// Build the diff plan for a request. First match wins:
///
/// - Mode A (timestamped refresh): the client tells us when it last
///   synced; return everything modified since, restricted to the
///   viewport when one is given. No ordering.
/// - Mode B (viewport moved): no timestamp, but a previous viewport.
///   Return recent rows in the new viewport, minus rows the client
///   already has because they were recent and inside the old viewport.
///   No ordering.
/// - Mode C (cold start): everything recent in the viewport, oldest
///   first so the client's backfill is deterministic. Only this mode
///   sorts; the asymmetry is deliberate and relied on by clients.
pub fn build_plan(req: &DiffRequest, now_ms: i64, limit: i64) -> QueryPlan {
    let recent = now_ms - RECENT_WINDOW_SECS * 1000;
    let mut parts = Vec::new();
    let mut order_by_modified = false;

    match (req.last_sync_ms, req.previous) {
        (Some(ts), _) if ts != 0 => {
            parts.push(Predicate::ModifiedSince(ts));
            if let Some(v) = req.viewport {
                parts.push(Predicate::InsideViewport(v));
            }
        }
        (_, Some(prev)) => {
            parts.push(Predicate::ModifiedSince(recent));
            if let Some(v) = req.viewport {
                parts.push(Predicate::InsideViewport(v));
            }
            parts.push(Predicate::Not(Box::new(Predicate::All(vec![
                Predicate::ModifiedSince(recent),
                Predicate::InsideViewport(prev),
            ]))));
        }
        _ => {
            parts.push(Predicate::ModifiedSince(recent));
            if let Some(v) = req.viewport {
                parts.push(Predicate::InsideViewport(v));
            }
            order_by_modified = true;
        }
    }

    QueryPlan {
        predicate: Predicate::All(parts),
        order_by_modified,
        limit,
        extras: Vec::new(),
    }
}

/// Plan for a plain viewport query with no diff semantics (used by the
/// creature whitelist path, which always resends the full id set).
pub fn viewport_plan(viewport: Option<Viewport>, limit: i64) -> QueryPlan {
    let parts = viewport.map(Predicate::InsideViewport).into_iter().collect();
    QueryPlan {
        predicate: Predicate::All(parts),
        order_by_modified: false,
        limit,
        extras: Vec::new(),
    }
}

/// Build an `col IN (?, ?, …)` clause for an id list.
pub fn in_clause(column: &str, ids: &[i64], negate: bool) -> (String, Vec<BindValue>) {
    let placeholders = vec!["?"; ids.len()].join(", ");
    let op = if negate { "NOT IN" } else { "IN" };
    let sql = format!("{column} {op} ({placeholders})");
    let binds = ids.iter().map(|id| BindValue::Int(*id)).collect();
    (sql, binds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLS: DiffColumns = DiffColumns {
        modified: "last_modified",
        latitude: "latitude",
        longitude: "longitude",
    };

    fn viewport() -> Viewport {
        Viewport {
            sw_lat: 10.0,
            sw_lng: 20.0,
            ne_lat: 11.0,
            ne_lng: 21.0,
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn mode_a_filters_on_sync_time_and_viewport() {
        let req = DiffRequest {
            viewport: Some(viewport()),
            previous: None,
            last_sync_ms: Some(1_699_999_000_000),
        };
        let plan = build_plan(&req, NOW, 50000);
        let (sql, binds) = plan.render(&COLS);

        assert!(sql.contains("last_modified > datetime(?, 'unixepoch')"));
        assert!(sql.contains("latitude >= ? AND latitude <= ?"));
        assert!(!sql.contains("ORDER BY"), "Mode A must not sort");
        assert!(sql.ends_with("LIMIT 50000"));
        assert_eq!(binds[0], BindValue::Int(1_699_999_000));
    }

    #[test]
    fn mode_a_zero_timestamp_is_unset() {
        let req = DiffRequest {
            viewport: Some(viewport()),
            previous: None,
            last_sync_ms: Some(0),
        };
        let plan = build_plan(&req, NOW, 100);
        // Falls through to Mode C.
        assert!(plan.order_by_modified);
    }

    #[test]
    fn mode_b_suppresses_recent_rows_in_previous_viewport() {
        let prev = Viewport {
            sw_lat: 9.0,
            sw_lng: 19.0,
            ne_lat: 10.5,
            ne_lng: 20.5,
        };
        let req = DiffRequest {
            viewport: Some(viewport()),
            previous: Some(prev),
            last_sync_ms: None,
        };
        let plan = build_plan(&req, NOW, 1000);
        let (sql, binds) = plan.render(&COLS);

        assert!(sql.contains("NOT (last_modified > datetime(?, 'unixepoch') AND latitude"));
        assert!(!sql.contains("ORDER BY"), "Mode B must not sort");

        // Both recency clauses bind the same now-minus-window cutoff,
        // so a zoom-in never bypasses the 15-minute filter.
        let cutoff = BindValue::Int((NOW - RECENT_WINDOW_SECS * 1000) / 1000);
        assert_eq!(binds[0], cutoff);
        assert_eq!(binds[5], cutoff);
    }

    #[test]
    fn mode_c_sorts_oldest_first() {
        let req = DiffRequest {
            viewport: Some(viewport()),
            previous: None,
            last_sync_ms: None,
        };
        let plan = build_plan(&req, NOW, 1000);
        let (sql, binds) = plan.render(&COLS);

        assert!(sql.contains("ORDER BY last_modified ASC"));
        assert_eq!(
            binds[0],
            BindValue::Int((NOW - RECENT_WINDOW_SECS * 1000) / 1000)
        );
    }

    #[test]
    fn missing_viewport_disables_spatial_filter() {
        let req = DiffRequest {
            viewport: None,
            previous: None,
            last_sync_ms: Some(NOW - 1000),
        };
        let plan = build_plan(&req, NOW, 1000);
        let (sql, _) = plan.render(&COLS);
        assert!(!sql.contains("latitude"));
    }

    #[test]
    fn extras_are_appended_before_limit() {
        let mut plan = viewport_plan(Some(viewport()), 10);
        let (in_sql, in_binds) = in_clause("pokemon_id", &[1, 4, 9], false);
        plan.and_raw(in_sql, in_binds);
        let (sql, binds) = plan.render(&COLS);

        assert!(sql.contains("pokemon_id IN (?, ?, ?)"));
        assert!(sql.ends_with("LIMIT 10"));
        assert_eq!(binds.len(), 7);
        assert_eq!(binds[4], BindValue::Int(1));
    }

    #[test]
    fn empty_plan_renders_bare_limit() {
        let plan = viewport_plan(None, 5);
        let (sql, binds) = plan.render(&COLS);
        assert_eq!(sql, " LIMIT 5");
        assert!(binds.is_empty());
    }
}
