// Entity repositories: one per kind, each wrapping the shared
// viewport-diff plan with its kind-specific filters and row
// normalization. Contract for every fetch: inputs are never mutated,
// timestamps come back as UTC epoch milliseconds, and an empty store
// is an empty Vec, never an error.

pub mod gym;
pub mod pokemon;
pub mod pokestop;
pub mod scanned;
pub mod spawnpoint;
pub mod weather;

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
