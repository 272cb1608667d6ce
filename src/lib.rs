// Read-only geospatial query API over a scanner-populated store of
// game-world entities. Clients poll the raw-data route with a viewport
// and an optional last-sync timestamp and receive only the entities
// that are new, changed, or newly uncovered since their last request.

pub mod api;
pub mod blacklist;
pub mod cache;
pub mod cell;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod query;
pub mod repo;
pub mod spawn;
pub mod viewport;
