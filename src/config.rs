// Application configuration, loaded from environment variables.

use crate::blacklist::Blacklist;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Path of the raw-data route.
    pub route_raw_data: String,
    /// Allowed CORS origins. Empty means allow any origin.
    pub cors_whitelist: Vec<String>,
    /// Blocked User-Agent fragments.
    pub blacklist: Blacklist,
    /// Per-kind row caps. The cap truncates arbitrarily beyond the
    /// mode's ordering, if any.
    pub pokemon_limit: i64,
    pub pokestop_limit: i64,
    pub gym_limit: i64,
    pub scanned_limit: i64,
    pub spawnpoint_limit: i64,
    pub weather_limit: i64,
    /// Seconds between weather cache rebuilds.
    pub weather_refresh_secs: u64,
    /// Scanner lag added to reconstructed spawn appear times.
    pub spawn_delay: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:rawmap.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `ROUTE_RAW_DATA` - raw-data route path (default: `/raw_data`)
    /// - `CORS_WHITELIST` - comma-separated allowed origins
    /// - `BLACKLISTED_USER_AGENTS` - comma-separated UA fragments to reject
    /// - `POKEMON_LIMIT_PER_QUERY` etc. - per-kind row caps
    /// - `WEATHER_REFRESH_SECS` - cache rebuild interval (default: 60)
    /// - `SPAWN_DELAY` - spawn appear-time offset in seconds (default: 0)
    pub fn load() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:rawmap.db?mode=rwc".to_string());

        let port = env_parsed("PORT", 3000u16);
        let route_raw_data =
            std::env::var("ROUTE_RAW_DATA").unwrap_or_else(|_| "/raw_data".to_string());

        let cors_whitelist = std::env::var("CORS_WHITELIST")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let blacklist = Blacklist::from_fragments(
            &std::env::var("BLACKLISTED_USER_AGENTS").unwrap_or_default(),
        );

        Config {
            database_url,
            port,
            route_raw_data,
            cors_whitelist,
            blacklist,
            pokemon_limit: env_parsed("POKEMON_LIMIT_PER_QUERY", 50000),
            pokestop_limit: env_parsed("POKESTOP_LIMIT_PER_QUERY", 50000),
            gym_limit: env_parsed("GYM_LIMIT_PER_QUERY", 50000),
            scanned_limit: env_parsed("SCANNEDLOCATION_LIMIT_PER_QUERY", 50000),
            spawnpoint_limit: env_parsed("SPAWNPOINT_LIMIT_PER_QUERY", 50000),
            weather_limit: env_parsed("WEATHER_LIMIT_PER_QUERY", 5000),
            weather_refresh_secs: env_parsed("WEATHER_REFRESH_SECS", 60),
            spawn_delay: env_parsed("SPAWN_DELAY", 0),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load()
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
