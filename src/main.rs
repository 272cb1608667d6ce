use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};

use rawmap_backend::api;
use rawmap_backend::cache::WeatherCache;
use rawmap_backend::config::Config;
use rawmap_backend::db::Database;
use rawmap_backend::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Arc::new(Config::load());

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let weather = Arc::new(WeatherCache::new());
    if let Err(e) = weather.refresh(&db).await {
        tracing::warn!("Initial weather refresh failed: {e}");
    }

    // Periodic wholesale rebuild of the weather cache. A failed
    // refresh keeps the previous snapshot live.
    {
        let db = db.clone();
        let weather = weather.clone();
        let every = config.weather_refresh_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(every));
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                match weather.refresh(&db).await {
                    Ok(()) => metrics::WEATHER_REFRESHES_TOTAL.inc(),
                    Err(e) => tracing::warn!("Weather refresh failed: {e}"),
                }
            }
        });
    }

    let cors = if config.cors_whitelist.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_whitelist
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    let app = api::router(db, weather, config.clone()).layer(cors);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind port");

    tracing::info!("rawmap backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
