// HTTP API: the raw-data aggregation route plus health and metrics.
//
// One client request fans out to the subset of entity repositories the
// client asked for; the sub-fetches run concurrently and the response
// is emitted once when all of them have resolved. The join is
// fail-fast: the first failed sub-fetch rejects the whole request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::WeatherCache;
use crate::cell::GridCell;
use crate::config::Config;
use crate::db::Database;
use crate::error::ApiError;
use crate::metrics;
use crate::query::DiffRequest;
use crate::repo;
use crate::repo::gym::Gym;
use crate::repo::pokemon::Pokemon;
use crate::repo::pokestop::Pokestop;
use crate::repo::scanned::ScannedLocation;
use crate::repo::spawnpoint::Spawnpoint;
use crate::repo::weather::WeatherCell;
use crate::viewport::Viewport;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub weather: Arc<WeatherCache>,
    pub config: Arc<Config>,
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>, weather: Arc<WeatherCache>, config: Arc<Config>) -> Router {
    let route = config.route_raw_data.clone();
    let state = AppState {
        db,
        weather,
        config,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route(&route, get(raw_data))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "rawmap-backend" }))
}

async fn metrics_handler() -> String {
    metrics::gather()
}

// ── Permissive parameter parsing ──────────────────────────────────────
// Malformed numerics fall back to unset, disabling the corresponding
// filter rather than erroring; evolving clients send odd values.

fn parse_f64(params: &HashMap<String, String>, key: &str) -> Option<f64> {
    params
        .get(key)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_i64(params: &HashMap<String, String>, key: &str) -> Option<i64> {
    params
        .get(key)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<i64>().ok())
}

fn parse_bool(params: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match params.get(key).map(String::as_str) {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

fn parse_id_list(params: &HashMap<String, String>, key: &str) -> Vec<i64> {
    params
        .get(key)
        .map(|raw| {
            raw.split(',')
                .filter_map(|part| part.trim().parse::<i64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_viewport(
    params: &HashMap<String, String>,
    sw_lat: &str,
    sw_lng: &str,
    ne_lat: &str,
    ne_lng: &str,
) -> Option<Viewport> {
    Viewport::from_corners(
        parse_f64(params, sw_lat),
        parse_f64(params, sw_lng),
        parse_f64(params, ne_lat),
        parse_f64(params, ne_lng),
    )
}

/// Fold a gym list into the id-keyed response mapping. Duplicate ids
/// (a gym returned by both phases of a moved-viewport fetch) resolve
/// last-write-wins.
pub fn fold_gyms(gyms: Vec<Gym>) -> HashMap<String, Gym> {
    let mut folded = HashMap::with_capacity(gyms.len());
    for gym in gyms {
        folded.insert(gym.gym_id.clone(), gym);
    }
    folded
}

// ── Response shape ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RawDataResponse {
    /// Server time, UTC epoch milliseconds.
    pub timestamp: i64,

    // Kind-inclusion flags echoed for the client's next request.
    pub lastgyms: bool,
    pub lastpokestops: bool,
    pub lastpokemon: bool,
    pub lastslocs: bool,
    pub lastspawns: bool,

    // Current viewport echoed as the next request's previous viewport.
    #[serde(rename = "oSwLat")]
    pub o_sw_lat: Option<f64>,
    #[serde(rename = "oSwLng")]
    pub o_sw_lng: Option<f64>,
    #[serde(rename = "oNeLat")]
    pub o_ne_lat: Option<f64>,
    #[serde(rename = "oNeLng")]
    pub o_ne_lng: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pokemons: Option<Vec<Pokemon>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pokestops: Option<Vec<Pokestop>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gyms: Option<HashMap<String, Gym>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<Vec<WeatherCell>>,
    #[serde(rename = "weatherAlerts", skip_serializing_if = "Option::is_none")]
    pub weather_alerts: Option<Vec<WeatherCell>>,
    #[serde(rename = "s2cells", skip_serializing_if = "Option::is_none")]
    pub s2cells: Option<Vec<GridCell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned: Option<Vec<ScannedLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawnpoints: Option<Vec<Spawnpoint>>,
}

// ── Raw-data handler ──────────────────────────────────────────────────

async fn raw_data(
    state: State<AppState>,
    headers: HeaderMap,
    query: Query<HashMap<String, String>>,
) -> Result<Json<RawDataResponse>, ApiError> {
    let result = raw_data_inner(state, headers, query).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(ApiError::BadRequest(_)) => "bad_request",
        Err(ApiError::Forbidden(_)) => "forbidden",
        Err(ApiError::Upstream(_)) => "upstream_error",
    };
    metrics::RAW_DATA_REQUESTS_TOTAL
        .with_label_values(&[outcome])
        .inc();
    result
}

async fn raw_data_inner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<RawDataResponse>, ApiError> {
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    if state.config.blacklist.is_blocked(user_agent) {
        return Err(ApiError::Forbidden("Blacklisted fingerprint.".into()));
    }

    // All four current-viewport corners are required; anything else is
    // optional and parses permissively.
    for key in ["swLat", "swLng", "neLat", "neLng"] {
        if params.get(key).map(|v| v.is_empty()).unwrap_or(true) {
            return Err(ApiError::BadRequest("Invalid parameters.".into()));
        }
    }

    // Show/hide toggles.
    let show_pokemon =
        parse_bool(&params, "pokemon", true) && !parse_bool(&params, "no_pokemon", false);
    let show_pokestops =
        parse_bool(&params, "pokestops", true) && !parse_bool(&params, "no_pokestops", false);
    let show_gyms = parse_bool(&params, "gyms", true) && !parse_bool(&params, "no_gyms", false);
    let show_weather = parse_bool(&params, "weather", false);
    let show_weather_grid = parse_bool(&params, "s2cells", false);
    let show_weather_alerts = parse_bool(&params, "weatherAlerts", false);
    let show_scanned = parse_bool(&params, "scanned", false);
    let show_spawnpoints = parse_bool(&params, "spawnpoints", false);

    // Did the last request include this kind? Drives cold-start vs
    // diff selection per kind, independent of the global mode machine.
    let last_pokemon = parse_bool(&params, "lastpokemon", false);
    let last_pokestops = parse_bool(&params, "lastpokestops", false);
    let last_gyms = parse_bool(&params, "lastgyms", false);
    let last_scanned = parse_bool(&params, "lastslocs", false);
    let last_spawnpoints = parse_bool(&params, "lastspawns", false);

    let viewport = parse_viewport(&params, "swLat", "swLng", "neLat", "neLng");
    let previous = parse_viewport(&params, "oSwLat", "oSwLng", "oNeLat", "oNeLng");
    let timestamp = parse_i64(&params, "timestamp").filter(|ts| *ts != 0);

    let lured_only = parse_bool(&params, "luredonly", true);
    let prionotify = parse_bool(&params, "prionotify", false);

    // Species whitelist/blacklist. Re-enabled ids merge into the
    // whitelist and are echoed back.
    let mut ids = parse_id_list(&params, "ids");
    let excluded = if prionotify {
        Vec::new()
    } else {
        parse_id_list(&params, "eids")
    };
    let reids = parse_id_list(&params, "reids");
    let reids_echo = if reids.is_empty() {
        None
    } else {
        ids.extend(&reids);
        Some(reids)
    };

    // Pan/zoom detection: a zoom-in uncovers no new area; any other
    // change of a complete previous viewport does.
    let new_area = match (previous, viewport) {
        (Some(prev), Some(cur)) => !prev.strictly_contains(&cur) && prev != cur,
        _ => false,
    };

    let db = &state.db;
    let config = &state.config;

    let pokemon_fut = async {
        if !show_pokemon {
            return Ok::<_, ApiError>(None);
        }
        let rows = if !ids.is_empty() {
            repo::pokemon::fetch_by_ids(db, &ids, &excluded, viewport, config.pokemon_limit)
                .await?
        } else if !last_pokemon {
            let req = DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: None,
            };
            repo::pokemon::fetch(db, &req, &excluded, config.pokemon_limit).await?
        } else {
            let req = DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: timestamp,
            };
            let mut rows = repo::pokemon::fetch(db, &req, &excluded, config.pokemon_limit).await?;
            if new_area {
                let moved = DiffRequest {
                    viewport,
                    previous,
                    last_sync_ms: None,
                };
                rows.extend(
                    repo::pokemon::fetch(db, &moved, &excluded, config.pokemon_limit).await?,
                );
            }
            rows
        };
        Ok(Some(rows))
    };

    let pokestop_fut = async {
        if !show_pokestops {
            return Ok::<_, ApiError>(None);
        }
        let rows = if !last_pokestops {
            let req = DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: None,
            };
            repo::pokestop::fetch(db, &req, lured_only, config.pokestop_limit).await?
        } else {
            let req = DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: timestamp,
            };
            let mut rows =
                repo::pokestop::fetch(db, &req, lured_only, config.pokestop_limit).await?;
            if new_area {
                let moved = DiffRequest {
                    viewport,
                    previous,
                    last_sync_ms: None,
                };
                rows.extend(
                    repo::pokestop::fetch(db, &moved, lured_only, config.pokestop_limit).await?,
                );
            }
            rows
        };
        Ok(Some(rows))
    };

    let gym_fut = async {
        if !show_gyms {
            return Ok::<_, ApiError>(None);
        }
        let rows = if !last_gyms {
            let req = DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: None,
            };
            repo::gym::fetch(db, &req, config.gym_limit).await?
        } else {
            let req = DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: timestamp,
            };
            let mut rows = repo::gym::fetch(db, &req, config.gym_limit).await?;
            if new_area {
                let moved = DiffRequest {
                    viewport,
                    previous,
                    last_sync_ms: None,
                };
                rows.extend(repo::gym::fetch(db, &moved, config.gym_limit).await?);
            }
            rows
        };
        Ok(Some(fold_gyms(rows)))
    };

    let weather_fut = async {
        if !show_weather {
            return Ok::<_, ApiError>(None);
        }
        let req = DiffRequest {
            viewport,
            previous: if new_area { previous } else { None },
            last_sync_ms: timestamp,
        };
        let rows = repo::weather::fetch(db, &req, false, config.weather_limit).await?;
        Ok(Some(rows))
    };

    let scanned_fut = async {
        if !show_scanned {
            return Ok::<_, ApiError>(None);
        }
        let req = if !last_scanned {
            DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: None,
            }
        } else if new_area {
            DiffRequest {
                viewport,
                previous,
                last_sync_ms: None,
            }
        } else {
            DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: timestamp,
            }
        };
        let rows = repo::scanned::fetch(db, &req, config.scanned_limit).await?;
        Ok(Some(rows))
    };

    let spawnpoint_fut = async {
        if !show_spawnpoints {
            return Ok::<_, ApiError>(None);
        }
        let req = if !last_spawnpoints {
            DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: None,
            }
        } else if new_area {
            DiffRequest {
                viewport,
                previous,
                last_sync_ms: None,
            }
        } else {
            DiffRequest {
                viewport,
                previous: None,
                last_sync_ms: timestamp,
            }
        };
        let rows =
            repo::spawnpoint::fetch(db, &req, config.spawn_delay, config.spawnpoint_limit).await?;
        Ok(Some(rows))
    };

    // Wait for every requested kind; the first failure rejects the
    // whole request. Alert and grid reads come from the cache snapshot
    // and never block.
    let (pokemons, pokestops, gyms, weather, scanned, spawnpoints) = tokio::try_join!(
        pokemon_fut,
        pokestop_fut,
        gym_fut,
        weather_fut,
        scanned_fut,
        spawnpoint_fut,
    )?;

    let weather_alerts = show_weather_alerts.then(|| state.weather.alerts());
    let s2cells = show_weather_grid.then(|| state.weather.grid());

    Ok(Json(RawDataResponse {
        timestamp: repo::now_ms(),
        lastgyms: show_gyms,
        lastpokestops: show_pokestops,
        lastpokemon: show_pokemon,
        lastslocs: show_scanned,
        lastspawns: show_spawnpoints,
        o_sw_lat: parse_f64(&params, "swLat"),
        o_sw_lng: parse_f64(&params, "swLng"),
        o_ne_lat: parse_f64(&params, "neLat"),
        o_ne_lng: parse_f64(&params, "neLng"),
        reids: reids_echo,
        pokemons,
        pokestops,
        gyms,
        weather,
        weather_alerts,
        s2cells,
        scanned,
        spawnpoints,
    }))
}
