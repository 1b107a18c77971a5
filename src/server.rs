//! Thin HTTP wrapper over the pipeline: one read endpoint serving the
//! cached aggregate feed, refreshing when stale or when asked to.

use crate::aggregate::scrape_all_sources;
use crate::cache;
use crate::config::Config;
use crate::domain::Event;
use crate::error::{Result, ScraperError};
use crate::fetch::Fetcher;
use crate::venues::VenueTable;
use axum::extract::Query;
use axum::http::{HeaderValue, Method};
use axum::response::Json;
use axum::routing::get;
use axum::{Extension, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

struct AppState {
    fetcher: Fetcher,
    venues: VenueTable,
    cache_path: PathBuf,
    cache_ttl_seconds: i64,
    manual_events_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ShowsQuery {
    refresh: Option<u8>,
}

#[derive(Debug, Serialize)]
struct ShowsResponse {
    events: Vec<Event>,
    error: Option<String>,
}

async fn get_shows(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<ShowsQuery>,
) -> Json<ShowsResponse> {
    let mut snapshot = cache::load(&state.cache_path);
    let force_refresh = query.refresh.unwrap_or(0) != 0;

    if force_refresh || !snapshot.is_fresh(state.cache_ttl_seconds) {
        info!(force_refresh, "refreshing aggregate feed");
        match scrape_all_sources(&state.fetcher, &state.venues, &state.manual_events_path).await {
            Ok(events) => {
                if let Err(e) = cache::save(&state.cache_path, &events) {
                    warn!(error = %e, "failed to persist cache snapshot");
                }
                snapshot = cache::load(&state.cache_path);
            }
            Err(e) => {
                // Serve last-known-good data alongside the failure
                error!(error = %e, "scrape failed, serving cached events");
                return Json(ShowsResponse { events: snapshot.events, error: Some(e.to_string()) });
            }
        }
    }

    Json(ShowsResponse { events: snapshot.events, error: None })
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        allowed_origins.iter().filter_map(|origin| origin.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

/// Binds the feed server and runs until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let state = Arc::new(AppState {
        fetcher: Fetcher::new(),
        venues: VenueTable::known(),
        cache_path: config.cache.path.clone(),
        cache_ttl_seconds: config.cache.ttl_seconds,
        manual_events_path: config.manual_events_path.clone(),
    });

    let app = Router::new()
        .route("/api/shows", get(get_shows))
        .layer(Extension(state))
        .layer(cors_layer(&config.server.allowed_origins));

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|e| ScraperError::Config(format!("invalid bind address '{}': {}", config.server.bind, e)))?;

    info!(%addr, "serving aggregate feed");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| ScraperError::Server(e.to_string()))
}
