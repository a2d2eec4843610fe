use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::{sync::RwLock, time::Instant};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::photos::SearchResponse;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STATIC_DIR: &str = "dist";
const DEFAULT_PHOTO_UPSTREAM_URL: &str = "https://api.pexels.com/v1/search";
const DEFAULT_PHOTO_REQUEST_TIMEOUT_MS: u64 = 6_000;
const DEFAULT_PHOTO_CONNECT_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_PHOTO_RESPONSE_MAX_BYTES: usize = 1024 * 1024;
const DEFAULT_PHOTO_CACHE_TTL_SECONDS: u64 = 60;
const DEFAULT_PHOTO_CACHE_MAX_ENTRIES: usize = 64;
const DEFAULT_PER_PAGE: u32 = 10;
const DEFAULT_LOG_FILTER: &str = "info";

const PHOTO_REQUEST_TIMEOUT_MS_BOUNDS: (u64, u64) = (100, 120_000);
const PHOTO_CONNECT_TIMEOUT_MS_BOUNDS: (u64, u64) = (100, 30_000);
const PHOTO_RESPONSE_MAX_BYTES_BOUNDS: (usize, usize) = (1_024, 10 * 1024 * 1024);
const PHOTO_CACHE_TTL_SECONDS_BOUNDS: (u64, u64) = (1, 86_400);
const PHOTO_CACHE_MAX_ENTRIES_BOUNDS: (usize, usize) = (1, 10_000);
const PER_PAGE_BOUNDS: (u32, u32) = (1, 80);
const MAX_QUERY_CHARS: usize = 64;
const USER_AGENT: &str = "aesthetic-gallery-proxy/1.0";
const REQUEST_ID_HEADER: &str = "x-request-id";

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
struct RuntimeConfig {
    port: u16,
    static_dir: PathBuf,
    upstream_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
    connect_timeout: Duration,
    response_max_bytes: usize,
    cache_ttl: Duration,
    cache_max_entries: usize,
}

impl RuntimeConfig {
    fn from_env() -> Self {
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let static_dir = parse_non_empty_string(lookup, "STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));
        let upstream_url =
            parse_http_url(lookup, "PHOTO_UPSTREAM_URL").unwrap_or_else(default_upstream_url);
        let request_timeout_ms = parse_u64_with_bounds(
            lookup,
            "PHOTO_REQUEST_TIMEOUT_MS",
            DEFAULT_PHOTO_REQUEST_TIMEOUT_MS,
            PHOTO_REQUEST_TIMEOUT_MS_BOUNDS,
        );
        let connect_timeout_ms = parse_u64_with_bounds(
            lookup,
            "PHOTO_CONNECT_TIMEOUT_MS",
            DEFAULT_PHOTO_CONNECT_TIMEOUT_MS,
            PHOTO_CONNECT_TIMEOUT_MS_BOUNDS,
        );
        let response_max_bytes = parse_usize_with_bounds(
            lookup,
            "PHOTO_RESPONSE_MAX_BYTES",
            DEFAULT_PHOTO_RESPONSE_MAX_BYTES,
            PHOTO_RESPONSE_MAX_BYTES_BOUNDS,
        );
        let cache_ttl_seconds = parse_u64_with_bounds(
            lookup,
            "PHOTO_CACHE_TTL_SECONDS",
            DEFAULT_PHOTO_CACHE_TTL_SECONDS,
            PHOTO_CACHE_TTL_SECONDS_BOUNDS,
        );
        let cache_max_entries = parse_usize_with_bounds(
            lookup,
            "PHOTO_CACHE_MAX_ENTRIES",
            DEFAULT_PHOTO_CACHE_MAX_ENTRIES,
            PHOTO_CACHE_MAX_ENTRIES_BOUNDS,
        );

        Self {
            port,
            static_dir,
            upstream_url,
            api_key: parse_non_empty_string(lookup, "PHOTO_API_KEY"),
            request_timeout: Duration::from_millis(request_timeout_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            response_max_bytes,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            cache_max_entries,
        }
    }
}

fn default_upstream_url() -> Url {
    Url::parse(DEFAULT_PHOTO_UPSTREAM_URL).expect("default upstream URL is valid")
}

fn parse_u64_with_bounds(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    bounds: (u64, u64),
) -> u64 {
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_usize_with_bounds(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
    bounds: (usize, usize),
) -> usize {
    lookup(name)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| (bounds.0..=bounds.1).contains(value))
        .unwrap_or(default)
}

fn parse_non_empty_string(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_http_url(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<Url> {
    let value = parse_non_empty_string(lookup, name)?;
    let parsed = Url::parse(&value).ok()?;

    if parsed.scheme() == "http" || parsed.scheme() == "https" {
        Some(parsed)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct AppState {
    client: reqwest::Client,
    cache: Arc<RwLock<PhotoCache>>,
    config: Arc<RuntimeConfig>,
}

impl AppState {
    fn new(config: RuntimeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            cache: Arc::new(RwLock::new(PhotoCache::new(
                config.cache_ttl,
                config.cache_max_entries,
            ))),
            config: Arc::new(config),
        })
    }
}

struct CachedSearch {
    stored_at: Instant,
    value: SearchResponse,
}

/// Normalized search results keyed by `term|per_page`. An entry is served for `ttl`
/// after it was stored. At capacity, storing a new key drops the earliest stored one.
struct PhotoCache {
    entries: HashMap<String, CachedSearch>,
    ttl: Duration,
    capacity: usize,
}

impl PhotoCache {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    fn is_fresh(&self, entry: &CachedSearch, now: Instant) -> bool {
        now.duration_since(entry.stored_at) < self.ttl
    }

    fn get(&self, key: &str, now: Instant) -> Option<&SearchResponse> {
        self.entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| &entry.value)
    }

    fn insert(&mut self, key: String, value: SearchResponse, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.duration_since(entry.stored_at) < ttl);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let earliest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(earliest) = earliest {
                self.entries.remove(&earliest);
            }
        }

        self.entries.insert(
            key,
            CachedSearch {
                stored_at: now,
                value,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
enum ProxyError {
    #[error("{0}")]
    InvalidQuery(&'static str),
    #[error("photo search is not configured")]
    Unconfigured,
    #[error("failed to reach photo search")]
    Transport,
    #[error("photo search returned status {0}")]
    UpstreamStatus(u16),
    #[error("photo search response too large")]
    TooLarge,
    #[error("photo search response was malformed")]
    Malformed,
}

impl ProxyError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transport | Self::UpstreamStatus(_) | Self::TooLarge | Self::Malformed => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn class(&self) -> &'static str {
        match self {
            Self::InvalidQuery(_) => "invalid_query",
            Self::Unconfigured => "unconfigured",
            Self::Transport => "upstream_transport",
            Self::UpstreamStatus(_) => "upstream_status",
            Self::TooLarge => "upstream_too_large",
            Self::Malformed => "upstream_malformed",
        }
    }
}

#[derive(Deserialize)]
struct PhotoQuery {
    query: Option<String>,
    per_page: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PhotoSearch {
    term: String,
    per_page: u32,
}

impl PhotoSearch {
    fn cache_key(&self) -> String {
        format!("{}|{}", self.term, self.per_page)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .init();
}

pub async fn run() -> anyhow::Result<()> {
    let config = RuntimeConfig::from_env();
    let port = config.port;
    let bind_address = format!("0.0.0.0:{port}");

    if config.api_key.is_none() {
        tracing::warn!(
            event = "photo_proxy_unconfigured",
            "PHOTO_API_KEY is not set; /api/photos will answer 503"
        );
    }

    let app = router(AppState::new(config)?);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(event = "server_listening", port, "server listening on http://127.0.0.1:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let static_service =
        ServeDir::new(&static_dir).not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/api/photos", get(get_photos))
        .fallback_service(static_service)
        .with_state(state)
}

async fn get_photos(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Result<Query<PhotoQuery>, QueryRejection>,
) -> axum::response::Response {
    let request_started_at = Instant::now();
    let request_id = request_id(&headers);

    tracing::info!(
        event = "photos_request_start",
        request_id = request_id.as_str(),
        method = method.as_str(),
        path = uri.path()
    );

    let search = query
        .map_err(|_| ProxyError::InvalidQuery("malformed query string"))
        .and_then(|Query(query)| validate_query(&query));
    let outcome = match search {
        Ok(search) => search_photos(&state, &search).await,
        Err(error) => Err(error),
    };

    match outcome {
        Ok((payload, cache_hit)) => {
            tracing::info!(
                event = "photos_request_complete",
                request_id = request_id.as_str(),
                status = StatusCode::OK.as_u16(),
                duration_ms = request_started_at.elapsed().as_millis() as u64,
                cache_hit,
                photos = payload.photos.len()
            );
            json_response(
                StatusCode::OK,
                Json(payload),
                cache_control(&format!("public, max-age={}", state.config.cache_ttl.as_secs())),
                &request_id,
            )
        }
        Err(error) => {
            let status = error.status();
            tracing::warn!(
                event = "photos_request_failed",
                request_id = request_id.as_str(),
                status = status.as_u16(),
                duration_ms = request_started_at.elapsed().as_millis() as u64,
                error_class = error.class(),
                error = %error
            );
            json_response(
                status,
                Json(ErrorBody {
                    error: error.to_string(),
                }),
                HeaderValue::from_static("no-store"),
                &request_id,
            )
        }
    }
}

fn validate_query(query: &PhotoQuery) -> Result<PhotoSearch, ProxyError> {
    let term = query
        .query
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ProxyError::InvalidQuery("query parameter is required"))?;

    if term.chars().count() > MAX_QUERY_CHARS {
        return Err(ProxyError::InvalidQuery("query parameter is too long"));
    }

    let per_page = match query.per_page.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_PER_PAGE,
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|value| (PER_PAGE_BOUNDS.0..=PER_PAGE_BOUNDS.1).contains(value))
            .ok_or(ProxyError::InvalidQuery("per_page must be between 1 and 80"))?,
    };

    Ok(PhotoSearch {
        term: term.to_string(),
        per_page,
    })
}

async fn search_photos(
    state: &AppState,
    search: &PhotoSearch,
) -> Result<(SearchResponse, bool), ProxyError> {
    let key = search.cache_key();

    let cached = {
        let cache = state.cache.read().await;
        cache.get(&key, Instant::now()).cloned()
    };
    if let Some(cached) = cached {
        return Ok((cached, true));
    }

    let fetched = fetch_upstream_photos(&state.client, &state.config, search).await?;
    state
        .cache
        .write()
        .await
        .insert(key, fetched.clone(), Instant::now());
    Ok((fetched, false))
}

async fn fetch_upstream_photos(
    client: &reqwest::Client,
    config: &RuntimeConfig,
    search: &PhotoSearch,
) -> Result<SearchResponse, ProxyError> {
    let api_key = config.api_key.as_deref().ok_or(ProxyError::Unconfigured)?;

    let mut target_url = config.upstream_url.clone();
    target_url
        .query_pairs_mut()
        .append_pair("query", &search.term)
        .append_pair("per_page", &search.per_page.to_string());

    let response = client
        .get(target_url)
        .header(AUTHORIZATION, api_key)
        .send()
        .await
        .map_err(|_| ProxyError::Transport)?;

    if !response.status().is_success() {
        return Err(ProxyError::UpstreamStatus(response.status().as_u16()));
    }

    let body = read_limited_body(response, config.response_max_bytes).await?;
    let parsed: SearchResponse = serde_json::from_slice(&body).map_err(|_| ProxyError::Malformed)?;

    Ok(SearchResponse::from_urls(parsed.landscape_urls()))
}

async fn read_limited_body(
    response: reqwest::Response,
    max_response_bytes: usize,
) -> Result<Vec<u8>, ProxyError> {
    let mut stream = response.bytes_stream();
    let mut body: Vec<u8> = Vec::with_capacity(8192);

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|_| ProxyError::Transport)?;

        if body.len() + chunk.len() > max_response_bytes {
            return Err(ProxyError::TooLarge);
        }

        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn json_response(
    status: StatusCode,
    payload: impl IntoResponse,
    cache_control: HeaderValue,
    request_id: &str,
) -> axum::response::Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, cache_control);
    headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));

    if let Ok(request_id_header) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, request_id_header);
    }

    (status, headers, payload).into_response()
}

fn cache_control(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}

/// The caller's `x-request-id` when it sent a usable one, otherwise a fresh id.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|raw| raw.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(next_request_id, str::to_string)
}

fn next_request_id() -> String {
    let epoch_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let sequence = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("req-{epoch_millis:x}-{sequence}")
}
