use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::discovery::{DiscoveryError, Facility, PoiQuery};
use crate::geo::Coordinates;
use crate::safety::emergency;
use crate::triage::{ReasoningError, TriageOutcome, TriageRequest};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
    hint: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            code: self.status.as_u16(),
            hint: self.hint,
        };
        (self.status, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError {
        status,
        message: msg.into(),
        hint: None,
    }
}

const DISCOVERY_HINT: &str = "Retry in a moment, or search by address with ?address=...";

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        match err {
            DiscoveryError::Input(e) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
            e @ DiscoveryError::AllProvidersFailed { .. } => ApiError {
                status: StatusCode::BAD_GATEWAY,
                message: e.to_string(),
                hint: Some(DISCOVERY_HINT),
            },
        }
    }
}

impl From<ReasoningError> for ApiError {
    fn from(err: ReasoningError) -> Self {
        let status = match err {
            ReasoningError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ReasoningError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        api_error(status, err.to_string())
    }
}

/// Run blocking provider / reasoning I/O off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("worker failed: {}", e)))
}

// ─── GET /api/facilities ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct FacilitiesQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub address: Option<String>,
    pub radius: Option<u32>,
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct FacilitiesResponse {
    pub origin: Coordinates,
    pub count: usize,
    pub facilities: Vec<Facility>,
}

pub async fn facilities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FacilitiesQuery>,
) -> Result<Json<FacilitiesResponse>, ApiError> {
    let start = Instant::now();

    let origin = match (params.lat, params.lon, params.address.as_deref().map(str::trim)) {
        (Some(lat), Some(lon), _) => Coordinates::new(lat, lon),
        (_, _, Some(address)) if !address.is_empty() => {
            geocode_address(state.clone(), address.to_string()).await?
        }
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "Provide 'lat'+'lon' or 'address' parameters",
            ))
        }
    };

    let mut query = PoiQuery::new(origin.lat, origin.lon)
        .with_radius(params.radius.unwrap_or(state.default_radius_m));
    if let Some(category) = params.category {
        query = query.with_category(category);
    }

    let worker_state = state.clone();
    let found = blocking(move || worker_state.finder.discover(&query)).await??;

    info!(
        lat = origin.lat,
        lon = origin.lon,
        count = found.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "GET /api/facilities"
    );

    Ok(Json(FacilitiesResponse {
        origin,
        count: found.len(),
        facilities: found,
    }))
}

async fn geocode_address(state: Arc<AppState>, address: String) -> Result<Coordinates, ApiError> {
    let lookup = address.clone();
    let result = blocking(move || state.geocoder.geocode(&lookup)).await?;
    match result {
        Ok(Some(coords)) => Ok(coords),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Address not found: '{}'", address),
        )),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e.to_string())),
    }
}

// ─── GET /api/geocode ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GeocodeQuery {
    pub q: Option<String>,
}

pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeQuery>,
) -> Result<Json<Coordinates>, ApiError> {
    let q = params.q.as_deref().unwrap_or("").trim().to_string();
    if q.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'q' parameter"));
    }
    let coords = geocode_address(state, q.clone()).await?;
    info!(query = %q, lat = coords.lat, lon = coords.lon, "GET /api/geocode");
    Ok(Json(coords))
}

// ─── GET /api/emergency-numbers ──────────────────────────────────

#[derive(Deserialize)]
pub struct NumbersQuery {
    pub country: Option<String>,
}

#[derive(Serialize)]
pub struct NumbersResponse {
    pub country: Option<String>,
    pub numbers: Vec<String>,
    pub call_uri: String,
}

pub async fn emergency_numbers(Query(params): Query<NumbersQuery>) -> Json<NumbersResponse> {
    let numbers = emergency::resolve(params.country.as_deref());
    let call_uri = format!("tel:{}", numbers.first().map(String::as_str).unwrap_or("112"));
    Json(NumbersResponse {
        country: params.country,
        numbers,
        call_uri,
    })
}

// ─── POST /api/triage ────────────────────────────────────────────

pub async fn triage(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TriageRequest>,
) -> Result<Json<TriageOutcome>, ApiError> {
    let start = Instant::now();

    if request.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Missing 'message'"));
    }

    let outcome = blocking(move || {
        state
            .engine
            .assess_near(&request, &state.finder, state.default_radius_m)
    })
    .await??;

    let kind = match &outcome {
        TriageOutcome::Immediate(_) => "immediate",
        TriageOutcome::Advice { .. } => "advice",
    };
    info!(
        outcome = kind,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POST /api/triage"
    );

    Ok(Json(outcome))
}
