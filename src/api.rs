use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::api_error::{ApiError, ErrorBody};
use crate::fetch_error::FetchError;
use crate::observations::{FetchEvent, ObservationFetcher};
use crate::services::report_service::GraphReport;
use crate::services::{ClimateService, PolygonService, ReportService, SpeciesService};
use crate::species::{HerpOrders, Suggestion};
use crate::stations::{BoundingBox, StationDirectory, StationSummary, DEFAULT_VIEW};

#[derive(Clone)]
pub struct AppState {
    pub report_service: ReportService,
    pub climate_service: ClimateService,
    pub observation_fetcher: ObservationFetcher,
    pub station_directory: StationDirectory,
    pub species_service: SpeciesService,
    pub polygon_service: PolygonService,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Data for the initial map view
#[derive(Serialize, ToSchema)]
pub struct IndexResponse {
    pub orders: Vec<String>,
    #[schema(value_type = Object)]
    pub herp_orders: HerpOrders,
    pub stations: Vec<StationSummary>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BoundsQuery {
    pub north: Option<String>,
    pub west: Option<String>,
    pub south: Option<String>,
    pub east: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GraphRequest {
    #[serde(default)]
    pub species: String,
    #[serde(default, rename = "selectedStations")]
    pub selected_stations: Vec<String>,
    /// Drop cached observations and fetch again
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SpeciesQuery {
    pub species: Option<String>,
    /// `true`/`false` (also `1`/`0`); drop cached observations and fetch again
    pub force: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PolygonQuery {
    pub species: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StationClimateQuery {
    pub station_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestionQuery {
    pub query: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationClimateRow {
    pub month: u32,
    pub tavg: Option<f64>,
    pub prcp: Option<f64>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        index,
        get_stations,
        generate_graph,
        fetch_inat_data,
        get_station_climate,
        species_suggestions,
        herp_orders,
        get_iucn_polygon,
        get_iucn_polygon_sqlite,
        get_iucn_polygon_remote,
    ),
    components(schemas(
        HealthResponse,
        IndexResponse,
        StationSummary,
        GraphRequest,
        GraphReport,
        StationClimateRow,
        Suggestion,
        SuggestionsResponse,
        ErrorBody,
    )),
    tags((name = "herp-climate", description = "Species climate, observation and range lookups"))
)]
pub struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/stations", get(get_stations))
        .route("/generate_graph", post(generate_graph))
        .route("/fetch_inat_data", get(fetch_inat_data))
        .route("/get_station_climate", get(get_station_climate))
        .route("/species_suggestions", get(species_suggestions))
        .route("/herp_orders", get(herp_orders))
        .route("/get_iucn_polygon", get(get_iucn_polygon))
        .route("/get_iucn_polygon_sqlite", get(get_iucn_polygon_sqlite))
        .route("/get_iucn_polygon_remote", get(get_iucn_polygon_remote))
        .with_state(state)
}

fn parse_coordinate(name: &str, value: Option<&str>) -> Result<f64, ApiError> {
    let raw = value
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing query parameter: {name}")))?;

    raw.parse::<f64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid value for {name}: {raw}")))
}

fn parse_flag(name: &str, value: Option<&str>) -> Result<bool, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(false),
        Some(raw) if raw.eq_ignore_ascii_case("true") || raw == "1" => Ok(true),
        Some(raw) if raw.eq_ignore_ascii_case("false") || raw == "0" => Ok(false),
        Some(raw) => Err(ApiError::BadRequest(format!("Invalid value for {name}: {raw}"))),
    }
}

fn required_param(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

/// Species exactly as received; it doubles as the observation cache key
fn required_species(value: Option<String>) -> Result<String, ApiError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Species not provided".to_string()))
}

#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("Health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(get, path = "/", responses((status = 200, body = IndexResponse)))]
#[instrument(skip(state))]
async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    let herp_orders = state.species_service.orders();

    let stations = match state.station_directory.within_bounds(DEFAULT_VIEW).await {
        Ok(stations) => stations,
        Err(e) => {
            warn!("Error fetching weather stations for initial view: {}", e);
            Vec::new()
        }
    };
    info!("Initial view with {} stations", stations.len());

    Json(IndexResponse {
        orders: herp_orders.keys().cloned().collect(),
        herp_orders: (*herp_orders).clone(),
        stations,
    })
}

#[utoipa::path(
    get,
    path = "/stations",
    params(BoundsQuery),
    responses(
        (status = 200, body = [StationSummary]),
        (status = 400, body = ErrorBody)
    )
)]
#[instrument(skip(state))]
async fn get_stations(
    State(state): State<AppState>,
    Query(params): Query<BoundsQuery>,
) -> Result<Json<Vec<StationSummary>>, ApiError> {
    let north = parse_coordinate("north", params.north.as_deref())?;
    let west = parse_coordinate("west", params.west.as_deref())?;
    let south = parse_coordinate("south", params.south.as_deref())?;
    let east = parse_coordinate("east", params.east.as_deref())?;

    let bounds = BoundingBox::new(north, west, south, east)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let stations = match state.station_directory.within_bounds(bounds).await {
        Ok(stations) => stations,
        Err(e) => {
            warn!("Error fetching stations by bounds: {}", e);
            Vec::new()
        }
    };

    info!("Returning {} stations in bounds", stations.len());
    Ok(Json(stations))
}

#[utoipa::path(
    post,
    path = "/generate_graph",
    request_body = GraphRequest,
    responses(
        (status = 200, body = GraphReport),
        (status = 400, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
#[instrument(skip(state, payload))]
async fn generate_graph(
    State(state): State<AppState>,
    payload: Result<Json<GraphRequest>, JsonRejection>,
) -> Result<Json<GraphReport>, ApiError> {
    let Json(request) = payload?;
    debug!(
        "Generating graph for '{}' with {} stations",
        request.species,
        request.selected_stations.len()
    );

    let report = state
        .report_service
        .generate_graph(
            &request.species,
            &request.selected_stations,
            request.force,
        )
        .await?;

    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/fetch_inat_data",
    params(SpeciesQuery),
    responses(
        (status = 200, description = "Page numbers, then FINISHED|<json> or ERROR: <message>; CACHED|<json> on a cache hit", body = String, content_type = "text/event-stream"),
        (status = 400, body = ErrorBody)
    )
)]
#[instrument(skip(state))]
async fn fetch_inat_data(
    State(state): State<AppState>,
    Query(params): Query<SpeciesQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let species = required_species(params.species)?;
    let force = parse_flag("force", params.force.as_deref())?;

    let (tx, rx) = mpsc::unbounded_channel::<FetchEvent>();
    let fetcher = state.observation_fetcher.clone();

    // Runs to completion even if the client disconnects
    tokio::spawn(async move {
        fetcher
            .fetch_with_progress(&species, force, |event| {
                if tx.send(event).is_err() {
                    debug!("Progress listener went away");
                }
            })
            .await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(Event::default().data(event.to_message())), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    get,
    path = "/get_station_climate",
    params(StationClimateQuery),
    responses(
        (status = 200, body = [StationClimateRow]),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
#[instrument(skip(state))]
async fn get_station_climate(
    State(state): State<AppState>,
    Query(params): Query<StationClimateQuery>,
) -> Result<Json<Vec<StationClimateRow>>, ApiError> {
    let station_id = required_param(params.station_id, "No station_id provided")?;

    let records = match state.climate_service.station_climate(&station_id).await {
        Ok(records) => records,
        Err(e) if e.is_malformed() => {
            return Err(ApiError::Internal(format!("Climate data format error: {e}")));
        }
        Err(FetchError::InvalidStation(id)) => {
            return Err(ApiError::BadRequest(format!("Invalid station_id: {id}")));
        }
        Err(e) => {
            warn!("Error fetching monthly weather data for station {}: {}", station_id, e);
            Vec::new()
        }
    };

    if records.is_empty() {
        return Err(ApiError::NotFound(
            "No climate data available for station".to_string(),
        ));
    }

    Ok(Json(
        records
            .into_iter()
            .map(|record| StationClimateRow {
                month: record.month,
                tavg: record.tavg,
                prcp: record.prcp,
            })
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/species_suggestions",
    params(SuggestionQuery),
    responses((status = 200, body = SuggestionsResponse))
)]
#[instrument(skip(state))]
async fn species_suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionQuery>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let query = params.query.unwrap_or_default();
    let suggestions = state
        .species_service
        .suggestions(&query)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(SuggestionsResponse { suggestions }))
}

#[utoipa::path(get, path = "/herp_orders", responses((status = 200, description = "Order name to species list")))]
#[instrument(skip(state))]
async fn herp_orders(State(state): State<AppState>) -> Json<HerpOrders> {
    Json((*state.species_service.orders()).clone())
}

#[utoipa::path(
    get,
    path = "/get_iucn_polygon",
    params(PolygonQuery),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection"),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
#[instrument(skip(state))]
async fn get_iucn_polygon(
    State(state): State<AppState>,
    Query(params): Query<PolygonQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let species = params.species.unwrap_or_default();
    let collection = state.polygon_service.from_shapefiles(&species).await?;
    Ok(Json(collection))
}

#[utoipa::path(
    get,
    path = "/get_iucn_polygon_sqlite",
    params(PolygonQuery),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection"),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
#[instrument(skip(state))]
async fn get_iucn_polygon_sqlite(
    State(state): State<AppState>,
    Query(params): Query<PolygonQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let species = params.species.unwrap_or_default();
    let collection = state.polygon_service.from_species_index(&species).await?;
    Ok(Json(collection))
}

#[utoipa::path(
    get,
    path = "/get_iucn_polygon_remote",
    params(PolygonQuery),
    responses(
        (status = 200, description = "GeoJSON as stored"),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 500, body = ErrorBody)
    )
)]
#[instrument(skip(state))]
async fn get_iucn_polygon_remote(
    State(state): State<AppState>,
    Query(params): Query<PolygonQuery>,
) -> Result<Json<Value>, ApiError> {
    let species = params.species.unwrap_or_default();
    let geojson = state.polygon_service.from_remote(&species).await?;
    Ok(Json(geojson))
}
