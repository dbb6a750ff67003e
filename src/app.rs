use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{create_router, AppState};
use crate::climate::MeteostatClient;
use crate::config::Config;
use crate::db::SpeciesIndexRepository;
use crate::observations::{ObservationCache, ObservationFetcher};
use crate::polygons::{RemotePolygonStore, ShapefileSource};
use crate::services::{ClimateService, PolygonService, ReportService, SpeciesService};
use crate::stations::StationDirectory;

/// Running HTTP server
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
}

impl Application {
    /// Wires clients, the observation cache and services into [`AppState`]
    pub fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
        let meteostat = MeteostatClient::with_base_url(config.meteostat_bulk_url.clone());
        let observation_cache = ObservationCache::new();
        let observation_fetcher =
            ObservationFetcher::new(config.inat_api_url.clone(), observation_cache)
                .with_page_size(config.inat_page_size);

        let climate_service =
            ClimateService::new(meteostat.clone(), config.climate_start, config.climate_end);
        let report_service =
            ReportService::new(climate_service.clone(), observation_fetcher.clone());
        let species_service =
            SpeciesService::load(config.species_dir.clone(), config.species_csv.clone());

        let species_index = SpeciesIndexRepository::connect_lazy(&config.species_index_url)?;
        let polygon_service = PolygonService::new(
            ShapefileSource::new(config.iucn_shapefile_dir.clone()),
            species_index,
            RemotePolygonStore::new(config.polygon_base_url.clone()),
        );

        Ok(AppState {
            report_service,
            climate_service,
            observation_fetcher,
            station_directory: StationDirectory::new(meteostat),
            species_service,
            polygon_service,
        })
    }

    /// Build the application and start serving
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");
        let state = Self::build_state(&config)?;

        let species_index = state.polygon_service.species_index();
        match species_index.count().await {
            Ok(count) => info!("Species index holds {} entries", count),
            Err(e) => warn!("Species index unavailable, SQLite polygon lookups will fail: {}", e),
        }

        let app = create_router(state).layer(TraceLayer::new_for_http());

        let addr = config.server_addr();
        info!("Starting HTTP server on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        info!("Application initialized successfully");
        Ok(Self { server_handle })
    }

    /// Run until the server stops
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
