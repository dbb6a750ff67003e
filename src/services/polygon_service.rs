use geojson::{FeatureCollection, JsonObject};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, SpeciesIndexRepository};
use crate::fetch_error::FetchError;
use crate::polygons::geometry::{feature, feature_collection};
use crate::polygons::remote_store::RemoteLookup;
use crate::polygons::shapefile_source::ShapefileError;
use crate::polygons::{wkt_to_geometry, RemotePolygonStore, ShapefileSource};

#[derive(Debug, thiserror::Error)]
pub enum PolygonError {
    #[error("No species provided")]
    MissingSpecies,
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Shapefile(#[from] ShapefileError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Polygon lookup failed: {0}")]
    Upstream(#[from] FetchError),
    #[error("Shapefile scan failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct PolygonService {
    shapefiles: ShapefileSource,
    species_index: SpeciesIndexRepository,
    remote: RemotePolygonStore,
}

fn require_species(species: &str) -> Result<&str, PolygonError> {
    let trimmed = species.trim();
    if trimmed.is_empty() {
        Err(PolygonError::MissingSpecies)
    } else {
        Ok(trimmed)
    }
}

impl PolygonService {
    pub fn new(
        shapefiles: ShapefileSource,
        species_index: SpeciesIndexRepository,
        remote: RemotePolygonStore,
    ) -> Self {
        Self {
            shapefiles,
            species_index,
            remote,
        }
    }

    pub fn species_index(&self) -> &SpeciesIndexRepository {
        &self.species_index
    }

    #[instrument(skip(self))]
    pub async fn from_shapefiles(&self, species: &str) -> Result<FeatureCollection, PolygonError> {
        let species = require_species(species)?.to_string();
        let shapefiles = self.shapefiles.clone();

        let wanted = species.clone();
        let features =
            tokio::task::spawn_blocking(move || shapefiles.find_species(&wanted)).await??;

        if features.is_empty() {
            return Err(PolygonError::NotFound(format!(
                "No IUCN polygon data found for species: {species}"
            )));
        }

        info!("Returning {} shapefile features for {}", features.len(), species);
        Ok(feature_collection(features))
    }

    #[instrument(skip(self))]
    pub async fn from_species_index(
        &self,
        species: &str,
    ) -> Result<FeatureCollection, PolygonError> {
        let species = require_species(species)?;
        let rows = self.species_index.find_by_species(species).await?;

        if rows.is_empty() {
            return Err(PolygonError::NotFound(format!(
                "IUCN polygon data not found for '{species}'. This species appears in the \
                 reptile database but is not indexed in our SQLite database. Please try the \
                 search box."
            )));
        }

        let mut features = Vec::with_capacity(rows.len());
        for row in rows {
            match wkt_to_geometry(&row.wkt) {
                Ok(geometry) => {
                    let mut properties = JsonObject::new();
                    properties.insert("shapefile".to_string(), row.shapefile.into());
                    features.push(feature(geometry, properties));
                }
                Err(e) => warn!(
                    "Error converting WKT for species '{}' in file '{}': {}",
                    species, row.shapefile, e
                ),
            }
        }

        debug!("Returning feature collection with {} features", features.len());
        Ok(feature_collection(features))
    }

    #[instrument(skip(self))]
    pub async fn from_remote(&self, species: &str) -> Result<Value, PolygonError> {
        let species = require_species(species)?;

        match self.remote.fetch(species).await? {
            RemoteLookup::Found(geojson) => Ok(geojson),
            RemoteLookup::Missing { url } => Err(PolygonError::NotFound(format!(
                "Polygon not found for: {species} (tried {url})"
            ))),
        }
    }
}
