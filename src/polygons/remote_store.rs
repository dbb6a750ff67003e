use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::fetch_error::FetchError;
use crate::polygons::geometry::normalize_species_key;

/// Per-species GeoJSON files in public object storage (`<base>/<genus_species>.geojson`)
#[derive(Clone)]
pub struct RemotePolygonStore {
    client: reqwest::Client,
    base_url: String,
}

/// Outcome of a remote lookup; `Missing` keeps the URL that was tried
#[derive(Debug)]
pub enum RemoteLookup {
    Found(Value),
    Missing { url: String },
}

impl RemotePolygonStore {
    pub fn new(base_url: String) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn url_for(&self, species: &str) -> String {
        format!("{}{}.geojson", self.base_url, normalize_species_key(species))
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, species: &str) -> Result<RemoteLookup, FetchError> {
        let url = self.url_for(species);
        debug!("Requesting polygon from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!("Polygon lookup returned {} for {}", status, url);
            return Ok(RemoteLookup::Missing { url });
        }

        let body = response.bytes().await?;
        Ok(RemoteLookup::Found(serde_json::from_slice(&body)?))
    }
}
