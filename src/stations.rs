use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

use crate::climate::{MeteostatClient, MeteostatStation};
use crate::fetch_error::FetchError;

/// Initial map view: mainland China and Taiwan
pub const DEFAULT_VIEW: BoundingBox = BoundingBox {
    north: 54.0,
    west: 73.0,
    south: 18.0,
    east: 136.0,
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BoundsError {
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{name} out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("north ({north}) is less than south ({south})")]
    Inverted { north: f64, south: f64 },
}

/// Geographic query box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Result<Self, BoundsError> {
        for (name, value, limit) in [
            ("north", north, 90.0),
            ("south", south, 90.0),
            ("west", west, 180.0),
            ("east", east, 180.0),
        ] {
            if !value.is_finite() {
                return Err(BoundsError::NotFinite(name));
            }
            if value.abs() > limit {
                return Err(BoundsError::OutOfRange { name, value });
            }
        }
        if north < south {
            return Err(BoundsError::Inverted { north, south });
        }

        Ok(Self {
            north,
            west,
            south,
            east,
        })
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if latitude < self.south || latitude > self.north {
            return false;
        }
        if self.west <= self.east {
            longitude >= self.west && longitude <= self.east
        } else {
            // Box crosses the antimeridian
            longitude >= self.west || longitude <= self.east
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StationSummary {
    pub id: String,
    pub name: String,
    /// `[latitude, longitude]`
    #[schema(value_type = Vec<f64>)]
    pub coords: [f64; 2],
    pub country: String,
    pub elevation: Option<i32>,
    pub monthly_start: Option<String>,
    pub monthly_end: Option<String>,
}

impl From<&MeteostatStation> for StationSummary {
    fn from(station: &MeteostatStation) -> Self {
        let monthly = &station.inventory.monthly;
        Self {
            id: station.id.clone(),
            name: station.display_name(),
            coords: [station.location.latitude, station.location.longitude],
            country: station.country.clone(),
            elevation: station.location.elevation,
            monthly_start: monthly.start.map(|year| format!("{year:04}-01-01")),
            monthly_end: monthly.end.map(|year| format!("{year:04}-12-31")),
        }
    }
}

/// Station inventory, downloaded once and kept for the life of the process
#[derive(Clone)]
pub struct StationDirectory {
    client: MeteostatClient,
    stations: Arc<OnceCell<Vec<StationSummary>>>,
}

impl StationDirectory {
    pub fn new(client: MeteostatClient) -> Self {
        Self {
            client,
            stations: Arc::new(OnceCell::new()),
        }
    }

    /// Stations inside `bounds`; a failed inventory download is retried on the next call
    #[instrument(skip(self))]
    pub async fn within_bounds(
        &self,
        bounds: BoundingBox,
    ) -> Result<Vec<StationSummary>, FetchError> {
        let all = self
            .stations
            .get_or_try_init(|| async {
                let stations = self.client.fetch_stations().await?;
                info!("Cached inventory of {} stations", stations.len());
                Ok::<_, FetchError>(stations.iter().map(StationSummary::from).collect())
            })
            .await?;

        let matching: Vec<StationSummary> = all
            .iter()
            .filter(|station| bounds.contains(station.coords[0], station.coords[1]))
            .cloned()
            .collect();

        debug!("Number of stations found in bounds: {}", matching.len());
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_latitudes() {
        let result = BoundingBox::new(10.0, 100.0, 20.0, 120.0);
        assert_eq!(
            result,
            Err(BoundsError::Inverted {
                north: 10.0,
                south: 20.0
            })
        );
    }

    #[test]
    fn test_rejects_non_finite_and_out_of_range() {
        assert_eq!(
            BoundingBox::new(f64::NAN, 100.0, 20.0, 120.0),
            Err(BoundsError::NotFinite("north"))
        );
        assert!(matches!(
            BoundingBox::new(95.0, 100.0, 20.0, 120.0),
            Err(BoundsError::OutOfRange { name: "north", .. })
        ));
    }

    #[test]
    fn test_contains_regular_box() {
        let bounds = BoundingBox::new(30.0, 100.0, 20.0, 120.0).unwrap();
        assert!(bounds.contains(25.0, 110.0));
        assert!(bounds.contains(30.0, 120.0));
        assert!(!bounds.contains(31.0, 110.0));
        assert!(!bounds.contains(25.0, 99.0));
    }

    #[test]
    fn test_contains_wraps_across_antimeridian() {
        let bounds = BoundingBox::new(10.0, 170.0, -10.0, -170.0).unwrap();
        assert!(bounds.contains(0.0, 179.0));
        assert!(bounds.contains(0.0, -175.0));
        assert!(!bounds.contains(0.0, 0.0));
    }

    #[test]
    fn test_default_view_is_valid() {
        let view = DEFAULT_VIEW;
        assert_eq!(BoundingBox::new(view.north, view.west, view.south, view.east), Ok(view));
    }
}
