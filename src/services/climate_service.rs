use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::climate::{ClimateSeries, MeteostatClient, MonthlyRecord};
use crate::fetch_error::FetchError;

#[derive(Clone)]
pub struct ClimateService {
    client: MeteostatClient,
    start: NaiveDate,
    end: NaiveDate,
}

impl ClimateService {
    pub fn new(client: MeteostatClient, start: NaiveDate, end: NaiveDate) -> Self {
        Self { client, start, end }
    }

    /// Monthly rows of one station within the configured date range
    pub async fn station_climate(&self, station_id: &str) -> Result<Vec<MonthlyRecord>, FetchError> {
        self.client
            .fetch_monthly(station_id, self.start, self.end)
            .await
    }

    /// Per-month averages over every station that returned data.
    ///
    /// Stations that fail or return nothing are left out; `None` when none succeeded.
    #[instrument(skip(self), fields(stations = station_ids.len()))]
    pub async fn combine_station_climate(&self, station_ids: &[String]) -> Option<ClimateSeries> {
        let mut per_station = Vec::with_capacity(station_ids.len());

        for station_id in station_ids {
            match self.station_climate(station_id).await {
                Ok(records) if !records.is_empty() => per_station.push(records),
                Ok(_) => warn!("No monthly data for station {}", station_id),
                Err(e) => warn!(
                    "Error fetching monthly weather data for station {}: {}",
                    station_id, e
                ),
            }
        }

        if per_station.is_empty() {
            warn!("No station returned climate data");
            return None;
        }

        let series = ClimateSeries::average_by_month(&per_station);
        info!(
            "Combined climate from {}/{} stations covering {} months",
            per_station.len(),
            station_ids.len(),
            series.len()
        );
        Some(series)
    }
}
