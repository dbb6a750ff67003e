use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::climate::{ClimateMonth, ClimateSeries};
use crate::observations::{aggregate_by_month, MonthlyCounts, ObservationFetcher};
use crate::services::ClimateService;

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReportError {
    #[error("Please select at least one weather station to generate the graph.")]
    NoStations,
    #[error("Please select a species to generate the graph.")]
    MissingSpecies,
    #[error("Failed to retrieve weather data.")]
    ClimateUnavailable,
}

/// Climate and observation series as parallel Jan..Dec arrays
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GraphReport {
    pub months: Vec<String>,
    pub temperature: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub observations: Vec<u64>,
    pub total_obs: u64,
}

/// One month of the outer join; a side is `None` when it had no row for the month
#[derive(Default)]
struct JoinedMonth {
    climate: Option<ClimateMonth>,
    observations: Option<u64>,
}

/// Outer-joins climate and observation counts on month.
///
/// Inside the join a missing value becomes 0. In the output a month without a
/// climate row stays `null` for temperature and precipitation, while a month
/// without an observation row reports 0 observations.
pub fn merge_monthly(
    climate: &ClimateSeries,
    observations: &MonthlyCounts,
    total_obs: u64,
) -> GraphReport {
    let mut joined: BTreeMap<u32, JoinedMonth> = BTreeMap::new();
    for (month, values) in climate.months() {
        joined.entry(month).or_default().climate = Some(*values);
    }
    for (month, count) in observations {
        joined.entry(*month).or_default().observations = Some(*count);
    }

    let mut temperature = Vec::with_capacity(12);
    let mut precipitation = Vec::with_capacity(12);
    let mut observation_counts = Vec::with_capacity(12);

    for month in 1..=12 {
        let row = joined.get(&month);
        match row.and_then(|row| row.climate) {
            Some(values) => {
                temperature.push(Some(values.tavg.unwrap_or(0.0)));
                precipitation.push(Some(values.prcp.unwrap_or(0.0)));
            }
            None => {
                temperature.push(None);
                precipitation.push(None);
            }
        }
        observation_counts.push(row.and_then(|row| row.observations).unwrap_or(0));
    }

    GraphReport {
        months: MONTH_LABELS.iter().map(|label| label.to_string()).collect(),
        temperature,
        precipitation,
        observations: observation_counts,
        total_obs,
    }
}

#[derive(Clone)]
pub struct ReportService {
    climate: ClimateService,
    observations: ObservationFetcher,
}

impl ReportService {
    pub fn new(climate: ClimateService, observations: ObservationFetcher) -> Self {
        Self {
            climate,
            observations,
        }
    }

    /// Climate normals for the selected stations next to monthly observation counts
    #[instrument(skip(self, station_ids), fields(stations = station_ids.len()))]
    pub async fn generate_graph(
        &self,
        species: &str,
        station_ids: &[String],
        force: bool,
    ) -> Result<GraphReport, ReportError> {
        if station_ids.is_empty() {
            return Err(ReportError::NoStations);
        }
        if species.trim().is_empty() {
            return Err(ReportError::MissingSpecies);
        }

        let climate = self
            .climate
            .combine_station_climate(station_ids)
            .await
            .ok_or(ReportError::ClimateUnavailable)?;

        let observation_set = self.observations.fetch_all(species, force).await;
        let counts = aggregate_by_month(&observation_set.records);

        info!(
            "Built graph for {} from {} climate months and {} observations",
            species,
            climate.len(),
            observation_set.total_count
        );

        Ok(merge_monthly(&climate, &counts, observation_set.total_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climate_for(months: &[u32]) -> ClimateSeries {
        ClimateSeries::from_months(months.iter().map(|month| {
            (
                *month,
                ClimateMonth {
                    tavg: Some(10.0 + f64::from(*month)),
                    prcp: Some(100.0 * f64::from(*month)),
                },
            )
        }))
    }

    fn counts_for(pairs: &[(u32, u64)]) -> MonthlyCounts {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_partial_climate_and_observations() {
        let report = merge_monthly(&climate_for(&[1, 2, 3]), &counts_for(&[(1, 5), (4, 9)]), 14);

        assert_eq!(report.months.len(), 12);
        assert_eq!(report.temperature.len(), 12);
        assert_eq!(report.precipitation.len(), 12);
        assert_eq!(report.observations.len(), 12);

        // April: observations only
        assert_eq!(report.temperature[3], None);
        assert_eq!(report.precipitation[3], None);
        assert_eq!(report.observations[3], 9);

        // February: climate only
        assert_eq!(report.temperature[1], Some(12.0));
        assert_eq!(report.precipitation[1], Some(200.0));
        assert_eq!(report.observations[1], 0);

        // January: both
        assert_eq!(report.temperature[0], Some(11.0));
        assert_eq!(report.observations[0], 5);

        // December: neither
        assert_eq!(report.temperature[11], None);
        assert_eq!(report.observations[11], 0);

        assert_eq!(report.total_obs, 14);
        assert_eq!(report.months[0], "Jan");
        assert_eq!(report.months[11], "Dec");
    }

    #[test]
    fn test_climate_month_without_values_fills_zero() {
        let climate = ClimateSeries::from_months([(
            6,
            ClimateMonth {
                tavg: None,
                prcp: Some(42.0),
            },
        )]);

        let report = merge_monthly(&climate, &aggregate_by_month(&[]), 0);
        assert_eq!(report.temperature[5], Some(0.0));
        assert_eq!(report.precipitation[5], Some(42.0));
        assert_eq!(report.observations[5], 0);
    }

    #[test]
    fn test_full_observation_vector_keeps_null_climate() {
        let report = merge_monthly(&ClimateSeries::default(), &aggregate_by_month(&[]), 0);

        assert!(report.temperature.iter().all(Option::is_none));
        assert!(report.precipitation.iter().all(Option::is_none));
        assert!(report.observations.iter().all(|count| *count == 0));
    }
}
