use async_compression::tokio::bufread::GzipDecoder;
use chrono::NaiveDate;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{debug, info, instrument, warn};

use crate::fetch_error::FetchError;

pub const DEFAULT_BULK_URL: &str = "https://bulk.meteostat.net/v2";

/// One month of one station, as published in the Meteostat monthly bulk file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRecord {
    pub year: i32,
    pub month: u32,
    /// Average air temperature (°C), derived from min/max when not reported
    pub tavg: Option<f64>,
    /// Precipitation total (mm)
    pub prcp: Option<f64>,
}

// Columns of the headerless monthly CSV:
// year,month,tavg,tmin,tmax,prcp,wspd,pres,tsun
const COL_YEAR: usize = 0;
const COL_MONTH: usize = 1;
const COL_TAVG: usize = 2;
const COL_TMIN: usize = 3;
const COL_TMAX: usize = 4;
const COL_PRCP: usize = 5;

/// Station entry of the Meteostat `stations/lite.json.gz` inventory
#[derive(Debug, Clone, Deserialize)]
pub struct MeteostatStation {
    pub id: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub name: HashMap<String, String>,
    pub location: StationLocation,
    #[serde(default)]
    pub inventory: StationInventory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationInventory {
    #[serde(default)]
    pub monthly: YearRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YearRange {
    pub start: Option<i32>,
    pub end: Option<i32>,
}

impl MeteostatStation {
    /// English name when available, otherwise any published name
    pub fn display_name(&self) -> String {
        self.name
            .get("en")
            .or_else(|| self.name.values().next())
            .cloned()
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Clone)]
pub struct MeteostatClient {
    client: reqwest::Client,
    base_url: String,
}

impl Default for MeteostatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MeteostatClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BULK_URL.to_string())
    }

    /// Points the client at another bulk mirror (used by tests)
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Monthly rows for a station whose first-of-month date lies in `[start, end]`
    #[instrument(skip(self))]
    pub async fn fetch_monthly(
        &self,
        station_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MonthlyRecord>, FetchError> {
        if station_id.is_empty() || !station_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FetchError::InvalidStation(station_id.to_string()));
        }

        let url = format!("{}/monthly/{}.csv.gz", self.base_url, station_id);
        let csv_bytes = self.download_gzip(&url).await?;
        let records = parse_monthly_csv(&csv_bytes, start, end)?;

        info!(
            "Loaded {} monthly records for station {} ({} to {})",
            records.len(),
            station_id,
            start,
            end
        );
        Ok(records)
    }

    #[instrument(skip(self))]
    pub async fn fetch_stations(&self) -> Result<Vec<MeteostatStation>, FetchError> {
        let url = format!("{}/stations/lite.json.gz", self.base_url);
        let json_bytes = self.download_gzip(&url).await?;

        let stations: Vec<MeteostatStation> = serde_json::from_slice(&json_bytes)?;
        info!("Parsed {} stations from Meteostat inventory", stations.len());
        Ok(stations)
    }

    async fn download_gzip(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Downloading {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {} for {}", status, url);
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut decoder = GzipDecoder::new(BufReader::new(StreamReader::new(stream)));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).await?;

        debug!("Decompressed {} bytes from {}", decompressed.len(), url);
        Ok(decompressed)
    }
}

/// Parses the headerless Meteostat monthly CSV, keeping rows inside the date range
pub fn parse_monthly_csv(
    bytes: &[u8],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<MonthlyRecord>, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;

        let (Some(year), Some(month)) = (
            optional_number::<i32>(row.get(COL_YEAR)),
            optional_number::<u32>(row.get(COL_MONTH)),
        ) else {
            return Err(FetchError::Csv(csv::Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("row without year/month: {:?}", row),
            ))));
        };

        let Some(first_of_month) = NaiveDate::from_ymd_opt(year, month, 1) else {
            warn!("Skipping monthly row with invalid date {}-{}", year, month);
            continue;
        };
        if first_of_month < start || first_of_month > end {
            continue;
        }

        let tavg = optional_number::<f64>(row.get(COL_TAVG)).or_else(|| {
            match (
                optional_number::<f64>(row.get(COL_TMIN)),
                optional_number::<f64>(row.get(COL_TMAX)),
            ) {
                (Some(tmin), Some(tmax)) => Some((tmin + tmax) / 2.0),
                _ => None,
            }
        });

        records.push(MonthlyRecord {
            year,
            month,
            tavg,
            prcp: optional_number::<f64>(row.get(COL_PRCP)),
        });
    }

    Ok(records)
}

fn optional_number<T: std::str::FromStr>(field: Option<&str>) -> Option<T> {
    field
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}
