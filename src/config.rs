use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;

const DEFAULT_INAT_API_URL: &str = "https://api.inaturalist.org/v1/observations";
const DEFAULT_METEOSTAT_BULK_URL: &str = "https://bulk.meteostat.net/v2";
const DEFAULT_POLYGON_BASE_URL: &str =
    "https://pub-24f3dc7f88d741309e78eb1352612cfd.r2.dev/polygon_export/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid YYYY-MM-DD date: {value}")]
    InvalidDate { var: &'static str, value: String },
    #[error("CLIMATE_START_DATE ({start}) is after CLIMATE_END_DATE ({end})")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub inat_api_url: String,
    pub inat_page_size: usize,
    pub meteostat_bulk_url: String,
    pub polygon_base_url: String,
    pub species_dir: PathBuf,
    pub species_csv: PathBuf,
    pub iucn_shapefile_dir: PathBuf,
    pub species_index_url: String,
    pub climate_start: NaiveDate,
    pub climate_end: NaiveDate,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let climate_start = date_var("CLIMATE_START_DATE", "2015-01-01")?;
        let climate_end = date_var("CLIMATE_END_DATE", "2025-04-01")?;
        if climate_start > climate_end {
            return Err(ConfigError::InvertedDateRange {
                start: climate_start,
                end: climate_end,
            });
        }

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            inat_api_url: env::var("INAT_API_URL")
                .unwrap_or_else(|_| DEFAULT_INAT_API_URL.to_string()),
            inat_page_size: env::var("INAT_PAGE_SIZE")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .ok()
                .filter(|size| *size > 0)
                .unwrap_or(200),
            meteostat_bulk_url: env::var("METEOSTAT_BULK_URL")
                .unwrap_or_else(|_| DEFAULT_METEOSTAT_BULK_URL.to_string()),
            polygon_base_url: env::var("POLYGON_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_POLYGON_BASE_URL.to_string()),
            species_dir: env::var("SPECIES_DIR")
                .unwrap_or_else(|_| "species_files".to_string())
                .into(),
            species_csv: env::var("SPECIES_CSV")
                .unwrap_or_else(|_| "all_reptiles_world.csv".to_string())
                .into(),
            iucn_shapefile_dir: env::var("IUCN_SHAPEFILE_DIR")
                .unwrap_or_else(|_| "IUCN_files/reptilia_polygon".to_string())
                .into(),
            species_index_url: env::var("SPECIES_INDEX_URL")
                .unwrap_or_else(|_| "sqlite://species_index.db?mode=ro".to_string()),
            climate_start,
            climate_end,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn date_var(var: &'static str, default: &str) -> Result<NaiveDate, ConfigError> {
    let value = env::var(var).unwrap_or_else(|_| default.to_string());
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_when_env_unset() {
        for var in ["SERVER_PORT", "INAT_PAGE_SIZE", "CLIMATE_START_DATE", "CLIMATE_END_DATE"] {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.server_port, 5000);
        assert_eq!(config.inat_page_size, 200);
        assert_eq!(config.climate_start, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(config.climate_end, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(config.server_addr(), format!("{}:5000", config.server_host));
    }

    #[test]
    #[serial]
    fn test_invalid_date_is_rejected() {
        env::set_var("CLIMATE_START_DATE", "2015/01/01");
        let result = Config::from_env();
        env::remove_var("CLIMATE_START_DATE");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDate { var: "CLIMATE_START_DATE", .. })
        ));
    }

    #[test]
    #[serial]
    fn test_zero_page_size_falls_back() {
        env::set_var("INAT_PAGE_SIZE", "0");
        let config = Config::from_env().unwrap();
        env::remove_var("INAT_PAGE_SIZE");

        assert_eq!(config.inat_page_size, 200);
    }
}
