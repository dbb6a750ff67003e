#![allow(dead_code)]

use async_compression::tokio::bufread::GzipEncoder;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

pub const OBSERVATIONS_PATH: &str = "/v1/observations";

/// Gzip `data` the way the Meteostat bulk files are served
pub async fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzipEncoder::new(data);
    let mut compressed = Vec::new();
    encoder
        .read_to_end(&mut compressed)
        .await
        .expect("Failed to gzip fixture");
    compressed
}

/// One observation record per `observed_on` date
pub fn observations(dates: &[&str]) -> Vec<Value> {
    dates
        .iter()
        .enumerate()
        .map(|(i, date)| json!({ "id": i + 1, "observed_on": date }))
        .collect()
}

/// Body of one observations API page
pub fn observation_page(dates: &[&str]) -> String {
    json!({ "results": observations(dates) }).to_string()
}

/// Matches a request for `page` of `species`
pub fn page_query(species: &str, page: u32) -> mockito::Matcher {
    mockito::Matcher::AllOf(vec![
        mockito::Matcher::UrlEncoded("taxon_name".into(), species.into()),
        mockito::Matcher::UrlEncoded("page".into(), page.to_string()),
        mockito::Matcher::UrlEncoded("order".into(), "asc".into()),
        mockito::Matcher::UrlEncoded("verifiable".into(), "true".into()),
    ])
}

/// Monthly rows as stored in the bulk CSV: year,month,tavg,tmin,tmax,prcp,wspd,pres,tsun
pub fn monthly_csv(rows: &[(i32, u32, &str, &str, &str, &str)]) -> String {
    rows.iter()
        .map(|(year, month, tavg, tmin, tmax, prcp)| {
            format!("{year},{month},{tavg},{tmin},{tmax},{prcp},,,\n")
        })
        .collect()
}

pub fn station_inventory() -> String {
    json!([
        {
            "id": "59287",
            "country": "CN",
            "name": { "en": "Guangzhou" },
            "location": { "latitude": 23.2167, "longitude": 113.4833, "elevation": 41 },
            "inventory": { "monthly": { "start": 1951, "end": 2024 } }
        },
        {
            "id": "48327",
            "country": "TH",
            "name": { "en": "Chiang Mai" },
            "location": { "latitude": 18.7833, "longitude": 98.9833, "elevation": 312 },
            "inventory": { "monthly": { "start": 1958, "end": 2023 } }
        },
        {
            "id": "10637",
            "country": "DE",
            "name": { "en": "Frankfurt" },
            "location": { "latitude": 50.05, "longitude": 8.6, "elevation": 111 },
            "inventory": { "monthly": { "start": 1949, "end": 2024 } }
        }
    ])
    .to_string()
}

pub const GECKO_RANGE_WKT: &str = "POLYGON((100 10, 101 10, 101 11, 100 11, 100 10))";

/// Creates a species index database at `path` holding `rows` of (species, shapefile, wkt).
///
/// Returns the read-only URL the service uses to open it.
pub async fn create_species_index(path: &std::path::Path, rows: &[(&str, &str, &str)]) -> String {
    use sqlx::sqlite::SqlitePoolOptions;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("Failed to create species index");

    sqlx::query("CREATE TABLE species_index (species TEXT NOT NULL, shapefile TEXT NOT NULL, wkt TEXT NOT NULL)")
        .execute(&pool)
        .await
        .expect("Failed to create species_index table");

    for (species, shapefile, wkt) in rows {
        sqlx::query("INSERT INTO species_index (species, shapefile, wkt) VALUES (?, ?, ?)")
            .bind(*species)
            .bind(*shapefile)
            .bind(*wkt)
            .execute(&pool)
            .await
            .expect("Failed to insert species_index row");
    }

    pool.close().await;
    format!("sqlite://{}?mode=ro", path.display())
}
