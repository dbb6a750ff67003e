use geojson::{Feature, FeatureCollection, JsonObject};
use wkt::TryFromWkt;

/// Object-storage key for a species: trimmed, lowercased, spaces to underscores
pub fn normalize_species_key(species: &str) -> String {
    species.trim().to_lowercase().replace(' ', "_")
}

/// Parses a WKT string into a GeoJSON geometry
pub fn wkt_to_geometry(wkt_text: &str) -> Result<geojson::Geometry, String> {
    let geometry: geo_types::Geometry<f64> =
        geo_types::Geometry::try_from_wkt_str(wkt_text).map_err(|e| e.to_string())?;
    Ok(geojson::Geometry::new(geojson::Value::from(&geometry)))
}

pub fn feature(geometry: geojson::Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
