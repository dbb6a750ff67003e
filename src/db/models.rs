use serde::Serialize;
use sqlx::FromRow;

/// Row of the read-only `species_index` table
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SpeciesIndexEntry {
    pub shapefile: String,
    pub wkt: String,
}
