pub mod geometry;
pub mod remote_store;
pub mod shapefile_source;

pub use geometry::{normalize_species_key, wkt_to_geometry};
pub use remote_store::RemotePolygonStore;
pub use shapefile_source::ShapefileSource;
