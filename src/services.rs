pub mod climate_service;
pub mod polygon_service;
pub mod report_service;
pub mod species_service;

pub use climate_service::ClimateService;
pub use polygon_service::{PolygonError, PolygonService};
pub use report_service::{GraphReport, ReportError, ReportService};
pub use species_service::SpeciesService;
