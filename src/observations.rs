pub mod aggregator;
pub mod cache;
pub mod fetcher;

pub use aggregator::{aggregate_by_month, MonthlyCounts};
pub use cache::{ObservationCache, ObservationSet};
pub use fetcher::{FetchEvent, ObservationFetcher};
