pub mod meteostat_client;
pub mod series;

pub use meteostat_client::{MeteostatClient, MeteostatStation, MonthlyRecord};
pub use series::{ClimateMonth, ClimateSeries};
