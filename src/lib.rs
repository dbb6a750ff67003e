pub mod api;
pub mod api_error;
pub mod app;
pub mod climate;
pub mod config;
pub mod db;
pub mod fetch_error;
pub mod observations;
pub mod polygons;
pub mod services;
pub mod species;
pub mod stations;
