pub mod error;
pub mod models;
pub mod species_index_repository;

pub use error::DbError;
pub use models::*;
pub use species_index_repository::SpeciesIndexRepository;
