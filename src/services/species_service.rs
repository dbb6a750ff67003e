use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::species::{load_herp_orders, HerpOrders, SpeciesCatalog, Suggestion, MIN_QUERY_LEN};

#[derive(Clone)]
pub struct SpeciesService {
    species_dir: PathBuf,
    species_csv: PathBuf,
    orders: Arc<HerpOrders>,
}

impl SpeciesService {
    /// Reads the order lists once; suggestion sources are re-read per query
    pub fn load(species_dir: PathBuf, species_csv: PathBuf) -> Self {
        let orders = load_herp_orders(&species_dir);
        info!(
            "Loaded {} herp orders ({} species)",
            orders.len(),
            orders.values().map(Vec::len).sum::<usize>()
        );

        Self {
            species_dir,
            species_csv,
            orders: Arc::new(orders),
        }
    }

    pub fn orders(&self) -> Arc<HerpOrders> {
        Arc::clone(&self.orders)
    }

    pub async fn suggestions(&self, query: &str) -> Result<Vec<Suggestion>, tokio::task::JoinError> {
        if query.trim().chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let species_dir = self.species_dir.clone();
        let species_csv = self.species_csv.clone();
        let query = query.to_string();

        let suggestions = tokio::task::spawn_blocking(move || {
            SpeciesCatalog::load(&species_dir, &species_csv).suggestions(&query)
        })
        .await?;

        debug!("Found {} suggestions", suggestions.len());
        Ok(suggestions)
    }
}
