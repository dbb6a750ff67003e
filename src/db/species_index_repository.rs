use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, instrument};

use crate::db::{DbError, SpeciesIndexEntry};

#[derive(Clone)]
pub struct SpeciesIndexRepository {
    pool: SqlitePool,
}

impl SpeciesIndexRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the index lazily so a missing database file surfaces per query
    pub fn connect_lazy(database_url: &str) -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }

    /// Rows whose species matches case-insensitively
    #[instrument(skip(self))]
    pub async fn find_by_species(&self, species: &str) -> Result<Vec<SpeciesIndexEntry>, DbError> {
        let normalized = species.trim().to_lowercase();
        debug!("Querying species index for '{}'", normalized);

        let rows = sqlx::query_as::<_, SpeciesIndexEntry>(
            r#"
            SELECT shapefile, wkt
            FROM species_index
            WHERE LOWER(species) = ?
            ORDER BY shapefile
            "#,
        )
        .bind(&normalized)
        .fetch_all(&self.pool)
        .await?;

        debug!("Species index returned {} rows", rows.len());
        Ok(rows)
    }

    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM species_index")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
