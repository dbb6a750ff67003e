#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Species index error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
