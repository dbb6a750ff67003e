#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Upstream returned status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("Failed to decompress response: {0}")]
    Decompress(#[from] std::io::Error),
    #[error("Failed to parse CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to parse JSON data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid station id: {0}")]
    InvalidStation(String),
}

impl FetchError {
    /// True when the upstream answered but had nothing for the request
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if *status == reqwest::StatusCode::NOT_FOUND)
    }

    /// True when the upstream payload arrived but could not be interpreted
    pub fn is_malformed(&self) -> bool {
        matches!(self, FetchError::Csv(_) | FetchError::Json(_))
    }
}
