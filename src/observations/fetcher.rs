use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::fetch_error::FetchError;
use crate::observations::cache::{ObservationCache, ObservationSet};

pub const DEFAULT_PAGE_SIZE: usize = 200;
const TOTAL_ENTRIES_HEADER: &str = "X-Total-Entries";

#[derive(Debug, Deserialize)]
struct ObservationPage {
    #[serde(default)]
    results: Vec<Value>,
}

/// Progress notifications emitted while paging through observations.
///
/// `Page` events are followed by exactly one terminal event: `Finished` on a
/// clean run or `Error` when a page failed. A cache hit emits a lone `Cached`.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    Cached(Arc<ObservationSet>),
    Page(u32),
    Error(String),
    Finished(Arc<ObservationSet>),
}

impl FetchEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FetchEvent::Page(_))
    }

    /// Wire form used by the SSE endpoint
    pub fn to_message(&self) -> String {
        match self {
            FetchEvent::Page(page) => page.to_string(),
            FetchEvent::Cached(set) => format!("CACHED|{}", results_json(set)),
            FetchEvent::Finished(set) => format!("FINISHED|{}", results_json(set)),
            FetchEvent::Error(message) => format!("ERROR: {message}"),
        }
    }
}

fn results_json(set: &ObservationSet) -> String {
    json!({ "results": set.records }).to_string()
}

struct PageRun {
    records: Vec<Value>,
    header_total: Option<u64>,
    failure: Option<String>,
}

#[derive(Clone)]
pub struct ObservationFetcher {
    client: reqwest::Client,
    url: String,
    per_page: usize,
    cache: ObservationCache,
}

impl ObservationFetcher {
    pub fn new(url: String, cache: ObservationCache) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            per_page: DEFAULT_PAGE_SIZE,
            cache,
        }
    }

    pub fn with_page_size(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn cache(&self) -> &ObservationCache {
        &self.cache
    }

    /// Returns every observation for `species`, from cache when allowed.
    ///
    /// Network failures cut pagination short; whatever arrived before the
    /// failure is returned and cached.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_all(&self, species: &str, force: bool) -> Arc<ObservationSet> {
        if let Some(cached) = self.cache.lookup(species, force) {
            debug!("Returning cached observations for {}", species);
            return cached;
        }

        let run = self.paginate(species, |_| {}).await;
        if let Some(failure) = &run.failure {
            warn!("Observation fetch for {} truncated: {}", species, failure);
        }

        self.finish(species, run)
    }

    /// Same as [`fetch_all`](Self::fetch_all) but reports each page through `emit`
    #[instrument(skip(self, emit), fields(url = %self.url))]
    pub async fn fetch_with_progress<F>(&self, species: &str, force: bool, mut emit: F)
    where
        F: FnMut(FetchEvent),
    {
        if let Some(cached) = self.cache.lookup(species, force) {
            debug!("Streaming cached observations for {}", species);
            emit(FetchEvent::Cached(cached));
            return;
        }

        let run = self
            .paginate(species, |page| emit(FetchEvent::Page(page)))
            .await;
        let failure = run.failure.clone();
        let set = self.finish(species, run);

        match failure {
            Some(message) => {
                warn!("Streaming fetch for {} failed: {}", species, message);
                emit(FetchEvent::Error(message));
            }
            None => emit(FetchEvent::Finished(set)),
        }
    }

    fn finish(&self, species: &str, run: PageRun) -> Arc<ObservationSet> {
        let total_count = run
            .header_total
            .filter(|total| *total > 0)
            .unwrap_or(run.records.len() as u64);

        let set = Arc::new(ObservationSet {
            records: run.records,
            total_count,
        });
        self.cache.store(species, Arc::clone(&set));
        set
    }

    async fn paginate<F>(&self, species: &str, mut on_page: F) -> PageRun
    where
        F: FnMut(u32),
    {
        let started = Instant::now();
        let mut run = PageRun {
            records: Vec::new(),
            header_total: None,
            failure: None,
        };
        let mut page: u32 = 1;

        debug!("Starting observation pagination for {}", species);

        loop {
            let (results, header_total) = match self.fetch_page(species, page).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    run.failure = Some(format!("Failed to fetch page {page}: {e}"));
                    break;
                }
            };

            if page == 1 {
                debug!("{} header: {:?}", TOTAL_ENTRIES_HEADER, header_total);
                run.header_total = header_total;
            }

            let count = results.len();
            debug!("Fetched {} observations on page {}", count, page);
            on_page(page);

            if count == 0 {
                break;
            }
            run.records.extend(results);
            if count < self.per_page {
                break;
            }
            page += 1;
        }

        info!(
            "Fetched {} observations for {} over {} page(s) in {:.2?}",
            run.records.len(),
            species,
            page,
            started.elapsed()
        );

        run
    }

    async fn fetch_page(
        &self,
        species: &str,
        page: u32,
    ) -> Result<(Vec<Value>, Option<u64>), FetchError> {
        let per_page = self.per_page.to_string();
        let page_number = page.to_string();

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("taxon_name", species),
                ("per_page", per_page.as_str()),
                ("order", "asc"),
                ("verifiable", "true"),
                ("page", page_number.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let header_total = response
            .headers()
            .get(TOTAL_ENTRIES_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        let body = response.bytes().await?;
        let parsed: ObservationPage = serde_json::from_slice(&body)?;

        Ok((parsed.results, header_total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_with(records: Vec<Value>) -> Arc<ObservationSet> {
        let total_count = records.len() as u64;
        Arc::new(ObservationSet {
            records,
            total_count,
        })
    }

    #[test]
    fn test_page_message_is_page_number() {
        assert_eq!(FetchEvent::Page(3).to_message(), "3");
        assert!(!FetchEvent::Page(3).is_terminal());
    }

    #[test]
    fn test_finished_message_carries_results() {
        let event = FetchEvent::Finished(set_with(vec![json!({"id": 1})]));
        assert!(event.is_terminal());

        let message = event.to_message();
        let payload = message.strip_prefix("FINISHED|").unwrap();
        let parsed: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed["results"][0]["id"], 1);
    }

    #[test]
    fn test_cached_and_error_messages() {
        let cached = FetchEvent::Cached(set_with(vec![])).to_message();
        assert_eq!(cached, r#"CACHED|{"results":[]}"#);

        let error = FetchEvent::Error("Failed to fetch page 2: boom".to_string());
        assert!(error.is_terminal());
        assert_eq!(error.to_message(), "ERROR: Failed to fetch page 2: boom");
    }

    #[test]
    fn test_page_size_never_zero() {
        let fetcher = ObservationFetcher::new("".to_string(), ObservationCache::new())
            .with_page_size(0);
        assert_eq!(fetcher.per_page, 1);
    }
}
