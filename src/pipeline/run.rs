// src/pipeline/run.rs

//! Scrape run orchestration.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::extract::{self, PageContext};
use crate::fetch::{Fetcher, PageSource};
use crate::models::{Config, FetchOutcome, NormalizationOutcome, PageType, RunSummary};
use crate::normalize::{Normalizer, resolver_from_config};
use crate::paginate::{PaginationOutcome, Paginator};
use crate::parse::parse_document;
use crate::store::RecordStore;

/// Everything a run produced, for printing, file output or exit codes.
#[derive(Debug)]
pub struct RunReport {
    pub page_type: PageType,
    pub url: String,
    pub summary: RunSummary,
    pub outcomes: Vec<NormalizationOutcome>,
}

/// One scrape pipeline instance.
///
/// Owns its fetcher (and with it all rate-limit and cache state), so
/// multiple pipelines never share ambient globals. Safe to re-invoke:
/// persistence is idempotent per natural key.
pub struct Pipeline {
    config: Arc<Config>,
    source: Arc<dyn PageSource>,
    normalizer: Normalizer,
    store: Option<Arc<dyn RecordStore>>,
}

impl Pipeline {
    /// Build a pipeline with the production fetcher and the configured
    /// LLM resolver. No storage until `with_store` is called.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        let resolver = resolver_from_config(&config)?;
        Ok(Self {
            config,
            source: Arc::new(fetcher),
            normalizer: Normalizer::new(resolver),
            store: None,
        })
    }

    /// Build a pipeline over an arbitrary page source (tests).
    pub fn with_source(
        config: Arc<Config>,
        source: Arc<dyn PageSource>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            config,
            source,
            normalizer,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Run the pipeline for one page type.
    ///
    /// The run deadline cancels any fetch still in flight; already
    /// persisted records are unaffected.
    pub async fn run(&self, page_type: PageType, url: &str) -> Result<RunReport> {
        let cancel = CancellationToken::new();
        let watchdog = {
            let token = cancel.clone();
            let deadline = Duration::from_secs(self.config.http.run_timeout_secs);
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                log::warn!("run deadline reached; cancelling in-flight fetches");
                token.cancel();
            })
        };

        let result = if page_type.is_aggregator() {
            self.run_aggregator(page_type, url, &cancel).await
        } else {
            self.run_detail(page_type, url, &cancel).await
        };

        watchdog.abort();
        result
    }

    async fn run_aggregator(
        &self,
        page_type: PageType,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let mut summary = RunSummary::default();
        let mut outcomes = Vec::new();

        let paginator = Paginator::new(self.source.as_ref(), self.config.scrape.max_pages);
        let listing = match paginator.run(page_type, url, cancel).await? {
            PaginationOutcome::NotModified => {
                log::info!("{url} unchanged since last fetch; reusing stored record");
                if let Some(stored) = self.stored_for(url).await {
                    summary.record_success(&[]);
                    outcomes.push(stored);
                } else {
                    summary.record_success(&["listing unchanged but no stored copy found".into()]);
                }
                return Ok(RunReport {
                    page_type,
                    url: url.to_string(),
                    summary,
                    outcomes,
                });
            }
            PaginationOutcome::Listing(listing) => listing,
        };

        log::info!(
            "{} items merged from {} page(s) of {}",
            listing.record.items.len(),
            listing.pages_fetched,
            url
        );

        let detail_urls: Vec<String> = listing
            .record
            .items
            .iter()
            .map(|i| i.detail_url.clone())
            .take(self.config.scrape.max_details)
            .collect();

        let extracted = extract::Extracted {
            record: crate::models::Record::Aggregator(listing.record),
            warnings: listing.warnings,
        };
        let outcome = self.normalizer.normalize(extracted).await;
        match self.persist(&outcome).await {
            Ok(()) => summary.record_success(&outcome.warnings),
            Err(error) => {
                log::error!("failed to persist listing from {url}: {error}");
                summary.record_failure(url, &error);
            }
        }
        outcomes.push(outcome);

        if self.config.scrape.follow_details {
            if let Some(detail_type) = page_type.detail_type() {
                let detail_summary = self
                    .follow_details(detail_type, &detail_urls, cancel, &mut outcomes)
                    .await;
                summary.absorb(detail_summary);
            }
        }

        Ok(RunReport {
            page_type,
            url: url.to_string(),
            summary,
            outcomes,
        })
    }

    /// Fetch linked detail pages concurrently; sibling failures stay
    /// independent.
    async fn follow_details(
        &self,
        detail_type: PageType,
        urls: &[String],
        cancel: &CancellationToken,
        outcomes: &mut Vec<NormalizationOutcome>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        let mut results = stream::iter(urls)
            .map(|detail_url| async move {
                let result = self.process_one(detail_type, detail_url, cancel).await;
                (detail_url, result)
            })
            .buffered(self.config.http.concurrent_jobs.max(1));

        while let Some((detail_url, result)) = results.next().await {
            match result {
                Ok(Some(outcome)) => {
                    summary.record_success(&outcome.warnings);
                    outcomes.push(outcome);
                }
                Ok(None) => summary.record_success(&[]),
                Err(error) => {
                    log::warn!("detail fetch failed for {detail_url}: {error}");
                    summary.record_failure(detail_url.as_str(), &error);
                }
            }
        }

        summary
    }

    async fn run_detail(
        &self,
        page_type: PageType,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let mut summary = RunSummary::default();
        let mut outcomes = Vec::new();

        match self.process_one(page_type, url, cancel).await? {
            Some(outcome) => {
                summary.record_success(&outcome.warnings);
                outcomes.push(outcome);
            }
            None => summary.record_success(&[]),
        }

        Ok(RunReport {
            page_type,
            url: url.to_string(),
            summary,
            outcomes,
        })
    }

    /// Fetch, extract, normalize and persist a single page.
    ///
    /// Returns None when a 304 had no stored counterpart to reuse.
    async fn process_one(
        &self,
        page_type: PageType,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<NormalizationOutcome>> {
        let page = match self.source.fetch(url, cancel).await? {
            FetchOutcome::Fetched(page) => page,
            FetchOutcome::NotModified => {
                log::info!("{url} unchanged since last fetch; reusing stored record");
                return Ok(self.stored_for(url).await);
            }
        };

        let doc = parse_document(&page.body, &page.url)?;
        let extracted = extract::extract(page_type, &doc, PageContext::from_fetch(&page))?;
        let outcome = self.normalizer.normalize(extracted).await;
        self.persist(&outcome).await?;

        Ok(Some(outcome))
    }

    async fn stored_for(&self, url: &str) -> Option<NormalizationOutcome> {
        let store = self.store.as_ref()?;
        match store.find_by_source_url(url).await {
            Ok(Some(stored)) => Some(NormalizationOutcome {
                record: stored.record,
                confidence: stored.confidence,
                warnings: vec![],
            }),
            Ok(None) => None,
            Err(e) => {
                log::warn!("stored-record lookup failed for {url}: {e}");
                None
            }
        }
    }

    async fn persist(&self, outcome: &NormalizationOutcome) -> Result<()> {
        if let Some(store) = &self.store {
            store.upsert(outcome).await?;
        }
        Ok(())
    }
}
