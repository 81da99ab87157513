//! End-to-end pipeline tests over an in-memory page source and store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use sarkari_crawler::error::{AppError, FetchError, Result};
use sarkari_crawler::fetch::PageSource;
use sarkari_crawler::models::{Config, FetchOutcome, PageFetchResult, PageType, Record};
use sarkari_crawler::normalize::Normalizer;
use sarkari_crawler::pipeline::Pipeline;
use sarkari_crawler::store::{QueryFilter, RecordStore, SqliteStore};

/// Serves each URL once, then answers 304 for it, like a server backed
/// by stable ETags.
struct ConditionalStub {
    pages: HashMap<String, String>,
    served: Mutex<HashSet<String>>,
}

impl ConditionalStub {
    fn new(pages: &[(&str, String)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(u, b)| (u.to_string(), b.clone()))
                .collect(),
            served: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl PageSource for ConditionalStub {
    async fn fetch(&self, url: &str, _cancel: &CancellationToken) -> Result<FetchOutcome> {
        let Some(body) = self.pages.get(url) else {
            return Err(AppError::Fetch(FetchError::ClientError {
                url: url.to_string(),
                status: 404,
            }));
        };

        let mut served = self.served.lock().unwrap();
        if !served.insert(url.to_string()) {
            return Ok(FetchOutcome::NotModified);
        }

        Ok(FetchOutcome::Fetched(PageFetchResult {
            url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
            body: body.clone(),
            etag: Some("\"v1\"".into()),
            last_modified: None,
            fetched_at: Utc::now(),
        }))
    }
}

fn jobs_listing() -> String {
    r#"
    <h1>Latest Jobs</h1>
    <div class="entry-content">
        <ul>
            <li><a href="https://example.com/up-police/">UP Police Constable Recruitment 2026</a> Last Date: 15 January 2026</li>
            <li><a href="https://example.com/broken-notice/">Broken Notice 2026</a></li>
        </ul>
    </div>
    "#
    .to_string()
}

fn recruitment_detail() -> String {
    r#"
    <h1>UP Police Constable Recruitment 2026</h1>
    <table>
        <tr><td>Organization</td><td>UPPRPB</td></tr>
        <tr><td>Advt No.</td><td>05/2026</td></tr>
    </table>
    <h2>Important Dates</h2>
    <table><tr><td>Last Date</td><td>15-01-2026</td></tr></table>
    <h2>Vacancy Details</h2>
    <table>
        <tr><th>Post Name</th><th>Total</th></tr>
        <tr><td>Constable</td><td>60244</td></tr>
    </table>
    <a href="/apply/">Apply Online</a>
    "#
    .to_string()
}

fn pipeline_under_test(
    stub: Arc<ConditionalStub>,
    store: Arc<SqliteStore>,
    follow_details: bool,
) -> Pipeline {
    let mut config = Config::default();
    config.scrape.follow_details = follow_details;
    Pipeline::with_source(Arc::new(config), stub, Normalizer::deterministic_only())
        .with_store(store)
}

#[tokio::test]
async fn test_aggregator_run_with_details_and_partial_failure() {
    let stub = Arc::new(ConditionalStub::new(&[
        ("https://example.com/latest-jobs/", jobs_listing()),
        ("https://example.com/up-police/", recruitment_detail()),
        // broken-notice has no vacancy table
        (
            "https://example.com/broken-notice/",
            "<h1>Broken</h1><p>template changed</p>".to_string(),
        ),
    ]));
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let pipeline = pipeline_under_test(stub, Arc::clone(&store), true);

    let report = pipeline
        .run(PageType::Jobs, "https://example.com/latest-jobs/")
        .await
        .unwrap();

    // listing + one good detail; the broken sibling fails independently
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.failures[0].kind, "structure_mismatch");
    assert!(report.summary.failures[0].url.contains("broken-notice"));

    let stored = store.query(&QueryFilter::default(), 10).await.unwrap();
    assert_eq!(stored.len(), 2);

    let recruitment = store
        .find_by_natural_key("recruitment:upprpb|05/2026")
        .await
        .unwrap()
        .expect("recruitment row persisted under its natural key");
    let Record::Recruitment(detail) = recruitment.record else {
        panic!("expected recruitment record");
    };
    assert_eq!(detail.vacancies[0].count, Some(60244));
}

#[tokio::test]
async fn test_not_modified_reuses_stored_record() {
    let stub = Arc::new(ConditionalStub::new(&[(
        "https://example.com/latest-jobs/",
        jobs_listing(),
    )]));
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let pipeline = pipeline_under_test(stub, Arc::clone(&store), false);

    let first = pipeline
        .run(PageType::Jobs, "https://example.com/latest-jobs/")
        .await
        .unwrap();
    let second = pipeline
        .run(PageType::Jobs, "https://example.com/latest-jobs/")
        .await
        .unwrap();

    // the 304 path must yield the same extraction as the cached run
    let Record::Aggregator(fresh) = &first.outcomes[0].record else {
        panic!("expected aggregator record");
    };
    let Record::Aggregator(reused) = &second.outcomes[0].record else {
        panic!("expected aggregator record");
    };
    assert_eq!(fresh.items, reused.items);
    assert_eq!(fresh.source_url, reused.source_url);
    assert_eq!(second.summary.failed, 0);

    // still a single stored row
    let stored = store.query(&QueryFilter::default(), 10).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_rerun_is_idempotent_in_storage() {
    let make_stub = || {
        Arc::new(ConditionalStub::new(&[
            ("https://example.com/latest-jobs/", jobs_listing()),
            ("https://example.com/up-police/", recruitment_detail()),
            (
                "https://example.com/broken-notice/",
                "<h1>Broken</h1>".to_string(),
            ),
        ]))
    };
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());

    // two overlapping runs with fresh fetches each time
    for _ in 0..2 {
        let pipeline = pipeline_under_test(make_stub(), Arc::clone(&store), true);
        pipeline
            .run(PageType::Jobs, "https://example.com/latest-jobs/")
            .await
            .unwrap();
    }

    let stored = store.query(&QueryFilter::default(), 10).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_first_page_fetch_failure_aborts_run() {
    let stub = Arc::new(ConditionalStub::new(&[]));
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let pipeline = pipeline_under_test(stub, store, false);

    let err = pipeline
        .run(PageType::Jobs, "https://example.com/latest-jobs/")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "client_error");
}
