//! Pipeline tests against an in-memory site
//!
//! The page source here is a map from address to page body, so these tests
//! exercise ordering, deduplication, backpressure and shutdown without any
//! network in the way.

use async_trait::async_trait;
use ripple_loop::crawler::{LinkParser, OverflowPolicy, PageSource, Pipeline, PipelineSettings};
use ripple_loop::output::CrawlOutcome;
use ripple_loop::state::CrawlPhase;
use ripple_loop::url::StandardResolver;
use ripple_loop::FetchError;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// An in-memory site that records every fetch
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, Result<String, FetchError>>,
    /// Addresses whose fetch never returns
    hanging: HashSet<String>,
    /// Addresses whose fetch takes this long
    slow: HashMap<String, Duration>,
    log: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSite {
    fn page(mut self, address: &str, links: &[&str]) -> Self {
        let body: String = links
            .iter()
            .map(|link| format!(r#"<a href="{}">link</a>"#, link))
            .collect();
        self.pages
            .insert(address.to_string(), Ok(format!("<html><body>{}</body></html>", body)));
        self
    }

    fn failing(mut self, address: &str, error: FetchError) -> Self {
        self.pages.insert(address.to_string(), Err(error));
        self
    }

    fn hanging(mut self, address: &str) -> Self {
        self.hanging.insert(address.to_string());
        self
    }

    fn slow(mut self, address: &str, delay: Duration) -> Self {
        self.slow.insert(address.to_string(), delay);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for FakeSite {
    async fn fetch(&self, address: &str) -> Result<String, FetchError> {
        self.log.lock().unwrap().push(address.to_string());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.hanging.contains(address) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.slow.get(address) {
            tokio::time::sleep(*delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.pages
            .get(address)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Status(404)))
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        frontier_capacity: 100,
        max_duration: Some(Duration::from_secs(10)),
        ..PipelineSettings::default()
    }
}

fn seeds(addresses: &[&str]) -> Vec<String> {
    addresses.iter().map(|a| a.to_string()).collect()
}

#[tokio::test]
async fn test_seeds_without_links_are_fetched_in_order() {
    let site = Arc::new(
        FakeSite::default()
            .page("http://a/", &[])
            .page("http://b/", &[]),
    );

    let report = Pipeline::new(settings(), site.clone())
        .run(seeds(&["http://a/", "http://b/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.visited, vec!["http://a/", "http://b/"]);
    assert_eq!(site.fetched(), vec!["http://a/", "http://b/"]);
    assert_eq!(report.pages_parsed, 2);
    assert_eq!(report.links_found, 0);
}

#[tokio::test]
async fn test_relative_and_self_links() {
    let site = Arc::new(
        FakeSite::default()
            .page("http://a/", &["b", "http://a/"])
            .page("http://a/b", &[]),
    );

    let report = Pipeline::new(settings(), site.clone())
        .run(seeds(&["http://a/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.visited, vec!["http://a/", "http://a/b"]);
    assert_eq!(site.fetched(), vec!["http://a/", "http://a/b"]);
    assert_eq!(report.links_found, 2);
    assert_eq!(report.duplicates, 1);
}

#[tokio::test]
async fn test_failed_fetch_does_not_stop_the_crawl() {
    let site = Arc::new(
        FakeSite::default()
            .failing("http://down/", FetchError::Status(503))
            .page("http://a/", &["c"])
            .page("http://a/c", &["http://down/"]),
    );

    let report = Pipeline::new(settings(), site.clone())
        .run(seeds(&["http://down/", "http://a/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.fetched, vec!["http://a/", "http://a/c"]);
    assert_eq!(report.fetch_failures.len(), 1);
    assert_eq!(report.fetch_failures[0].address, "http://down/");
    assert_eq!(report.retryable_failures(), 1);

    // Rediscovery does not schedule it again
    assert_eq!(
        site.fetched()
            .iter()
            .filter(|a| a.as_str() == "http://down/")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_cyclic_site_fetches_each_page_once() {
    let site = Arc::new(
        FakeSite::default()
            .page("http://a/", &["http://b/", "http://c/"])
            .page("http://b/", &["http://a/", "http://c/"])
            .page("http://c/", &["http://a/", "http://b/", "http://d/"])
            .page("http://d/", &["http://a/"]),
    );

    let report = Pipeline::new(settings(), site.clone())
        .run(seeds(&["http://a/", "http://a/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(
        site.fetched(),
        vec!["http://a/", "http://b/", "http://c/", "http://d/"]
    );
    assert_eq!(report.visited.len(), 4);
    assert_eq!(report.enqueued, 4);
    // One duplicate seed plus five links back into known pages
    assert_eq!(report.duplicates, 6);
}

#[tokio::test]
async fn test_frontier_is_first_in_first_out() {
    let links = ["http://a/1", "http://a/2", "http://a/3", "http://a/4", "http://a/5"];
    let mut site = FakeSite::default().page("http://a/", &links);
    for link in links {
        site = site.page(link, &[]);
    }
    let site = Arc::new(site);

    let report = Pipeline::new(settings(), site.clone())
        .run(seeds(&["http://a/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    let mut expected = vec!["http://a/"];
    expected.extend(links);
    assert_eq!(site.fetched(), expected);
}

#[tokio::test]
async fn test_blocking_frontier_parks_until_cancelled() {
    let children = ["http://a/1", "http://a/2", "http://a/3", "http://a/4"];
    let mut site = FakeSite::default().page("http://a/", &children);
    for child in children {
        site = site.hanging(child);
    }
    let site = Arc::new(site);

    let pipeline = Pipeline::new(
        PipelineSettings {
            frontier_capacity: 2,
            overflow: OverflowPolicy::Block,
            max_duration: None,
            ..PipelineSettings::default()
        },
        site.clone(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(seeds(&["http://a/"]), cancel),
    )
    .await
    .expect("cancellation should unpark every stage")
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Cancelled);
    // The first child is stuck in the fetcher, two more fill the frontier,
    // and the tracker is parked on the last one
    assert_eq!(site.fetched(), vec!["http://a/", "http://a/1"]);
    assert_eq!(report.enqueued, 4);
    assert_eq!(report.visited.len(), 5);
    assert!(report.overflowed.is_empty());
}

#[tokio::test]
async fn test_reject_policy_drops_overflow_and_completes() {
    let children = ["http://a/1", "http://a/2", "http://a/3", "http://a/4", "http://a/5"];
    let mut site = FakeSite::default().page("http://a/", &children);
    for child in children {
        site = site.page(child, &[]).slow(child, Duration::from_millis(50));
    }
    let site = Arc::new(site);

    let report = Pipeline::new(
        PipelineSettings {
            frontier_capacity: 2,
            overflow: OverflowPolicy::Reject,
            ..settings()
        },
        site.clone(),
    )
    .run(seeds(&["http://a/"]), CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.visited.len(), 6);
    assert!(report.overflowed.len() >= 2);
    assert_eq!(report.enqueued + report.overflowed.len(), 6);

    // Overflowed addresses stay recorded and are never fetched
    for address in &report.overflowed {
        assert!(report.was_visited(address));
        assert!(!site.fetched().contains(address));
    }
}

#[tokio::test]
async fn test_block_for_policy_gives_up_after_waiting() {
    let children = ["http://a/1", "http://a/2", "http://a/3", "http://a/4", "http://a/5"];
    let mut site = FakeSite::default().page("http://a/", &children);
    for child in children {
        site = site.page(child, &[]).slow(child, Duration::from_millis(200));
    }
    let site = Arc::new(site);

    let report = Pipeline::new(
        PipelineSettings {
            frontier_capacity: 2,
            overflow: OverflowPolicy::BlockFor(Duration::from_millis(20)),
            ..settings()
        },
        site.clone(),
    )
    .run(seeds(&["http://a/"]), CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert!(report.overflowed.len() >= 2);
    assert_eq!(report.fetched.len(), report.enqueued);
}

#[tokio::test]
async fn test_cancellation_stops_a_hanging_fetch() {
    let site = Arc::new(FakeSite::default().hanging("http://a/"));
    let pipeline = Pipeline::new(settings(), site.clone());
    let phases = pipeline.subscribe();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(seeds(&["http://a/"]), cancel),
    )
    .await
    .expect("run should return once cancelled")
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Cancelled);
    assert_eq!(report.phase, CrawlPhase::Terminated);
    assert_eq!(*phases.borrow(), CrawlPhase::Terminated);
    assert!(report.fetched.is_empty());
    assert!(report.fetch_failures.is_empty());
}

#[tokio::test]
async fn test_max_duration_times_out() {
    let site = Arc::new(FakeSite::default().hanging("http://a/"));

    let report = Pipeline::new(
        PipelineSettings {
            max_duration: Some(Duration::from_millis(100)),
            ..settings()
        },
        site,
    )
    .run(seeds(&["http://a/"]), CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::TimedOut);
    assert!(report.elapsed >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_completed_run_passes_through_draining() {
    let site = Arc::new(
        FakeSite::default()
            .page("http://a/", &[])
            .page("http://b/", &[]),
    );
    let pipeline = Pipeline::new(settings(), site);
    let mut phases = pipeline.subscribe();
    assert_eq!(*phases.borrow_and_update(), CrawlPhase::Running);

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while phases.changed().await.is_ok() {
            seen.push(*phases.borrow_and_update());
        }
        seen
    });

    let report = pipeline
        .run(seeds(&["http://a/", "http://b/"]), CancellationToken::new())
        .await
        .unwrap();
    let seen = watcher.await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.visited, vec!["http://a/", "http://b/"]);
    assert_eq!(seen, vec![CrawlPhase::Draining, CrawlPhase::Terminated]);
}

#[tokio::test]
async fn test_cancelled_run_skips_draining() {
    let site = Arc::new(FakeSite::default().hanging("http://a/"));
    let pipeline = Pipeline::new(settings(), site);
    let mut phases = pipeline.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while phases.changed().await.is_ok() {
            seen.push(*phases.borrow_and_update());
        }
        seen
    });

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = pipeline
        .run(seeds(&["http://a/"]), cancel)
        .await
        .unwrap();
    let seen = watcher.await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Cancelled);
    assert_eq!(seen, vec![CrawlPhase::Terminated]);
}

/// Serves every page empty, except one address whose fetch panics
struct PanickingSite {
    poisoned: &'static str,
}

#[async_trait]
impl PageSource for PanickingSite {
    async fn fetch(&self, address: &str) -> Result<String, FetchError> {
        if address == self.poisoned {
            panic!("fetch of {} panicked", address);
        }
        Ok("<html></html>".to_string())
    }
}

#[tokio::test]
async fn test_panicking_fetch_aborts_the_run() {
    let site = PanickingSite {
        poisoned: "http://boom/",
    };
    let pipeline = Pipeline::new(PipelineSettings::default(), Arc::new(site));

    let report = tokio::time::timeout(
        Duration::from_secs(3),
        pipeline.run(seeds(&["http://ok/", "http://boom/"]), CancellationToken::new()),
    )
    .await
    .expect("a panicked fetch should end the run")
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Aborted);
    assert_eq!(report.phase, CrawlPhase::Terminated);
    assert_eq!(report.fetch_panics, 1);
    assert_eq!(report.fetched, vec!["http://ok/"]);
    assert!(report.fetch_failures.is_empty());
}

#[tokio::test]
async fn test_run_rejects_zero_capacity_frontier() {
    let site = Arc::new(FakeSite::default().page("http://a/", &[]));
    let pipeline = Pipeline::new(
        PipelineSettings {
            frontier_capacity: 0,
            ..settings()
        },
        site.clone(),
    );

    let result = pipeline
        .run(seeds(&["http://a/"]), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ripple_loop::CrawlError::Config(_))));
    assert!(site.fetched().is_empty());
}

#[tokio::test]
async fn test_whitespace_around_link_is_the_same_address() {
    let site = Arc::new(
        FakeSite::default()
            .page("http://a/", &[" http://a/ ", "\thttp://a/b\n"])
            .page("http://a/b", &["http://a/b "]),
    );

    let report = Pipeline::new(settings(), site.clone())
        .run(seeds(&["http://a/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.visited, vec!["http://a/", "http://a/b"]);
    assert_eq!(site.fetched(), vec!["http://a/", "http://a/b"]);
    assert_eq!(report.duplicates, 2);
}

#[tokio::test]
async fn test_concurrent_fetches_stay_within_limit() {
    let children: Vec<String> = (0..12).map(|i| format!("http://hub/{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();

    let mut site = FakeSite::default().page("http://hub/", &child_refs);
    for child in &child_refs {
        site = site.page(child, &["http://hub/"]).slow(child, Duration::from_millis(20));
    }
    let site = Arc::new(site);

    let report = Pipeline::new(
        PipelineSettings {
            max_concurrent_fetches: 4,
            ..settings()
        },
        site.clone(),
    )
    .run(seeds(&["http://hub/"]), CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.fetched.len(), 13);
    assert_eq!(site.fetched().len(), 13);
    assert!(site.peak.load(Ordering::SeqCst) <= 4);
    assert!(site.peak.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_unresolvable_links_are_skipped() {
    let site = Arc::new(FakeSite::default().page("http://a/", &["http://[::1", "ok"]).page(
        "http://a/ok",
        &[],
    ));

    let report = Pipeline::new(settings(), site)
        .run(seeds(&["http://a/"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.visited, vec!["http://a/", "http://a/ok"]);
    assert_eq!(report.skipped_links.len(), 1);
    assert_eq!(report.skipped_links[0].reference, "http://[::1");
}

/// Reads one address per line instead of HTML
struct LineParser;

impl LinkParser for LineParser {
    fn extract_hrefs(&self, content: &str) -> Vec<String> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    }
}

struct TextSite(HashMap<&'static str, &'static str>);

#[async_trait]
impl PageSource for TextSite {
    async fn fetch(&self, address: &str) -> Result<String, FetchError> {
        self.0
            .get(address)
            .map(|body| body.to_string())
            .ok_or(FetchError::Status(404))
    }
}

#[tokio::test]
async fn test_custom_parser_and_resolver() {
    let site = TextSite(HashMap::from([
        ("http://a/dir/index", "one\n../two\n"),
        ("http://a/dir/one", ""),
        ("http://a/two", "dir/index\n"),
    ]));

    let report = Pipeline::new(settings(), Arc::new(site))
        .with_parser(Arc::new(LineParser))
        .with_resolver(Arc::new(StandardResolver))
        .run(seeds(&["http://a/dir/index"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(
        report.visited,
        vec!["http://a/dir/index", "http://a/dir/one", "http://a/two"]
    );
    assert_eq!(report.duplicates, 1);
    assert!(report.fetch_failures.is_empty());
}
