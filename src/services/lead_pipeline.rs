use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::{future::join_all, FutureExt};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::{
    configuration::{ApiKeys, PipelineSettings},
    domain::{candidate_url::CandidateUrl, extracted_record::ExtractedRecord, lead::NormalizedLead},
};

use super::{ChatModel, FetchError, LlmError, PageFetcher, RecordExtractor, UrlDiscovery};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Query is required")]
    BadRequest,
    #[error("{0} API key not configured")]
    Misconfigured(&'static str),
    #[error("Could not generate target URLs for this query")]
    NoTargetsFound,
    #[error("{0}")]
    QuotaExhausted(String),
    #[error("Target discovery failed: {0}")]
    Upstream(#[from] LlmError),
    #[error("Scraping did not finish within {} seconds", .0.as_secs())]
    DeadlineExceeded(Duration),
    #[error("Scraping failed: {0}")]
    Unexpected(String),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::BadRequest => "bad_request",
            PipelineError::Misconfigured(_) => "misconfigured",
            PipelineError::NoTargetsFound => "no_targets",
            PipelineError::QuotaExhausted(_) => "quota_exhausted",
            PipelineError::Upstream(_) => "upstream",
            PipelineError::DeadlineExceeded(_) => "deadline_exceeded",
            PipelineError::Unexpected(_) => "unexpected",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub leads: Vec<NormalizedLead>,
    pub total: usize,
    pub query: String,
    pub source_urls: Vec<CandidateUrl>,
    pub scraped_at: DateTime<Utc>,
}

/// Outcome of one fetch+extract branch.
enum BranchOutcome {
    Extracted(Box<ExtractedRecord>),
    Missed,
    FetchFailed(FetchError),
    Panicked(String),
}

/// Query -> candidate URLs -> pages -> leads.
///
/// Discovery runs once. The first `batch_size` candidates are then fetched and
/// extracted concurrently; a branch that fails or panics is logged and dropped
/// without touching its siblings.
pub struct LeadPipeline {
    discovery: UrlDiscovery,
    extractor: RecordExtractor,
    fetcher: Arc<dyn PageFetcher>,
    api_keys: ApiKeys,
    batch_size: usize,
    deadline: Option<Duration>,
}

impl LeadPipeline {
    pub fn new(
        model: Arc<dyn ChatModel>,
        fetcher: Arc<dyn PageFetcher>,
        api_keys: ApiKeys,
        settings: &PipelineSettings,
    ) -> Self {
        LeadPipeline {
            discovery: UrlDiscovery::new(
                model.clone(),
                settings.site_domain.clone(),
                settings.max_candidates,
            ),
            extractor: RecordExtractor::new(
                model,
                settings.min_content_chars,
                settings.max_content_chars,
            ),
            fetcher,
            api_keys,
            batch_size: settings.batch_size,
            deadline: settings.deadline(),
        }
    }

    pub async fn run(&self, query: &str) -> Result<PipelineOutput, PipelineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PipelineError::BadRequest);
        }
        if let Some(missing) = self.api_keys.first_missing() {
            return Err(PipelineError::Misconfigured(missing));
        }

        let stages = AssertUnwindSafe(self.run_stages(query)).catch_unwind();
        let outcome = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, stages)
                .await
                .map_err(|_| PipelineError::DeadlineExceeded(deadline))?,
            None => stages.await,
        };

        outcome.unwrap_or_else(|panic| {
            let message = panic_message(panic);
            log::error!("Pipeline panicked for query {}: {}", query, message);
            Err(PipelineError::Unexpected(message))
        })
    }

    async fn run_stages(&self, query: &str) -> Result<PipelineOutput, PipelineError> {
        let candidates = self.discovery.discover(query).await?;
        if candidates.is_empty() {
            return Err(PipelineError::NoTargetsFound);
        }

        let targets: Vec<CandidateUrl> = candidates.into_iter().take(self.batch_size).collect();
        let outcomes = join_all(targets.iter().map(|url| {
            AssertUnwindSafe(self.scrape_branch(url))
                .catch_unwind()
                .map(|outcome| {
                    outcome.unwrap_or_else(|panic| BranchOutcome::Panicked(panic_message(panic)))
                })
        }))
        .await;

        let leads = assemble_leads(&targets, outcomes)?;
        log::info!(
            "Pipeline produced {} leads from {} targets for query: {}",
            leads.len(),
            targets.len(),
            query
        );

        Ok(PipelineOutput {
            total: leads.len(),
            leads,
            query: query.to_string(),
            source_urls: targets,
            scraped_at: Utc::now(),
        })
    }

    async fn scrape_branch(&self, url: &CandidateUrl) -> BranchOutcome {
        let content = match self.fetcher.fetch(url).await {
            Ok(content) => content,
            Err(e) => return BranchOutcome::FetchFailed(e),
        };
        log::info!("Success scraping {}, length: {}", url, content.len());

        match self.extractor.extract(&content, url).await {
            Some(record) => BranchOutcome::Extracted(Box::new(record)),
            None => BranchOutcome::Missed,
        }
    }
}

/// Keeps extracted records in target order. Fails only when nothing was
/// extracted and the proxy reported exhausted credits.
fn assemble_leads(
    targets: &[CandidateUrl],
    outcomes: Vec<BranchOutcome>,
) -> Result<Vec<NormalizedLead>, PipelineError> {
    let scraped_at = Utc::now();
    let mut rng = StdRng::from_entropy();
    let mut leads = vec![];
    let mut quota_message = None;

    for (url, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            BranchOutcome::Extracted(record) => {
                leads.push(NormalizedLead::from_extracted(*record, scraped_at, &mut rng));
            }
            BranchOutcome::Missed => log::info!("No lead extracted from {}", url),
            BranchOutcome::FetchFailed(e) => {
                log::error!("Failed to scrape {}: {}", url, e);
                if let FetchError::QuotaExhausted(message) = e {
                    quota_message.get_or_insert(message);
                }
            }
            BranchOutcome::Panicked(message) => {
                log::error!("Scraping {} panicked: {}", url, message);
            }
        }
    }

    match (leads.is_empty(), quota_message) {
        (true, Some(message)) => Err(PipelineError::QuotaExhausted(message)),
        _ => Ok(leads),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use async_trait::async_trait;

    use crate::{
        configuration::{ApiKeys, PipelineSettings},
        services::{
            page_fetcher::QUOTA_EXHAUSTED_MESSAGE,
            test_support::{FakeFetcher, FakePage, ScriptedModel},
            ChatModel, FetchFailureKind, LlmError,
        },
    };

    use super::{LeadPipeline, PipelineError};

    const QUERY: &str = "CTO of AI companies in London";
    const DISCOVERY_NEEDLE: &str = "Find linkedin.com URLs";

    fn profile(slug: &str) -> String {
        format!("https://www.linkedin.com/in/{}", slug)
    }

    fn urls_reply(slugs: &[&str]) -> String {
        let urls: Vec<String> = slugs.iter().map(|s| format!("\"{}\"", profile(s))).collect();
        format!("Sure:\n[{}]", urls.join(", "))
    }

    fn page(marker: &str) -> FakePage {
        FakePage::Content(format!("# {}\n{}", marker, "Profile details and history. ".repeat(8)))
    }

    fn record_reply(name: &str) -> String {
        format!(r#"{{"name": "{}", "title": "CTO", "location": "London, United Kingdom"}}"#, name)
    }

    fn keys() -> ApiKeys {
        ApiKeys {
            openrouter: "sk-or-test".to_string(),
            zenrows: "zr-test".to_string(),
        }
    }

    fn pipeline(model: ScriptedModel, fetcher: Arc<FakeFetcher>) -> LeadPipeline {
        LeadPipeline::new(Arc::new(model), fetcher, keys(), &PipelineSettings::default())
    }

    /// Four candidates; `a` and `b` extract, `c` times out twice, `d` is past the batch.
    fn round_trip_fixture() -> (ScriptedModel, Arc<FakeFetcher>) {
        let model = ScriptedModel::failing()
            .when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b", "c", "d"]))
            .when("PAGE-A", &record_reply("Ada Lovelace"))
            .when("PAGE-B", &record_reply("Grace Hopper"))
            .when("PAGE-D", &record_reply("Never Fetched"));
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), page("PAGE-A"))
            .page(&profile("b"), page("PAGE-B"))
            .page(&profile("c"), FakePage::Fail(FetchFailureKind::Transient))
            .page(&profile("d"), page("PAGE-D"));

        (model, Arc::new(fetcher))
    }

    #[tokio::test]
    async fn round_trip_with_one_timed_out_branch() {
        let (model, fetcher) = round_trip_fixture();

        let output = pipeline(model, fetcher.clone()).run(QUERY).await.unwrap();

        assert_eq!(output.total, 2);
        let names: Vec<&str> = output.leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Grace Hopper"]);
        let source_urls: Vec<&str> = output.source_urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(source_urls, vec![profile("a"), profile("b"), profile("c")]);
        assert_eq!(output.query, QUERY);
        assert_eq!(fetcher.requested().len(), 3);
        assert!(!fetcher.requested().contains(&profile("d")));
    }

    #[tokio::test]
    async fn empty_query_makes_no_calls() {
        let model = Arc::new(ScriptedModel::new("[]"));
        let fetcher = Arc::new(FakeFetcher::default());
        let pipeline = LeadPipeline::new(
            model.clone(),
            fetcher.clone(),
            keys(),
            &PipelineSettings::default(),
        );

        let error = pipeline.run("   ").await.unwrap_err();

        assert!(matches!(error, PipelineError::BadRequest));
        assert!(model.prompts().is_empty());
        assert!(fetcher.requested().is_empty());
    }

    #[tokio::test]
    async fn placeholder_key_is_misconfigured_before_any_call() {
        let model = Arc::new(ScriptedModel::new("[]"));
        let api_keys = ApiKeys {
            openrouter: "your_openrouter_api_key_here".to_string(),
            zenrows: "zr-test".to_string(),
        };
        let pipeline = LeadPipeline::new(
            model.clone(),
            Arc::new(FakeFetcher::default()),
            api_keys,
            &PipelineSettings::default(),
        );

        let error = pipeline.run(QUERY).await.unwrap_err();

        assert!(matches!(error, PipelineError::Misconfigured("OpenRouter")));
        assert_eq!(error.kind(), "misconfigured");
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn no_candidates_is_no_targets_found() {
        let replies = ["[]", "No results.", r#"["https://example.com/in/x"]"#];

        for reply in replies {
            let fetcher = Arc::new(FakeFetcher::default());
            let error = pipeline(ScriptedModel::new(reply), fetcher.clone())
                .run(QUERY)
                .await
                .unwrap_err();

            assert!(matches!(error, PipelineError::NoTargetsFound), "{}", reply);
            assert!(fetcher.requested().is_empty());
        }
    }

    #[tokio::test]
    async fn discovery_failure_is_upstream() {
        let error = pipeline(ScriptedModel::failing(), Arc::new(FakeFetcher::default()))
            .run(QUERY)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), "upstream");
    }

    #[tokio::test]
    async fn batch_is_capped() {
        let slugs = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];
        let mut model = ScriptedModel::failing().when(DISCOVERY_NEEDLE, &urls_reply(&slugs));
        let mut fetcher = FakeFetcher::default();
        for slug in slugs {
            let marker = format!("PAGE-{}", slug);
            model = model.when(&marker, &record_reply(&format!("Person {}", slug)));
            fetcher = fetcher.page(&profile(slug), page(&marker));
        }
        let fetcher = Arc::new(fetcher);

        let output = pipeline(model, fetcher.clone()).run(QUERY).await.unwrap();

        assert_eq!(output.total, 3);
        assert_eq!(output.source_urls.len(), 3);
        assert_eq!(fetcher.requested().len(), 3);
    }

    #[tokio::test]
    async fn nameless_records_are_dropped() {
        let model = ScriptedModel::failing()
            .when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b", "c"]))
            .when("PAGE-A", r#"{"title": "CTO", "company": "Acme", "skills": ["AI"]}"#)
            .when("PAGE-B", r#"{"name": "", "title": "CTO"}"#)
            .when("PAGE-C", &record_reply("Grace Hopper"));
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), page("PAGE-A"))
            .page(&profile("b"), page("PAGE-B"))
            .page(&profile("c"), page("PAGE-C"));

        let output = pipeline(model, Arc::new(fetcher)).run(QUERY).await.unwrap();

        assert_eq!(output.total, 1);
        assert_eq!(output.leads[0].name, "Grace Hopper");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_siblings_for_extraction() {
        let model = Arc::new(
            ScriptedModel::failing()
                .when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b", "c"]))
                .when("PAGE-A", &record_reply("Ada Lovelace"))
                .when("PAGE-C", &record_reply("Grace Hopper")),
        );
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), page("PAGE-A"))
            .page(&profile("b"), FakePage::Fail(FetchFailureKind::Status))
            .page(&profile("c"), page("PAGE-C"));
        let pipeline = LeadPipeline::new(
            model.clone(),
            Arc::new(fetcher),
            keys(),
            &PipelineSettings::default(),
        );

        let output = pipeline.run(QUERY).await.unwrap();

        let extraction_prompts = model
            .prompts()
            .into_iter()
            .filter(|p| p.user.starts_with("Markdown:"))
            .count();
        assert_eq!(extraction_prompts, 2);
        assert_eq!(output.total, 2);
    }

    #[tokio::test]
    async fn all_branches_failing_is_still_a_result() {
        let model = ScriptedModel::failing().when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b"]));
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), FakePage::Fail(FetchFailureKind::Transient))
            .page(&profile("b"), page("PAGE-B"));

        let output = pipeline(model, Arc::new(fetcher)).run(QUERY).await.unwrap();

        assert_eq!(output.total, 0);
        assert!(output.leads.is_empty());
        assert_eq!(output.source_urls.len(), 2);
    }

    #[tokio::test]
    async fn quota_exhaustion_without_leads_is_fatal() {
        let model = ScriptedModel::failing().when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b"]));
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), FakePage::Fail(FetchFailureKind::QuotaExhausted))
            .page(&profile("b"), FakePage::Fail(FetchFailureKind::Transient));

        let error = pipeline(model, Arc::new(fetcher)).run(QUERY).await.unwrap_err();

        assert_eq!(error.kind(), "quota_exhausted");
        assert_eq!(error.to_string(), QUOTA_EXHAUSTED_MESSAGE);
    }

    #[tokio::test]
    async fn quota_exhaustion_beside_a_lead_keeps_the_lead() {
        let model = ScriptedModel::failing()
            .when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b"]))
            .when("PAGE-B", &record_reply("Grace Hopper"));
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), FakePage::Fail(FetchFailureKind::QuotaExhausted))
            .page(&profile("b"), page("PAGE-B"));

        let output = pipeline(model, Arc::new(fetcher)).run(QUERY).await.unwrap();

        assert_eq!(output.total, 1);
    }

    #[tokio::test]
    async fn branches_run_concurrently_and_keep_target_order() {
        let delay = Duration::from_millis(400);
        let model = ScriptedModel::failing()
            .when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b", "c"]))
            .when("PAGE-A", &record_reply("Ada Lovelace"))
            .when("PAGE-B", &record_reply("Grace Hopper"))
            .when("PAGE-C", &record_reply("Katherine Johnson"));
        let fetcher = FakeFetcher::default()
            .slow_page(&profile("a"), page("PAGE-A"), delay * 2)
            .slow_page(&profile("b"), page("PAGE-B"), delay)
            .slow_page(&profile("c"), page("PAGE-C"), delay);

        let started = Instant::now();
        let output = pipeline(model, Arc::new(fetcher)).run(QUERY).await.unwrap();

        assert!(started.elapsed() < delay * 4);
        let names: Vec<&str> = output.leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Grace Hopper", "Katherine Johnson"]);
    }

    #[tokio::test]
    async fn panicking_branch_leaves_siblings_intact() {
        let model = ScriptedModel::failing()
            .when(DISCOVERY_NEEDLE, &urls_reply(&["a", "b", "c"]))
            .when("PAGE-A", &record_reply("Ada Lovelace"))
            .when("PAGE-C", &record_reply("Katherine Johnson"));
        let fetcher = FakeFetcher::default()
            .page(&profile("a"), page("PAGE-A"))
            .page(&profile("b"), FakePage::Panic)
            .page(&profile("c"), page("PAGE-C"));

        let output = pipeline(model, Arc::new(fetcher)).run(QUERY).await.unwrap();

        assert_eq!(output.total, 2);
        let names: Vec<&str> = output.leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Ada Lovelace", "Katherine Johnson"]);
        assert_eq!(output.source_urls.len(), 3);
    }

    struct PanickingModel;

    #[async_trait]
    impl ChatModel for PanickingModel {
        async fn complete(&self, _: &str, _: &str, _: f32) -> Result<String, LlmError> {
            panic!("model client blew up")
        }
    }

    #[tokio::test]
    async fn panic_outside_a_branch_is_unexpected() {
        let pipeline = LeadPipeline::new(
            Arc::new(PanickingModel),
            Arc::new(FakeFetcher::default()),
            keys(),
            &PipelineSettings::default(),
        );

        let error = pipeline.run(QUERY).await.unwrap_err();

        assert_eq!(error.kind(), "unexpected");
        assert_eq!(error.to_string(), "Scraping failed: model client blew up");
    }

    #[tokio::test]
    async fn deadline_bounds_the_whole_run() {
        let model = ScriptedModel::failing().when(DISCOVERY_NEEDLE, &urls_reply(&["a"]));
        let fetcher = FakeFetcher::default().slow_page(
            &profile("a"),
            page("PAGE-A"),
            Duration::from_secs(10),
        );
        let settings = PipelineSettings {
            deadline_secs: Some(1),
            ..Default::default()
        };
        let pipeline = LeadPipeline::new(Arc::new(model), Arc::new(fetcher), keys(), &settings);

        let started = Instant::now();
        let error = pipeline.run(QUERY).await.unwrap_err();

        assert_eq!(error.kind(), "deadline_exceeded");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
