//! In-process fakes of the network collaborators.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_openai::error::OpenAIError;
use async_trait::async_trait;

use crate::domain::candidate_url::CandidateUrl;

use super::{ChatModel, FetchError, FetchFailureKind, LlmError, PageFetcher};

#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Replies with the first rule whose needle appears in the user message, else
/// the default reply.
pub struct ScriptedModel {
    default_reply: Option<String>,
    rules: Vec<(String, String)>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Self {
        ScriptedModel {
            default_reply: Some(reply.to_string()),
            rules: vec![],
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        ScriptedModel {
            default_reply: None,
            rules: vec![],
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn when(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), reply.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(Prompt {
            system: system.to_string(),
            user: user.to_string(),
            temperature,
        });

        self.rules
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_reply.clone())
            .ok_or_else(|| LlmError::Api(OpenAIError::InvalidArgument("scripted failure".into())))
    }
}

#[derive(Clone)]
pub enum FakePage {
    Content(String),
    Fail(FetchFailureKind),
    Panic,
}

/// Serves canned pages keyed by URL, optionally after a delay, and records
/// every URL it was asked for.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, (FakePage, Duration)>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), (page, Duration::ZERO));
        self
    }

    pub fn slow_page(mut self, url: &str, page: FakePage, delay: Duration) -> Self {
        self.pages.insert(url.to_string(), (page, delay));
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &CandidateUrl) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());

        let (page, delay) = self
            .pages
            .get(url.as_str())
            .cloned()
            .unwrap_or((FakePage::Fail(FetchFailureKind::Status), Duration::ZERO));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match page {
            FakePage::Content(content) => Ok(content),
            FakePage::Panic => panic!("fetcher blew up on {}", url),
            FakePage::Fail(FetchFailureKind::QuotaExhausted) => Err(FetchError::QuotaExhausted(
                super::page_fetcher::QUOTA_EXHAUSTED_MESSAGE.to_string(),
            )),
            FakePage::Fail(FetchFailureKind::Transient) => Err(FetchError::Transient {
                attempts: 2,
                message: "operation timed out".to_string(),
            }),
            FakePage::Fail(FetchFailureKind::Status) => Err(FetchError::Status {
                status: 404,
                body: "not found".to_string(),
            }),
            FakePage::Fail(FetchFailureKind::Transport) => {
                Err(FetchError::Transport("connection refused".to_string()))
            }
        }
    }
}
