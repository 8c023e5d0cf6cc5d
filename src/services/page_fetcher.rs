use std::{io, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::{configuration::ScraperSettings, domain::candidate_url::CandidateUrl};

/// Extra attempts after a transient transport failure.
pub const MAX_RETRIES: u8 = 1;

pub const QUOTA_EXHAUSTED_MESSAGE: &str = "ZenRows API: Payment Required (credits exhausted or invalid plan). Please check your ZenRows dashboard.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailureKind {
    QuotaExhausted,
    Transient,
    Status,
    Transport,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    QuotaExhausted(String),
    #[error("transient failure after {attempts} attempt(s): {message}")]
    Transient { attempts: u8, message: String },
    #[error("scraping proxy returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("scrape request failed: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchFailureKind {
        match self {
            FetchError::QuotaExhausted(_) => FetchFailureKind::QuotaExhausted,
            FetchError::Transient { .. } => FetchFailureKind::Transient,
            FetchError::Status { .. } => FetchFailureKind::Status,
            FetchError::Transport(_) => FetchFailureKind::Transport,
        }
    }
}

/// Retrieves rendered page text. Implementations own their retry policy.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &CandidateUrl) -> Result<String, FetchError>;
}

#[derive(Serialize)]
struct ScrapeQuery<'a> {
    url: &'a str,
    apikey: &'a str,
    mode: &'a str,
    response_type: &'a str,
}

/// ZenRows scraping proxy client. The inner `reqwest::Client` keeps a
/// connection pool shared by every concurrent fetch.
pub struct ZenrowsFetcher {
    client: Client,
    api_key: String,
    base_url: String,
    mode: String,
}

impl ZenrowsFetcher {
    pub fn new(
        api_key: String,
        base_url: String,
        mode: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(ZenrowsFetcher {
            client,
            api_key,
            base_url,
            mode,
        })
    }

    pub fn from_settings(api_key: String, settings: &ScraperSettings) -> Result<Self, reqwest::Error> {
        Self::new(
            api_key,
            settings.base_url.clone(),
            settings.mode.clone(),
            settings.timeout(),
        )
    }

    async fn fetch_once(&self, url: &CandidateUrl) -> Result<String, FetchError> {
        let query = ScrapeQuery {
            url: url.as_str(),
            apikey: &self.api_key,
            mode: &self.mode,
            response_type: "markdown",
        };

        let res = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(classify)?;

        let status = res.status();
        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(FetchError::QuotaExhausted(QUOTA_EXHAUSTED_MESSAGE.to_string()));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        res.text().await.map_err(classify)
    }
}

#[async_trait]
impl PageFetcher for ZenrowsFetcher {
    async fn fetch(&self, url: &CandidateUrl) -> Result<String, FetchError> {
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.fetch_once(url).await {
                Err(FetchError::Transient { message, .. }) if attempts <= MAX_RETRIES => {
                    log::warn!("Retrying scrape for {} due to: {}", url, message);
                }
                Err(FetchError::Transient { message, .. }) => {
                    return Err(FetchError::Transient { attempts, message });
                }
                result => return result,
            }
        }
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    match is_transient(&error) {
        true => FetchError::Transient {
            attempts: 1,
            message: error.to_string(),
        },
        false => FetchError::Transport(error.to_string()),
    }
}

/// Timeouts and dropped connections. Refused connections and everything else
/// are terminal.
fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_timeout() {
        return true;
    }

    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if let Some(io_error) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_error.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = err.source();
    }

    false
}
