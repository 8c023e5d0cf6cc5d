use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};

const PLACEHOLDER_PREFIX: &str = "your_";
const PLACEHOLDER_SUFFIX: &str = "_here";

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub api_keys: ApiKeys,
    pub llm: LlmSettings,
    pub scraper: ScraperSettings,
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiKeys {
    pub openrouter: String,
    pub zenrows: String,
}

impl ApiKeys {
    /// Name of the first credential that is missing or still a placeholder.
    pub fn first_missing(&self) -> Option<&'static str> {
        if !is_configured(&self.openrouter) {
            return Some("OpenRouter");
        }
        if !is_configured(&self.zenrows) {
            return Some("ZenRows");
        }
        None
    }
}

fn is_configured(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && !(key.starts_with(PLACEHOLDER_PREFIX) && key.ends_with(PLACEHOLDER_SUFFIX))
}

#[derive(Deserialize, Clone, Debug)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScraperSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_secs: u64,
    pub mode: String,
}

impl ScraperSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct PipelineSettings {
    pub site_domain: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub batch_size: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_candidates: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub min_content_chars: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_content_chars: usize,
    #[serde(default, deserialize_with = "deserialize_option_number_from_string")]
    pub deadline_secs: Option<u64>,
}

impl PipelineSettings {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            site_domain: "linkedin.com".to_string(),
            batch_size: 3,
            max_candidates: 10,
            min_content_chars: 100,
            max_content_chars: 15_000,
            deadline_secs: None,
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CatalogSettings {
    pub seed_path: Option<String>,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path =
        std::env::current_dir().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let configuration_directory = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        // APP_API_KEYS__OPENROUTER=sk-... sets `api_keys.openrouter`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
