use std::{net::TcpListener, sync::Arc};

use env_logger::Env;
use leadscout::{
    configuration::get_configuration,
    services::{LeadCatalog, LeadPipeline, OpenaiClient, ZenrowsFetcher},
    startup::run,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(address)?;

    if let Some(missing) = configuration.api_keys.first_missing() {
        log::warn!("{} API key is not configured, real scrapes will be rejected", missing);
    }

    let model = OpenaiClient::new(
        configuration.api_keys.openrouter.clone(),
        configuration.llm.base_url.clone(),
        configuration.llm.model.clone(),
    );
    let fetcher = ZenrowsFetcher::from_settings(
        configuration.api_keys.zenrows.clone(),
        &configuration.scraper,
    )
    .expect("Failed to build scraper http client.");

    let pipeline = LeadPipeline::new(
        Arc::new(model),
        Arc::new(fetcher),
        configuration.api_keys.clone(),
        &configuration.pipeline,
    );

    let catalog = match &configuration.catalog.seed_path {
        Some(path) => LeadCatalog::from_path(path).expect("Failed to load lead catalog."),
        None => LeadCatalog::default(),
    };

    run(listener, pipeline, catalog)?.await
}
