pub mod lead_catalog;
pub mod lead_pipeline;
pub mod openai_client;
pub mod page_fetcher;
pub mod record_extractor;
pub mod url_discovery;

#[cfg(test)]
pub(crate) mod test_support;

pub use lead_catalog::*;
pub use lead_pipeline::*;
pub use openai_client::*;
pub use page_fetcher::*;
pub use record_extractor::*;
pub use url_discovery::*;
