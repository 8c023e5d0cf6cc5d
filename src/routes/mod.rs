pub mod default_route;
pub mod lead_route;
pub mod scrape_route;

use serde::Serialize;

/// Body of every error response.
#[derive(Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub kind: &'static str,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, kind: &'static str) -> Self {
        ErrorEnvelope {
            error: error.into(),
            kind,
        }
    }
}
