use std::sync::Arc;

use crate::domain::{candidate_url::CandidateUrl, model_output::first_json_array};

use super::{ChatModel, LlmError};

const DISCOVERY_TEMPERATURE: f32 = 0.1;

/// Turns a free-text request into profile URLs on the target site.
pub struct UrlDiscovery {
    model: Arc<dyn ChatModel>,
    site_domain: String,
    max_candidates: usize,
}

impl UrlDiscovery {
    pub fn new(model: Arc<dyn ChatModel>, site_domain: String, max_candidates: usize) -> Self {
        UrlDiscovery {
            model,
            site_domain,
            max_candidates,
        }
    }

    /// A model failure is an error; a reply without usable URLs is an empty
    /// list.
    pub async fn discover(&self, query: &str) -> Result<Vec<CandidateUrl>, LlmError> {
        let system = format!(
            r#"You are a lead research expert for {site}. Given a user's search request, generate 5-10 real {site} profile or company page URLs that match the request.
Return ONLY a JSON array of strings ({site} URLs), nothing else.
Focus on high-quality, real profiles.
Query: "{query}""#,
            site = self.site_domain,
            query = query,
        );
        let user = format!(r#"Find {} URLs for: "{}""#, self.site_domain, query);

        let reply = self
            .model
            .complete(&system, &user, DISCOVERY_TEMPERATURE)
            .await?;

        let candidates = self.candidates_from_reply(&reply);
        log::info!(
            "Discovery produced {} candidate urls for query: {}",
            candidates.len(),
            query
        );

        Ok(candidates)
    }

    fn candidates_from_reply(&self, reply: &str) -> Vec<CandidateUrl> {
        let Some(items) = first_json_array(reply) else {
            log::warn!("No JSON array in discovery reply");
            return vec![];
        };

        let mut candidates: Vec<CandidateUrl> = vec![];
        for item in items.iter().filter_map(|item| item.as_str()) {
            if candidates.len() >= self.max_candidates {
                break;
            }
            match CandidateUrl::parse(item, &self.site_domain) {
                Some(candidate) if !candidates.contains(&candidate) => candidates.push(candidate),
                Some(_) => {}
                None => log::debug!("Dropping off-site candidate: {}", item),
            }
        }

        candidates
    }
}
