use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::lead::NormalizedLead;

const ALL: &str = "All";
pub const DEFAULT_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, alias = "q")]
    pub query: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub seniority: Option<String>,
    pub company_size: Option<String>,
    pub connection_degree: Option<String>,
    #[serde(default)]
    pub open_to_work: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub leads: Vec<NormalizedLead>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub query: String,
}

impl SearchFilters {
    pub fn matches(&self, lead: &NormalizedLead) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let searchable = [
                &lead.name,
                &lead.title,
                &lead.company,
                &lead.headline,
                &lead.location,
                &lead.industry,
            ]
            .into_iter()
            .chain(lead.skills.iter())
            .join(" ")
            .to_lowercase();

            if !searchable.contains(&query.to_lowercase()) {
                return false;
            }
        }

        if let Some(industry) = active(&self.industry) {
            if lead.industry != industry {
                return false;
            }
        }

        if let Some(location) = active(&self.location) {
            let location = location.to_lowercase();
            if !lead.location.to_lowercase().contains(&location)
                && !lead.country.to_lowercase().contains(&location)
            {
                return false;
            }
        }

        if let Some(seniority) = active(&self.seniority) {
            if lead.seniority.as_str() != seniority {
                return false;
            }
        }

        if let Some(company_size) = active(&self.company_size) {
            if lead.company_size.as_deref() != Some(company_size) {
                return false;
            }
        }

        if let Some(degree) = active(&self.connection_degree) {
            match degree.parse::<u8>() {
                Ok(degree) if degree == lead.connection_degree => {}
                _ => return false,
            }
        }

        !self.open_to_work || lead.open_to_work
    }
}

/// A filter value that actually constrains: present, non-blank and not "All".
fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ALL)
}

/// Filters `leads` in order, then returns the 1-based `page` of `limit` items.
pub fn search(
    leads: &[NormalizedLead],
    filters: &SearchFilters,
    page: usize,
    limit: usize,
) -> SearchPage {
    let page = page.max(1);
    let limit = limit.max(1);

    let filtered: Vec<&NormalizedLead> = leads.iter().filter(|l| filters.matches(l)).collect();
    let total = filtered.len();

    let leads = filtered
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .cloned()
        .collect();

    SearchPage {
        leads,
        total,
        page,
        total_pages: total.div_ceil(limit),
        query: filters.query.clone().unwrap_or_default(),
    }
}
