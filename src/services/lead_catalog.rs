use std::{collections::HashSet, path::Path};

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{
    lead::NormalizedLead,
    search::{self, SearchFilters, SearchPage},
};

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_leads: usize,
    pub saved_leads: usize,
    pub new_today: usize,
    pub industries: usize,
    /// Percentage of leads saved, to one decimal place.
    pub conversion_rate: f64,
}

/// Read-only set of already-known leads, served by the search endpoints.
#[derive(Debug, Default)]
pub struct LeadCatalog {
    leads: Vec<NormalizedLead>,
}

impl LeadCatalog {
    pub fn new(leads: Vec<NormalizedLead>) -> Self {
        LeadCatalog { leads }
    }

    /// Loads a JSON array of leads.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lead seed file {}", path.display()))?;
        let leads: Vec<NormalizedLead> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse lead seed file {}", path.display()))?;

        log::info!("Loaded {} leads from {}", leads.len(), path.display());
        Ok(LeadCatalog::new(leads))
    }

    pub fn search(&self, filters: &SearchFilters, page: usize, limit: usize) -> SearchPage {
        search::search(&self.leads, filters, page, limit)
    }

    /// Every lead matching `filters`, unpaginated.
    pub fn matching(&self, filters: &SearchFilters) -> Vec<NormalizedLead> {
        self.leads
            .iter()
            .filter(|l| filters.matches(l))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&NormalizedLead> {
        self.leads.iter().find(|l| l.id == id)
    }

    pub fn stats(&self, today: NaiveDate) -> CatalogStats {
        let saved_leads = self.leads.iter().filter(|l| l.saved).count();

        CatalogStats {
            total_leads: self.leads.len(),
            saved_leads,
            new_today: self
                .leads
                .iter()
                .filter(|l| l.scraped_at.date_naive() == today)
                .count(),
            industries: self
                .leads
                .iter()
                .map(|l| l.industry.as_str())
                .collect::<HashSet<_>>()
                .len(),
            conversion_rate: percentage(saved_leads, self.leads.len()),
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}
