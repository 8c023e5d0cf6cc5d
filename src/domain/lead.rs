use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extracted_record::ExtractedRecord;

pub const DEFAULT_INDUSTRY: &str = "Technology";
pub const DEFAULT_SENIORITY: Seniority = Seniority::Mid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seniority {
    Entry,
    Mid,
    Senior,
    Director,
    #[serde(rename = "VP")]
    Vp,
    #[serde(rename = "C-Suite")]
    CSuite,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Entry => "Entry",
            Seniority::Mid => "Mid",
            Seniority::Senior => "Senior",
            Seniority::Director => "Director",
            Seniority::Vp => "VP",
            Seniority::CSuite => "C-Suite",
        }
    }

    /// Lenient parse: ignores case, spaces, dashes and underscores.
    pub fn parse_loose(value: &str) -> Option<Self> {
        let folded: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match folded.as_str() {
            "entry" | "entrylevel" | "junior" => Some(Seniority::Entry),
            "mid" | "midlevel" => Some(Seniority::Mid),
            "senior" => Some(Seniority::Senior),
            "director" => Some(Seniority::Director),
            "vp" | "vicepresident" => Some(Seniority::Vp),
            "csuite" | "clevel" | "executive" => Some(Seniority::CSuite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub field: String,
    pub year: String,
}

/// Application-facing lead.
///
/// `connection_degree`, `mutual_connections` and `premium` are display
/// placeholders and are never derived from scraped data; every field that was
/// filled in rather than extracted is named in `unverified_fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLead {
    pub id: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub headline: String,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    pub location: String,
    pub country: String,
    pub industry: String,
    pub seniority: Seniority,
    pub connections: u32,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "linkedinUrl", alias = "sourceUrl")]
    pub source_url: String,
    pub about: String,
    pub skills: Vec<String>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    #[serde(default)]
    pub saved: bool,
    pub scraped_at: DateTime<Utc>,
    pub connection_degree: u8,
    #[serde(default)]
    pub mutual_connections: u32,
    #[serde(default)]
    pub open_to_work: bool,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub is_company: bool,
    #[serde(default)]
    pub unverified_fields: Vec<String>,
}

impl NormalizedLead {
    pub fn from_extracted<R: Rng>(
        record: ExtractedRecord,
        scraped_at: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        let mut unverified_fields = vec![
            "connectionDegree".to_string(),
            "mutualConnections".to_string(),
            "premium".to_string(),
        ];

        let (first_name, last_name) = split_name(&record.name);
        let headline = record
            .headline
            .clone()
            .or_else(|| record.title.clone())
            .unwrap_or_default();
        let location = record.location.unwrap_or_default();
        let country = country_from_location(&location);

        let industry = record.industry.unwrap_or_else(|| {
            unverified_fields.push("industry".to_string());
            DEFAULT_INDUSTRY.to_string()
        });
        let seniority = record.seniority.unwrap_or_else(|| {
            unverified_fields.push("seniority".to_string());
            DEFAULT_SENIORITY
        });
        let connections = record.connections.unwrap_or_else(|| {
            unverified_fields.push("connections".to_string());
            rng.gen_range(500..5500)
        });

        NormalizedLead {
            id: Uuid::new_v4().to_string(),
            first_name,
            last_name,
            headline,
            title: record.title.unwrap_or_default(),
            company: record.company.unwrap_or_default(),
            company_size: None,
            location,
            country,
            industry,
            seniority,
            connections,
            email: record.email,
            source_url: record.source_url.to_string(),
            about: record.about.unwrap_or_default(),
            skills: record.skills,
            experience: record.experience,
            education: record.education,
            saved: false,
            scraped_at,
            connection_degree: rng.gen_range(2..=3),
            mutual_connections: rng.gen_range(0..20),
            open_to_work: false,
            premium: rng.gen_bool(0.3),
            is_company: record.is_company,
            unverified_fields,
            name: record.name,
        }
    }
}

/// Splits at the first whitespace run: "Mary Ann Smith" -> ("Mary", "Ann Smith").
fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

fn country_from_location(location: &str) -> String {
    location
        .rsplit(',')
        .next()
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}
