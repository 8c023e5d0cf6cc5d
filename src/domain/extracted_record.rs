use serde_json::{Map, Value};

use super::{
    candidate_url::CandidateUrl,
    lead::{Education, Experience, Seniority},
    model_output::first_json_object,
};

const PLACEHOLDER_NAMES: [&str; 5] = ["unknown", "n/a", "na", "null", "none"];

/// A profile as read back from the extraction model, after repair.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub name: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub industry: Option<String>,
    pub email: Option<String>,
    pub skills: Vec<String>,
    pub connections: Option<u32>,
    pub seniority: Option<Seniority>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub source_url: CandidateUrl,
    pub is_company: bool,
}

impl ExtractedRecord {
    pub fn new(name: &str, source_url: CandidateUrl) -> Self {
        ExtractedRecord {
            name: name.trim().to_string(),
            title: None,
            company: None,
            location: None,
            headline: None,
            about: None,
            industry: None,
            email: None,
            skills: vec![],
            connections: None,
            seniority: None,
            experience: vec![],
            education: vec![],
            is_company: source_url.is_company_page(),
            source_url,
        }
    }

    /// Reads the first JSON object out of a model completion. `None` when there
    /// is no object or it lacks a usable name.
    ///
    /// The source URL and company flag always come from the fetched page, not
    /// from the model.
    pub fn from_model_output(raw: &str, source_url: &CandidateUrl) -> Option<Self> {
        let fields = first_json_object(raw)?;
        Self::from_fields(&fields, source_url)
    }

    fn from_fields(fields: &Map<String, Value>, source_url: &CandidateUrl) -> Option<Self> {
        let name = text(fields, "name").filter(|n| is_usable_name(n))?;

        let mut record = ExtractedRecord::new(&name, source_url.clone());
        record.title = text(fields, "title");
        record.company = text(fields, "company");
        record.location = text(fields, "location");
        record.headline = text(fields, "headline");
        record.about = text(fields, "about");
        record.industry = text(fields, "industry");
        record.email = text(fields, "email").filter(|e| e.contains('@'));
        record.skills = strings(fields.get("skills"));
        record.connections = fields.get("connections").and_then(count);
        record.seniority = text(fields, "seniority").and_then(|s| Seniority::parse_loose(&s));
        record.experience = objects(fields.get("experience"))
            .map(|entry| Experience {
                title: text(entry, "title").unwrap_or_default(),
                company: text(entry, "company").unwrap_or_default(),
                duration: text(entry, "duration").unwrap_or_default(),
            })
            .collect();
        record.education = objects(fields.get("education"))
            .map(|entry| Education {
                school: text(entry, "school").unwrap_or_default(),
                degree: text(entry, "degree").unwrap_or_default(),
                field: text(entry, "field").unwrap_or_default(),
                year: text(entry, "year").unwrap_or_default(),
            })
            .collect();

        Some(record)
    }
}

fn is_usable_name(name: &str) -> bool {
    let lowered = name.to_lowercase();
    !PLACEHOLDER_NAMES.contains(&lowered.as_str())
}

/// Trimmed, non-empty string value. Numbers are rendered as text so that a
/// graduation year of `2019` survives.
fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let value = match fields.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => vec![],
    }
}

fn objects(value: Option<&Value>) -> impl Iterator<Item = &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

/// Accepts `512`, `512.0`, `"512"`, `"500+"` and `"1,234 connections"`.
fn count(value: &Value) -> Option<u32> {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == ',')
                .filter(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        _ => None,
    };
    parsed.filter(|n| *n > 0)
}
