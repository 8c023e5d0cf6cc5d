use std::sync::Arc;

use crate::domain::{candidate_url::CandidateUrl, extracted_record::ExtractedRecord};

use super::ChatModel;

const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// Reads a structured profile out of scraped page markdown.
pub struct RecordExtractor {
    model: Arc<dyn ChatModel>,
    min_content_chars: usize,
    max_content_chars: usize,
}

impl RecordExtractor {
    pub fn new(model: Arc<dyn ChatModel>, min_content_chars: usize, max_content_chars: usize) -> Self {
        RecordExtractor {
            model,
            min_content_chars,
            max_content_chars,
        }
    }

    /// `None` covers every miss: thin content, model failure, unparsable
    /// reply and records without a usable name.
    pub async fn extract(&self, content: &str, source_url: &CandidateUrl) -> Option<ExtractedRecord> {
        if content.chars().count() < self.min_content_chars {
            log::info!("Skipping extraction for {}: content too short", source_url);
            return None;
        }

        let system = extraction_instruction(source_url);
        let user = format!(
            "Markdown:\n\n{}",
            truncate_chars(content, self.max_content_chars)
        );

        let reply = match self
            .model
            .complete(&system, &user, EXTRACTION_TEMPERATURE)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Extraction request failed for {}: {}", source_url, e);
                return None;
            }
        };

        let record = ExtractedRecord::from_model_output(&reply, source_url);
        if record.is_none() {
            log::warn!("No usable record in extraction reply for {}", source_url);
        }

        record
    }
}

fn extraction_instruction(source_url: &CandidateUrl) -> String {
    format!(
        r#"Extract structured lead information from the following profile page markdown.
Return ONLY a valid JSON object.
Fields to extract:
{{
  "name": string,
  "title": string,
  "company": string,
  "location": string,
  "headline": string,
  "about": string,
  "email": string | null,
  "industry": string,
  "skills": string[],
  "connections": number,
  "seniority": "Entry" | "Mid" | "Senior" | "Director" | "VP" | "C-Suite",
  "experience": [{{"title": string, "company": string, "duration": string}}],
  "education": [{{"school": string, "degree": string, "field": string, "year": string}}],
  "sourceUrl": "{url}",
  "isCompany": {is_company}
}}"#,
        url = source_url,
        is_company = source_url.is_company_page(),
    )
}

fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}
