use actix_web::{http::StatusCode, post, web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{lead::NormalizedLead, search::SearchFilters},
    services::{LeadCatalog, LeadPipeline, PipelineError},
};

use super::ErrorEnvelope;

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::BadRequest => StatusCode::BAD_REQUEST,
            PipelineError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::NoTargetsFound => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::QuotaExhausted(_) => StatusCode::PAYMENT_REQUIRED,
            PipelineError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PipelineError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorEnvelope::new(self.to_string(), self.kind()))
    }
}

#[derive(Deserialize)]
struct RealScrapeBody {
    #[serde(default)]
    query: String,
}

#[post("/real-scrape")]
async fn real_scrape(
    pipeline: web::Data<LeadPipeline>,
    body: web::Json<RealScrapeBody>,
) -> Result<HttpResponse, PipelineError> {
    log::info!("Running lead pipeline for query: {}", body.query);

    let output = pipeline.run(&body.query).await?;

    Ok(HttpResponse::Ok().json(output))
}

#[derive(Deserialize)]
struct ScrapeBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    filters: SearchFilters,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeJob {
    job_id: String,
    status: &'static str,
    total_found: usize,
    leads: Vec<NormalizedLead>,
    message: String,
}

/// Simulated scrape job answered from the local catalog.
#[post("/scrape")]
async fn scrape(catalog: web::Data<LeadCatalog>, body: web::Json<ScrapeBody>) -> HttpResponse {
    let ScrapeBody { query, mut filters } = body.into_inner();
    filters.query = Some(query.clone());

    let leads = catalog.matching(&filters);

    HttpResponse::Ok().json(ScrapeJob {
        job_id: format!("job_{}", Uuid::new_v4()),
        status: "completed",
        total_found: leads.len(),
        message: format!("Scraped {} leads for query: \"{}\"", leads.len(), query),
        leads,
    })
}
