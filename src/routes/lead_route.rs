use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::{
    domain::search::{SearchFilters, DEFAULT_PAGE_SIZE},
    services::LeadCatalog,
};

use super::ErrorEnvelope;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLeadsQuery {
    q: Option<String>,
    industry: Option<String>,
    location: Option<String>,
    seniority: Option<String>,
    company_size: Option<String>,
    connection_degree: Option<String>,
    #[serde(default)]
    open_to_work: bool,
    page: Option<usize>,
    limit: Option<usize>,
}

#[get("/leads")]
async fn get_leads(catalog: web::Data<LeadCatalog>, query: web::Query<GetLeadsQuery>) -> HttpResponse {
    let query = query.into_inner();
    let filters = SearchFilters {
        query: query.q,
        industry: query.industry,
        location: query.location,
        seniority: query.seniority,
        company_size: query.company_size,
        connection_degree: query.connection_degree,
        open_to_work: query.open_to_work,
    };

    let result = catalog.search(
        &filters,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
    );

    HttpResponse::Ok().json(result)
}

#[get("/leads/{id}")]
async fn get_lead(catalog: web::Data<LeadCatalog>, id: web::Path<String>) -> HttpResponse {
    match catalog.get(&id) {
        Some(lead) => HttpResponse::Ok().json(lead),
        None => HttpResponse::NotFound().json(ErrorEnvelope::new("Lead not found", "not_found")),
    }
}

#[get("/stats")]
async fn get_stats(catalog: web::Data<LeadCatalog>) -> HttpResponse {
    HttpResponse::Ok().json(catalog.stats(Utc::now().date_naive()))
}
