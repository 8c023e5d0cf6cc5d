use std::net::TcpListener;

use actix_web::{
    dev::Server,
    error::InternalError,
    middleware::Logger,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};

use crate::{
    routes::{default_route, lead_route, scrape_route, ErrorEnvelope},
    services::{LeadCatalog, LeadPipeline},
};

pub fn run(
    listener: TcpListener,
    pipeline: LeadPipeline,
    catalog: LeadCatalog,
) -> Result<Server, std::io::Error> {
    let pipeline = Data::new(pipeline);
    let catalog = Data::new(catalog);

    // Malformed bodies get the same envelope as pipeline errors
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let response =
            HttpResponse::BadRequest().json(ErrorEnvelope::new(err.to_string(), "bad_request"));
        InternalError::from_response(err, response).into()
    });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .service(default_route::default)
            .service(
                web::scope("/api")
                    .service(scrape_route::real_scrape)
                    .service(scrape_route::scrape)
                    .service(lead_route::get_leads)
                    .service(lead_route::get_lead)
                    .service(lead_route::get_stats),
            )
            .app_data(json_config.clone())
            .app_data(pipeline.clone())
            .app_data(catalog.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
