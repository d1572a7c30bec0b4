mod clients;
mod config;
mod error;
mod inbound;
mod normalize;
mod observe;
mod outbound;
mod pipeline;
mod routes;
mod stats;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use clients::classifier::HttpClassifier;
use clients::gemini::GeminiClient;
use config::AppConfig;
use observe::{LogSink, Observer};
use pipeline::Analyzer;
use routes::configure_routes;
use std::sync::Arc;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    config.log_summary();

    let http_client = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .map_err(|e| startup_error("Failed to build HTTP client", e))?;

    let classifier = HttpClassifier::new(http_client.clone(), &config.classifier_url)
        .map_err(|e| startup_error("Invalid classification backend URL", e))?;
    let gemini = GeminiClient::new(http_client, &config.gemini)
        .map_err(|e| startup_error("Invalid Gemini endpoint", e))?;

    let analyzer = web::Data::new(Analyzer::new(
        Arc::new(classifier),
        Arc::new(gemini),
        Observer::new(Arc::new(LogSink)),
    ));

    let bind_address = format!("0.0.0.0:{}", config.port);
    let static_dir = config.static_dir.clone();

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(analyzer.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
