use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{Pipeline, project};
use crate::inbound::{read_body, read_upload};
use crate::pipeline::Analyzer;

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: Option<PathBuf>) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/analyze").route(web::post().to(analyze_tweet)))
        .service(web::resource("/api/bulk-analyze").route(web::post().to(bulk_analyze)))
        .service(web::resource("/api/meme-analyze").route(web::post().to(meme_analyze)));

    if let Some(dir) = static_dir {
        cfg.service(Files::new("/", dir).index_file("index.html"));
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn analyze_tweet(analyzer: web::Data<Analyzer>, payload: web::Payload) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let body = read_body(payload).await;
    match analyzer.analyze_tweet(request_id, &body).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => project(Pipeline::Tweet, &e),
    }
}

async fn bulk_analyze(analyzer: web::Data<Analyzer>, payload: Multipart) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let upload = match read_upload(payload, "file").await {
        Ok(upload) => upload,
        Err(e) => return project(Pipeline::Batch, &e),
    };
    match analyzer.analyze_batch(request_id, upload).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => project(Pipeline::Batch, &e),
    }
}

async fn meme_analyze(analyzer: web::Data<Analyzer>, payload: Multipart) -> HttpResponse {
    let request_id = Uuid::new_v4();
    let upload = match read_upload(payload, "image").await {
        Ok(upload) => upload,
        Err(e) => return project(Pipeline::Meme, &e),
    };
    match analyzer.analyze_meme(request_id, upload).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => project(Pipeline::Meme, &e),
    }
}
