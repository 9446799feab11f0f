//! Actix-Web dashboard over the country store.
//!
//! The pipeline and the store are blocking (rusqlite, blocking reqwest), so
//! every handler hands its work to `web::block`.

use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use globe_etl::http::{HttpTransport, JsonTransport};
use globe_etl::models::CountryRecordOut;
use globe_etl::pipeline::CollectingReporter;
use globe_etl::{Config, Pipeline, Store, logging, report, stats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state. One transport serves every request.
struct AppState {
    config: Config,
    transport: Arc<dyn JsonTransport>,
}

#[derive(Deserialize)]
struct EtlRequest {
    query: String,
}

#[derive(Serialize)]
struct EtlResult {
    name: String,
    status: Option<globe_etl::UpsertStatus>,
}

#[derive(Deserialize)]
struct ChartParams {
    country: String,
}

/// Run blocking library work on the thread pool and flatten both failure layers.
async fn blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> globe_etl::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match web::block(f).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn internal_error(message: String) -> HttpResponse {
    log::error!("{message}");
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": message }))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

async fn home(state: web::Data<AppState>) -> HttpResponse {
    let config = state.config.clone();
    let result = blocking(move || {
        let store = Store::open(&config.db_path)?;
        store.read_all()
    })
    .await;
    match result {
        Ok(rows) => {
            let page = format!(
                "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>Global Data</title></head>\n\
                 <body><h1>Global Data Dashboard</h1>\n<p>Countries stored: {}</p>\n<pre>{}</pre>\n</body></html>\n",
                rows.len(),
                escape_html(&report::render_table(&rows))
            );
            HttpResponse::Ok()
                .content_type("text/html; charset=utf-8")
                .body(page)
        }
        Err(e) => internal_error(e),
    }
}

async fn countries(state: web::Data<AppState>) -> HttpResponse {
    let config = state.config.clone();
    let result = blocking(move || {
        let rows = Store::open(&config.db_path)?.read_all()?;
        Ok(rows.iter().map(CountryRecordOut::from).collect::<Vec<_>>())
    })
    .await;
    match result {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => internal_error(e),
    }
}

async fn run_etl(state: web::Data<AppState>, body: web::Json<EtlRequest>) -> HttpResponse {
    let query = body.into_inner().query.trim().to_string();
    if query.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "query is empty" }));
    }
    let config = state.config.clone();
    let transport = Arc::clone(&state.transport);
    let result = blocking(move || {
        let store = Store::open(&config.db_path)?;
        let pipeline = Pipeline::new(&config, transport, store);
        let mut reporter = CollectingReporter::default();
        Ok(pipeline.run(&query, &mut reporter))
    })
    .await;
    match result {
        Ok(summary) => {
            let results: Vec<EtlResult> = summary
                .rows
                .iter()
                .zip(&summary.statuses)
                .map(|(row, status)| EtlResult {
                    name: row.name.clone(),
                    status: *status,
                })
                .collect();
            HttpResponse::Ok().json(serde_json::json!({
                "query": &summary.query,
                "processed": summary.processed(),
                "dropped": summary.dropped.len(),
                "source_error": summary.source_error.as_ref().map(ToString::to_string),
                "results": results,
            }))
        }
        Err(e) => internal_error(e),
    }
}

async fn chart_data(state: web::Data<AppState>, params: web::Query<ChartParams>) -> HttpResponse {
    let config = state.config.clone();
    let country = params.into_inner().country;
    let result = blocking(move || Store::open(&config.db_path)?.get(&country)).await;
    match result {
        Ok(Some(row)) => {
            let c = row.weather.temperature_celsius();
            let f = row.weather.temperature_fahrenheit();
            HttpResponse::Ok().json(serde_json::json!({
                "ok": true,
                "timestamps": [row.timestamp, row.last_updated],
                "temp_c": [c, c],
                "temp_f": [f, f],
            }))
        }
        Ok(None) => HttpResponse::Ok().json(serde_json::json!({ "ok": false })),
        Err(e) => internal_error(e),
    }
}

async fn region_stats(state: web::Data<AppState>) -> HttpResponse {
    let config = state.config.clone();
    let result = blocking(move || {
        let rows = Store::open(&config.db_path)?.read_all()?;
        Ok(stats::grouped_summary(&rows))
    })
    .await;
    match result {
        Ok(summaries) => HttpResponse::Ok().json(summaries),
        Err(e) => internal_error(e),
    }
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    let config = state.config.clone();
    let transport = Arc::clone(&state.transport);
    let result = blocking(move || {
        let store = if config.db_path.exists() {
            Some(Store::open(&config.db_path)?)
        } else {
            None
        };
        Ok(report::health_check(transport.as_ref(), &config, store.as_ref()))
    })
    .await;
    match result {
        Ok(checked) => HttpResponse::Ok().json(checked),
        Err(e) => internal_error(e),
    }
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home)).service(
        web::scope("/api")
            .route("/countries", web::get().to(countries))
            .route("/etl", web::post().to(run_etl))
            .route("/chart-data", web::get().to(chart_data))
            .route("/stats", web::get().to(region_stats))
            .route("/health", web::get().to(health)),
    );
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(std::io::Error::other)?;
    logging::init(config.log_file.as_deref()).map_err(std::io::Error::other)?;

    let transport: Arc<dyn JsonTransport> =
        Arc::new(HttpTransport::new(&config).map_err(std::io::Error::other)?);
    let state = web::Data::new(AppState { config, transport });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
