use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use personalization_service::config::Config;
use personalization_service::handlers::{self, AppEngine, EngineHandlerState};
use personalization_service::models::Product;
use personalization_service::services::{
    InMemoryAssignmentStore, InMemoryCatalog, InMemoryProfileStore, InMemorySwipeLedger,
    RecommendationEngine,
};

fn load_catalog_seed(catalog: &InMemoryCatalog, path: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog seed file {}", path))?;
    let products: Vec<Product> =
        serde_json::from_str(&raw).context("failed to parse catalog seed file")?;

    let count = products.len();
    for product in products {
        catalog.upsert(product);
    }
    Ok(count)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "personalization_service=info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    let port = config.service.http_port;

    info!(
        service = %config.service.service_name,
        port = port,
        "Starting personalization service"
    );

    let catalog = Arc::new(InMemoryCatalog::new());
    if let Some(path) = &config.service.catalog_path {
        match load_catalog_seed(&catalog, path) {
            Ok(count) => info!(count = count, path = %path, "Catalog seeded"),
            Err(err) => warn!(error = %err, "Catalog seed skipped"),
        }
    }

    let engine: Arc<AppEngine> = Arc::new(RecommendationEngine::new(
        catalog,
        Arc::new(InMemorySwipeLedger::new()),
        Arc::new(InMemoryProfileStore::new()),
        Arc::new(InMemoryAssignmentStore::new()),
        config,
    ));

    let state = web::Data::new(EngineHandlerState { engine });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(handlers::health)
            .service(handlers::get_recommendations)
            .service(handlers::record_swipe)
            .service(handlers::get_experiment_variant)
            .service(handlers::save_onboarding)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
