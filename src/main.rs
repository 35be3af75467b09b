use reveal_backend::api::{app_router, AppState};
use reveal_backend::config::Config;
use reveal_backend::doc::ApiDoc;
use reveal_backend::error::AppError;
use reveal_backend::registry;
use reveal_backend::repo::PgStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let default_level = "debug";
    let base_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let env_filter = base_filter
        .add_directive("sqlx=warn".parse().unwrap())
        .add_directive("sqlx::query=off".parse().unwrap());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cfg = Config::from_env();
    let store = Arc::new(PgStore::connect(&cfg.database_url, cfg.max_connections).await?);
    registry::seed_keys(store.as_ref(), &cfg.seed).await?;

    let app = app_router(AppState::new(store, &cfg.vote_secret))
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()))
        .layer(ServiceBuilder::new().layer(CorsLayer::very_permissive()));

    let addr: SocketAddr = cfg
        .bind
        .parse()
        .map_err(|e| AppError::Validation(format!("invalid bind addr {}: {e}", cfg.bind)))?;
    info!("Starting reveal backend on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
