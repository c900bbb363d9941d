use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menuplan_api::{config::Config, db, routes, services::ai::AiService, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let ai = Arc::new(AiService::new(&config)?);
    if config.ai_api_key.is_none() {
        info!("AI_API_KEY not set — /api/ai/generate will return an error");
    }

    let state = AppState {
        db: pool,
        config: config.clone(),
        ai,
    };

    // Single CORS policy: the configured frontend origin plus localhost for
    // local development.
    let cors_origin = {
        let base = config.app_base_url.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let o = match origin.to_str() {
                Ok(s) => s,
                Err(_) => return false,
            };
            o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base
        })
    };

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/menu",
            get(routes::menu::list_menus).post(routes::menu::create_menu),
        )
        .route("/api/menu/weekly", get(routes::menu::weekly_menu))
        .route("/api/menu/type/{type}", get(routes::menu::list_menus_by_type))
        .route(
            "/api/menu/{id}",
            get(routes::menu::get_menu)
                .put(routes::menu::update_menu)
                .delete(routes::menu::delete_menu),
        )
        .route("/api/ai/generate", axum::routing::post(routes::ai::generate_menu))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("menuplan API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
