use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use prism::config::Config;
use prism::services::{
    AnalysisMediator, ExecutionRouter, LanguageModel, LlmClient, MySqlConnector, ResultCache,
    TtlPolicy,
};
use prism::{AppState, handlers, models, services};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Charts
        handlers::chart_data::chart_data,
        // Ask
        handlers::ask::ask,
        // Relationships
        handlers::relationships::infer,
        // Cache
        handlers::cache_admin::stats,
        handlers::cache_admin::clear,
        handlers::cache_admin::invalidate,
    ),
    components(
        schemas(
            handlers::chart_data::ChartDataRequest,
            handlers::chart_data::ChartDataResponse,
            handlers::ask::AskRequest,
            handlers::ask::AskResponse,
            handlers::relationships::InferRelationshipsRequest,
            handlers::relationships::InferRelationshipsResponse,
            handlers::cache_admin::InvalidateResponse,
            handlers::cache_admin::ClearResponse,
            models::ChartType,
            models::ChartConfig,
            models::ChartDatum,
            models::Dialect,
            models::SemanticType,
            models::ColumnDescriptor,
            models::SourceKind,
            models::ConnectionConfig,
            models::DataSourceDescriptor,
            models::AggregationKind,
            models::Metric,
            models::Dimension,
            models::FilterOperator,
            models::FilterPredicate,
            models::SortOrder,
            models::QuerySpec,
            models::RelationshipKind,
            models::Relationship,
            models::TableSchema,
            services::CacheStats,
        )
    ),
    tags(
        (name = "Charts", description = "Chart data execution endpoints"),
        (name = "Analysis", description = "Natural-language analysis endpoints"),
        (name = "Relationships", description = "Schema relationship inference"),
        (name = "Cache", description = "Result cache administration"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Load configuration first
    let config = Config::load()?;

    // Initialize logging
    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);

    let registry = tracing_subscriber::registry().with(log_filter);

    // Keeps the non-blocking file writer alive until shutdown.
    let mut _log_guard: Option<tracing_appender::non_blocking::WorkerGuard> = None;

    // Add file logging if configured
    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("prism.log");
        // Rolling appender adds its own date suffix
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _log_guard = Some(guard);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    tracing::info!("Prism starting up");
    tracing::info!("Configuration loaded successfully");

    // Result cache backed by the in-process store
    let cache = Arc::new(ResultCache::new(&config.cache));
    tracing::info!(
        "Result cache initialized (enabled={}, max_entries={})",
        config.cache.enabled,
        config.cache.max_entries
    );

    let connector = Arc::new(MySqlConnector::new(Duration::from_secs(
        config.query.timeout_secs,
    )));

    let router_service = Arc::new(ExecutionRouter::new(
        Arc::clone(&cache),
        connector,
        TtlPolicy::from_config(&config.cache),
        &config.query,
    ));

    let llm = LlmClient::new(config.llm.clone());
    if llm.is_available() {
        tracing::info!("LLM client initialized (model={})", config.llm.model);
    } else {
        tracing::warn!("LLM client unavailable; /api/ask will return fallback answers");
    }
    let mediator = Arc::new(AnalysisMediator::new(Arc::new(llm)));

    let app_state = AppState {
        router: Arc::clone(&router_service),
        cache: Arc::clone(&cache),
        mediator: Arc::clone(&mediator),
    };
    let app_state_arc = Arc::new(app_state);

    let api_routes = Router::new()
        .route("/api/charts/data", post(handlers::chart_data::chart_data))
        .route("/api/ask", post(handlers::ask::ask))
        .route("/api/relationships/infer", post(handlers::relationships::infer))
        .route("/api/cache/stats", get(handlers::cache_admin::stats))
        .route("/api/cache/clear", post(handlers::cache_admin::clear))
        .route(
            "/api/cache/invalidate/:data_source_id",
            post(handlers::cache_admin::invalidate),
        )
        .with_state(Arc::clone(&app_state_arc));

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check));

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes)
        .merge(health_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("Prism is ready to serve requests");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
