use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_sabbar_api::agent::{AgentSettings, QualificationAgent};
use rust_sabbar_api::config::Config;
use rust_sabbar_api::db::Database;
use rust_sabbar_api::db_storage::{Datastore, PgDatastore};
use rust_sabbar_api::handlers::{self, AppState};
use rust_sabbar_api::llm_client::{GenerationParams, HuggingFaceClient};
use rust_sabbar_api::memory_store::InMemoryDatastore;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the datastore (Postgres or in-memory),
/// the inference client and the conversation agent, then serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_sabbar_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Datastore> = match &config.database_url {
        Some(url) => {
            let db = Database::new(url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(PgDatastore::new(db.pool))
        }
        None => {
            tracing::warn!("⚠️ No DATABASE_URL set, conversations and leads are kept in memory");
            Arc::new(InMemoryDatastore::new())
        }
    };

    let llm = HuggingFaceClient::new(
        &config.llm_base_url,
        &config.llm_model,
        config.hf_api_token.clone(),
        GenerationParams {
            max_new_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
        },
        Duration::from_secs(config.llm_timeout_secs),
    )?;
    tracing::info!("✓ Inference client initialized: {}", llm.api_url());

    let agent = QualificationAgent::new(
        store,
        Arc::new(llm),
        AgentSettings {
            scoring_policy: config.scoring_policy,
            match_limit: config.match_limit,
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            cache_capacity: config.cache_capacity,
        },
    );
    tracing::info!(
        "Conversation cache initialized ({}s TTL, {} capacity)",
        config.cache_ttl_secs,
        config.cache_capacity
    );

    let app_state = Arc::new(AppState {
        agent: Arc::new(agent),
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(handlers::serve_swagger_ui))
        .route("/api-docs/openapi.json", get(handlers::serve_openapi_spec))
        // Conversation endpoints
        .route(
            "/api/v1/conversations/start",
            post(handlers::start_conversation),
        )
        .route(
            "/api/v1/conversations/continue/:id",
            post(handlers::continue_conversation),
        )
        .route(
            "/api/v1/conversations/stats",
            get(handlers::conversation_stats),
        )
        .route("/api/v1/conversations/:id", get(handlers::get_conversation))
        .route(
            "/api/v1/conversations/:id/end",
            post(handlers::end_conversation),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
