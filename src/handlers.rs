use crate::agent::QualificationAgent;
use crate::errors::AppError;
use crate::models::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

/// Longest accepted prospect message, in characters.
pub const MAX_USER_MESSAGE_CHARS: usize = 1000;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Conversation lifecycle and its collaborators.
    pub agent: Arc<QualificationAgent>,
}

/// Error payload returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SABBAR Lead Qualification API",
        description = "Conversational qualification of real-estate prospects"
    ),
    paths(
        start_conversation,
        continue_conversation,
        get_conversation,
        end_conversation,
        conversation_stats
    ),
    components(schemas(
        StartConversationRequest,
        StartConversationResponse,
        ContinueConversationRequest,
        TurnResult,
        EndConversationRequest,
        ConversationSummary,
        ConversationView,
        StatsResponse,
        CriteriaFlags,
        Criteria,
        ContactInfo,
        Message,
        Role,
        PropertyType,
        TransactionType,
        Amenity,
        LeadQuality,
        ConversationStatus,
        ErrorBody
    )),
    tags((name = "conversations", description = "Prospect qualification conversations"))
)]
pub struct ApiDoc;

/// Health check endpoint.
///
/// Returns the service status and version. Not rate limited.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-sabbar-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api-docs/openapi.json
pub async fn serve_openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Serves the Swagger UI HTML page, loading the spec from `serve_openapi_spec`.
pub async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="fr">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>SABBAR API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// POST /api/v1/conversations/start
///
/// Opens a conversation. With `initial_message` the first turn is processed
/// immediately; otherwise the welcome message is returned.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/start",
    request_body = StartConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = StartConversationResponse),
        (status = 400, description = "Invalid opening message", body = ErrorBody)
    ),
    tag = "conversations"
)]
pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<StartConversationResponse>), AppError> {
    tracing::info!(
        "POST /conversations/start - with opening message: {}",
        payload.initial_message.is_some()
    );

    if let Some(message) = &payload.initial_message {
        if message.chars().count() > MAX_USER_MESSAGE_CHARS {
            return Err(AppError::BadRequest(format!(
                "initial_message must be at most {} characters",
                MAX_USER_MESSAGE_CHARS
            )));
        }
    }

    let response = state.agent.start(payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/conversations/continue/:id
#[utoipa::path(
    post,
    path = "/api/v1/conversations/continue/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = ContinueConversationRequest,
    responses(
        (status = 200, description = "Turn processed", body = TurnResult),
        (status = 400, description = "Empty or oversized message", body = ErrorBody),
        (status = 404, description = "Unknown conversation", body = ErrorBody),
        (status = 409, description = "Conversation already completed", body = ErrorBody)
    ),
    tag = "conversations"
)]
pub async fn continue_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ContinueConversationRequest>,
) -> Result<Json<TurnResult>, AppError> {
    tracing::info!("POST /conversations/continue/{}", id);

    let message = validate_user_message(&payload.user_message)?;
    let result = state.agent.continue_conversation(id, message).await?;

    Ok(Json(result))
}

/// GET /api/v1/conversations/:id
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation state", body = ConversationView),
        (status = 404, description = "Unknown conversation", body = ErrorBody)
    ),
    tag = "conversations"
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationView>, AppError> {
    tracing::info!("GET /conversations/{}", id);

    let conversation = state.agent.get(id).await?;
    Ok(Json(conversation.view()))
}

/// POST /api/v1/conversations/:id/end
///
/// Body is optional; `reason` defaults to "completed".
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/end",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = EndConversationRequest,
    responses(
        (status = 200, description = "Conversation ended", body = ConversationSummary),
        (status = 404, description = "Unknown conversation", body = ErrorBody),
        (status = 409, description = "Conversation already completed", body = ErrorBody)
    ),
    tag = "conversations"
)]
pub async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<EndConversationRequest>>,
) -> Result<Json<ConversationSummary>, AppError> {
    tracing::info!("POST /conversations/{}/end", id);

    let reason = payload
        .and_then(|Json(body)| body.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "completed".to_string());

    let summary = state.agent.end(id, &reason).await?;
    Ok(Json(summary))
}

/// GET /api/v1/conversations/stats
#[utoipa::path(
    get,
    path = "/api/v1/conversations/stats",
    responses((status = 200, description = "Conversation counters", body = StatsResponse)),
    tag = "conversations"
)]
pub async fn conversation_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    tracing::info!("GET /conversations/stats");

    Json(StatsResponse {
        active_conversations_count: state.agent.active_conversations_count().await,
    })
}

/// Trims the message and enforces `1..=1000` characters.
pub fn validate_user_message(raw: &str) -> Result<&str, AppError> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest(
            "user_message cannot be empty".to_string(),
        ));
    }
    if message.chars().count() > MAX_USER_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "user_message must be at most {} characters",
            MAX_USER_MESSAGE_CHARS
        )));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentSettings;
    use crate::llm_client::{ChatPrompt, LanguageModel, LlmError};
    use crate::memory_store::InMemoryDatastore;
    use async_trait::async_trait;

    struct FixedModel;

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn generate(&self, _prompt: &ChatPrompt) -> Result<String, LlmError> {
            Ok("Très bien.".to_string())
        }
    }

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            agent: Arc::new(QualificationAgent::new(
                Arc::new(InMemoryDatastore::new()),
                Arc::new(FixedModel),
                AgentSettings::default(),
            )),
        })
    }

    #[tokio::test]
    async fn test_start_then_stats() {
        let state = app_state();

        let (status, Json(started)) = start_conversation(
            State(state.clone()),
            Json(StartConversationRequest::default()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(started.persisted);

        let Json(stats) = conversation_stats(State(state)).await;
        assert_eq!(stats.active_conversations_count, 1);
    }

    #[tokio::test]
    async fn test_oversized_opening_message_rejected() {
        let request = StartConversationRequest {
            initial_message: Some("a".repeat(MAX_USER_MESSAGE_CHARS + 1)),
            ..Default::default()
        };
        let err = start_conversation(State(app_state()), Json(request))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_user_message_validation() {
        assert!(validate_user_message("").is_err());
        assert!(validate_user_message("   \n").is_err());
        assert_eq!(validate_user_message("  bonjour ").unwrap(), "bonjour");

        let at_limit = "é".repeat(MAX_USER_MESSAGE_CHARS);
        assert!(validate_user_message(&at_limit).is_ok());
        let too_long = "a".repeat(MAX_USER_MESSAGE_CHARS + 1);
        assert!(validate_user_message(&too_long).is_err());
    }

    #[test]
    fn test_openapi_lists_conversation_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        assert!(paths.contains(&"/api/v1/conversations/start".to_string()));
        assert!(paths.contains(&"/api/v1/conversations/{id}/end".to_string()));
        assert!(paths.contains(&"/api/v1/conversations/stats".to_string()));
    }
}
