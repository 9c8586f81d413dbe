use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db_storage::Datastore;
use crate::errors::{AppError, ResultExt};
use crate::llm_client::LanguageModel;
use crate::matcher::PropertyMatcher;
use crate::models::{
    ConversationSummary, Message, StartConversationRequest, StartConversationResponse, TurnResult,
};
use crate::prompts::WELCOME_MESSAGE;
use crate::scoring::ScoringPolicy;
use crate::state::ConversationState;
use crate::workflow::{build_lead, qualifies_for_lead_at_end, ConversationWorkflow};

/// Tuning knobs for [`QualificationAgent`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub scoring_policy: ScoringPolicy,
    pub match_limit: usize,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            scoring_policy: ScoringPolicy::Turn,
            match_limit: crate::matcher::DEFAULT_MATCH_LIMIT,
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 10_000,
        }
    }
}

/// Conversation lifecycle: start, continue, read, end.
///
/// Active conversations live in a TTL cache in front of the datastore; the
/// datastore snapshot is the source of truth.
pub struct QualificationAgent {
    store: Arc<dyn Datastore>,
    workflow: ConversationWorkflow,
    cache: Cache<Uuid, ConversationState>,
}

impl QualificationAgent {
    pub fn new(
        store: Arc<dyn Datastore>,
        llm: Arc<dyn LanguageModel>,
        settings: AgentSettings,
    ) -> Self {
        let workflow = ConversationWorkflow::new(
            settings.scoring_policy,
            PropertyMatcher::new(store.clone()),
            llm,
            settings.match_limit,
        );

        let cache = Cache::builder()
            .time_to_live(settings.cache_ttl)
            .max_capacity(settings.cache_capacity)
            .build();

        Self {
            store,
            workflow,
            cache,
        }
    }

    /// Opens a conversation. With an opening message a full turn is run,
    /// otherwise the welcome message is posted.
    pub async fn start(
        &self,
        request: StartConversationRequest,
    ) -> Result<StartConversationResponse, AppError> {
        let mut state = ConversationState::new(request.assigned_agent_id);
        tracing::info!("🆕 Starting conversation {}", state.id());

        let opening = request
            .initial_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let response = match opening {
            Some(message) => {
                let outcome = self.workflow.process_turn(&mut state, message).await?;
                if outcome.should_create_lead {
                    self.try_create_lead(&mut state).await;
                }
                outcome.response
            }
            None => {
                state.push_message(Message::assistant(WELCOME_MESSAGE));
                WELCOME_MESSAGE.to_string()
            }
        };

        let persisted = self.persist(&mut state).await;
        self.cache.insert(state.id(), state.clone()).await;

        Ok(StartConversationResponse {
            conversation_id: state.id(),
            response,
            status: state.status(),
            qualification_score: state.qualification_score(),
            persisted,
        })
    }

    /// Runs one turn on an active conversation.
    pub async fn continue_conversation(
        &self,
        id: Uuid,
        user_message: &str,
    ) -> Result<TurnResult, AppError> {
        let mut state = self.get_or_load(id).await?;
        let outcome = self.workflow.process_turn(&mut state, user_message).await?;

        let mut lead_created = false;
        if outcome.should_create_lead && state.lead_id().is_none() {
            lead_created = self.try_create_lead(&mut state).await.is_some();
        }

        let persisted = self.persist(&mut state).await;
        self.cache.insert(id, state.clone()).await;

        Ok(TurnResult {
            conversation_id: id,
            response: outcome.response,
            qualification_score: state.qualification_score(),
            lead_quality: state.lead_quality(),
            should_create_lead: outcome.should_create_lead,
            lead_created,
            lead_id: state.lead_id(),
            conversation_complete: outcome.conversation_complete,
            properties_shown: !outcome.matched_properties.is_empty(),
            matched_properties_count: outcome.matched_properties.len(),
            criteria_extracted: outcome.criteria_extracted,
            persisted,
        })
    }

    /// Current state, from the cache or the datastore.
    pub async fn get(&self, id: Uuid) -> Result<ConversationState, AppError> {
        self.get_or_load(id).await
    }

    /// Ends a conversation, creating a lead first when the phone-only gate passes.
    pub async fn end(&self, id: Uuid, reason: &str) -> Result<ConversationSummary, AppError> {
        let mut state = self.get_or_load(id).await?;
        if !state.is_active() {
            return Err(AppError::Conflict(format!(
                "Conversation {} is already completed",
                id
            )));
        }

        let mut lead_created = false;
        if state.lead_id().is_none() && qualifies_for_lead_at_end(&state) {
            lead_created = self.try_create_lead(&mut state).await.is_some();
        }

        let summary = self.workflow.finish(&mut state, reason)?;
        let persisted = self.persist(&mut state).await;
        if persisted {
            self.cache.invalidate(&id).await;
        } else {
            // The store still holds the active snapshot; keep serving the completed one
            self.cache.insert(id, state.clone()).await;
        }

        tracing::info!(
            "🏁 Conversation {} ended ({}): score={}, lead={:?}",
            id,
            reason,
            state.qualification_score(),
            state.lead_id()
        );

        Ok(ConversationSummary {
            conversation_id: id,
            status: state.status(),
            qualification_score: state.qualification_score(),
            lead_quality: state.lead_quality(),
            lead_created,
            lead_id: state.lead_id(),
            messages_count: state.messages().len(),
            summary,
            persisted,
        })
    }

    /// Number of cached active conversations.
    pub async fn active_conversations_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache
            .iter()
            .filter(|(_, state)| state.is_active())
            .count() as u64
    }

    /// Cached state first, so a completed conversation whose final save failed
    /// is still served as completed.
    async fn get_or_load(&self, id: Uuid) -> Result<ConversationState, AppError> {
        if let Some(state) = self.cache.get(&id).await {
            tracing::debug!("Cache hit for conversation {}", id);
            return Ok(state);
        }

        let state = self
            .store
            .load_conversation(id)
            .await
            .with_context(|| format!("Failed to load conversation {}", id))?
            .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", id)))?;

        if state.is_active() {
            self.cache.insert(id, state.clone()).await;
        }
        Ok(state)
    }

    /// Saves the snapshot, retrying once. Returns whether it was written.
    async fn persist(&self, state: &mut ConversationState) -> bool {
        state.touch();
        for attempt in 1..=2 {
            match self.store.save_conversation(state).await {
                Ok(()) => return true,
                Err(e) => tracing::error!(
                    "❌ Failed to save conversation {} (attempt {}): {}",
                    state.id(),
                    attempt,
                    e
                ),
            }
        }
        false
    }

    async fn try_create_lead(&self, state: &mut ConversationState) -> Option<Uuid> {
        let lead = build_lead(state);
        match self.store.insert_lead(&lead).await {
            Ok(lead_id) => {
                state.attach_lead(lead_id);
                tracing::info!(
                    "✅ Lead {} created from conversation {} (score {})",
                    lead_id,
                    state.id(),
                    state.qualification_score()
                );
                Some(lead_id)
            }
            Err(e) => {
                tracing::error!(
                    "❌ Lead creation failed for conversation {}: {}",
                    state.id(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{ChatPrompt, LlmError};
    use crate::memory_store::InMemoryDatastore;
    use async_trait::async_trait;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn generate(&self, _prompt: &ChatPrompt) -> Result<String, LlmError> {
            Ok("D'accord.".to_string())
        }
    }

    fn agent(store: Arc<InMemoryDatastore>) -> QualificationAgent {
        QualificationAgent::new(store, Arc::new(EchoModel), AgentSettings::default())
    }

    #[tokio::test]
    async fn test_start_is_persisted_and_cached() {
        let store = Arc::new(InMemoryDatastore::new());
        let agent = agent(store.clone());

        let started = agent
            .start(StartConversationRequest::default())
            .await
            .unwrap();
        assert!(started.persisted);
        assert_eq!(store.conversation_count().await, 1);
        assert_eq!(agent.active_conversations_count().await, 1);
    }

    #[tokio::test]
    async fn test_end_evicts_from_cache() {
        let store = Arc::new(InMemoryDatastore::new());
        let agent = agent(store.clone());

        let started = agent
            .start(StartConversationRequest::default())
            .await
            .unwrap();
        agent
            .end(started.conversation_id, "completed")
            .await
            .unwrap();

        assert_eq!(agent.active_conversations_count().await, 0);
        let reloaded = agent.get(started.conversation_id).await.unwrap();
        assert!(!reloaded.is_active());
        assert_eq!(reloaded.end_reason(), Some("completed"));
    }

    #[tokio::test]
    async fn test_end_twice_conflicts() {
        let agent = agent(Arc::new(InMemoryDatastore::new()));
        let started = agent
            .start(StartConversationRequest::default())
            .await
            .unwrap();
        agent.end(started.conversation_id, "completed").await.unwrap();

        let err = agent
            .end(started.conversation_id, "completed")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
