use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db_storage::Datastore;
use crate::errors::AppError;
use crate::matcher::PropertyQuery;
use crate::models::{NewLead, Property};
use crate::snapshot::ValidatedSnapshot;
use crate::state::ConversationState;

/// Process-local datastore, used when no database is configured and in tests.
///
/// Conversations are kept as checksummed snapshots, like the SQL store.
#[derive(Default)]
pub struct InMemoryDatastore {
    conversations: RwLock<HashMap<Uuid, ValidatedSnapshot>>,
    leads: RwLock<Vec<NewLead>>,
    properties: RwLock<Vec<Property>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(properties: Vec<Property>) -> Self {
        Self {
            properties: RwLock::new(properties),
            ..Self::default()
        }
    }

    pub async fn add_property(&self, property: Property) {
        self.properties.write().await.push(property);
    }

    /// Inserted leads, in insertion order.
    pub async fn leads(&self) -> Vec<NewLead> {
        self.leads.read().await.clone()
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn load_conversation(&self, id: Uuid) -> Result<Option<ConversationState>, AppError> {
        let conversations = self.conversations.read().await;
        match conversations.get(&id) {
            Some(snapshot) => ValidatedSnapshot::open(&snapshot.data, &snapshot.checksum).map(Some),
            None => Ok(None),
        }
    }

    async fn save_conversation(&self, state: &ConversationState) -> Result<(), AppError> {
        let snapshot = ValidatedSnapshot::seal(state)?;
        self.conversations.write().await.insert(state.id(), snapshot);
        Ok(())
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Uuid, AppError> {
        self.leads.write().await.push(lead.clone());
        Ok(lead.id)
    }

    async fn search_properties(&self, query: &PropertyQuery) -> Result<Vec<Property>, AppError> {
        let properties = self.properties.read().await;
        Ok(properties
            .iter()
            .filter(|p| query.matches(p))
            .take(query.limit)
            .cloned()
            .collect())
    }
}
