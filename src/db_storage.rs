use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::matcher::PropertyQuery;
use crate::models::{NewLead, Property};
use crate::snapshot::ValidatedSnapshot;
use crate::state::ConversationState;

/// Persistence collaborator for conversations, leads and the property inventory.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Loads a conversation snapshot. `Ok(None)` when the id is unknown.
    async fn load_conversation(&self, id: Uuid) -> Result<Option<ConversationState>, AppError>;

    /// Upserts the full conversation snapshot by id.
    async fn save_conversation(&self, state: &ConversationState) -> Result<(), AppError>;

    /// Inserts a lead and returns its id. Not idempotent.
    async fn insert_lead(&self, lead: &NewLead) -> Result<Uuid, AppError>;

    /// Returns available listings matching every filter of `query`, at most `query.limit`.
    async fn search_properties(&self, query: &PropertyQuery) -> Result<Vec<Property>, AppError>;
}

/// Postgres-backed datastore (see `sql/schema.sql`).
pub struct PgDatastore {
    pool: PgPool,
}

impl PgDatastore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    async fn load_conversation(&self, id: Uuid) -> Result<Option<ConversationState>, AppError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT state::text, state_checksum FROM conversations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load conversation {}", id))?;

        match row {
            Some((raw, checksum)) => ValidatedSnapshot::open(&raw, &checksum).map(Some),
            None => Ok(None),
        }
    }

    async fn save_conversation(&self, state: &ConversationState) -> Result<(), AppError> {
        let snapshot = ValidatedSnapshot::seal(state)?;

        sqlx::query(
            r#"
            INSERT INTO conversations (
                id, state, state_checksum, qualification_score, lead_quality,
                status, lead_id, assigned_agent_id, created_at, updated_at
            )
            VALUES ($1, $2::jsonb, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                state = EXCLUDED.state,
                state_checksum = EXCLUDED.state_checksum,
                qualification_score = EXCLUDED.qualification_score,
                lead_quality = EXCLUDED.lead_quality,
                status = EXCLUDED.status,
                lead_id = EXCLUDED.lead_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(state.id())
        .bind(&snapshot.data)
        .bind(&snapshot.checksum)
        .bind(state.qualification_score() as i32)
        .bind(state.lead_quality().as_str())
        .bind(state.status().as_str())
        .bind(state.lead_id())
        .bind(state.assigned_agent_id())
        .bind(state.created_at())
        .bind(state.updated_at())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save conversation {}", state.id()))?;

        tracing::debug!("💾 Conversation {} saved", state.id());
        Ok(())
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO leads (
                id, name, phone, phone_e164, email, status, priority, source,
                budget_min, budget_max, preferred_cities, preferred_districts,
                property_types, transaction_type, min_bedrooms, min_area,
                must_have_parking, must_have_garden, must_have_pool, must_have_elevator,
                qualification_score, ai_conversation_summary, conversation_id,
                assigned_to, created_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            RETURNING id
            "#,
        )
        .bind(lead.id)
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.phone_e164)
        .bind(&lead.email)
        .bind(lead.status.as_str())
        .bind(lead.priority.as_str())
        .bind(lead.source.as_str())
        .bind(lead.budget_min.map(BigDecimal::from))
        .bind(lead.budget_max.map(BigDecimal::from))
        .bind(&lead.preferred_cities)
        .bind(&lead.preferred_districts)
        .bind(&lead.property_types)
        .bind(&lead.transaction_type)
        .bind(lead.min_bedrooms)
        .bind(lead.min_area)
        .bind(lead.must_have_parking)
        .bind(lead.must_have_garden)
        .bind(lead.must_have_pool)
        .bind(lead.must_have_elevator)
        .bind(lead.qualification_score)
        .bind(&lead.ai_conversation_summary)
        .bind(lead.conversation_id)
        .bind(&lead.assigned_to)
        .bind(lead.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert lead")?;

        tracing::info!("✅ Lead {} created", id);
        Ok(id)
    }

    async fn search_properties(&self, query: &PropertyQuery) -> Result<Vec<Property>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, title, transaction_type, property_type, city, district, \
             price::float8 AS price, bedrooms, area, is_available \
             FROM properties WHERE is_available = TRUE",
        );

        if !query.cities.is_empty() {
            qb.push(" AND city = ANY(")
                .push_bind(query.cities.clone())
                .push(")");
        }
        if !query.districts.is_empty() {
            qb.push(" AND district = ANY(")
                .push_bind(query.districts.clone())
                .push(")");
        }
        if !query.property_types.is_empty() {
            qb.push(" AND property_type = ANY(")
                .push_bind(query.property_types.clone())
                .push(")");
        }
        if let Some(transaction_type) = &query.transaction_type {
            qb.push(" AND transaction_type = ")
                .push_bind(transaction_type.clone());
        }
        if let Some(min) = query.price_min {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = query.price_max {
            qb.push(" AND price <= ").push_bind(max);
        }
        if let Some(bedrooms) = query.min_bedrooms {
            qb.push(" AND bedrooms >= ").push_bind(bedrooms);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.limit as i64);

        let properties = qb
            .build_query_as::<Property>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to search properties")?;

        Ok(properties)
    }
}
