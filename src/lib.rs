//! SABBAR Lead Qualification API Library
//!
//! Conversational qualification of real-estate prospects: every prospect
//! message is mined for search criteria and contact details, scored, matched
//! against the property catalogue and answered by a hosted language model.
//! Qualified conversations become leads.
//!
//! # Modules
//!
//! - `agent`: Conversation lifecycle and the active-conversation cache.
//! - `workflow`: Per-turn transitions and lead/search/completion decisions.
//! - `extraction`: Rule-based criteria and contact extraction from French text.
//! - `scoring`: Qualification score and lead quality tiers.
//! - `matcher`: Criteria to property search translation and rendering.
//! - `llm_client`: Hugging Face inference client behind the `LanguageModel` trait.
//! - `circuit_breaker`: Circuit breaker around model calls.
//! - `prompts`: Persona, welcome text and reply context.
//! - `state`: The conversation state.
//! - `snapshot`: Checksummed conversation snapshots.
//! - `db_storage`: `Datastore` trait and its Postgres implementation.
//! - `memory_store`: In-memory `Datastore`.
//! - `db`: Database connection and pool management.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers and OpenAPI document.
//! - `models`: Domain and API data models.
//! - `validation`: Email and Moroccan phone validation.

pub mod agent;
pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod extraction;
pub mod handlers;
pub mod llm_client;
pub mod matcher;
pub mod memory_store;
pub mod models;
pub mod prompts;
pub mod scoring;
pub mod snapshot;
pub mod state;
pub mod validation;
pub mod workflow;
