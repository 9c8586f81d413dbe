//! Per-turn conversation transitions.
//!
//! `Active --turn--> Active`, `Active --end--> Completed`. A failed reply
//! degrades to a canned message; there is no error state.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{extract, extract_contact, user_transcript};
use crate::llm_client::{ChatPrompt, LanguageModel};
use crate::matcher::{format_mad, PropertyMatcher};
use crate::models::{
    Amenity, CriteriaFlags, LeadPriority, LeadSource, LeadStatus, Message, NewLead, Property,
};
use crate::prompts::system_prompt_with_context;
use crate::scoring::{classify, ScoringPolicy, HOT_THRESHOLD, WARM_THRESHOLD};
use crate::state::ConversationState;
use crate::validation::validate_ma_phone;

/// A conversation with more messages than this is considered complete.
pub const MAX_MESSAGES: usize = 20;

static FAREWELL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:merci|au revoir|bye|goodbye|stop|terminé|fini|ça suffit|ca suffit)\b").unwrap()
});

static PROPERTIES_REQUEST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:propriétés?|proprietes?|biens|annonces?|offres|listings?|properties)\b").unwrap()
});

/// Decisions taken during one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub should_create_lead: bool,
    pub conversation_complete: bool,
    /// Listings found by this turn's search (empty when no search ran).
    pub matched_properties: Vec<Property>,
    pub criteria_extracted: CriteriaFlags,
}

/// Orchestrates extraction, scoring, matching and reply generation.
#[derive(Clone)]
pub struct ConversationWorkflow {
    policy: ScoringPolicy,
    matcher: PropertyMatcher,
    llm: Arc<dyn LanguageModel>,
    match_limit: usize,
}

impl ConversationWorkflow {
    pub fn new(
        policy: ScoringPolicy,
        matcher: PropertyMatcher,
        llm: Arc<dyn LanguageModel>,
        match_limit: usize,
    ) -> Self {
        Self {
            policy,
            matcher,
            llm,
            match_limit,
        }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    /// Runs one turn for `user_message` against an active conversation.
    ///
    /// Criteria, contact and score are updated before the reply is generated,
    /// so a model failure never loses them. Lead creation is left to the caller.
    pub async fn process_turn(
        &self,
        state: &mut ConversationState,
        user_message: &str,
    ) -> Result<TurnOutcome, AppError> {
        if !state.is_active() {
            return Err(AppError::Conflict(format!(
                "Conversation {} is already completed",
                state.id()
            )));
        }

        state.push_message(Message::user(user_message));
        state.bump_engagement();

        let transcript = user_transcript(state.messages());
        state.merge_extraction(extract(&transcript), extract_contact(&transcript));

        let breakdown =
            self.policy
                .breakdown(state.criteria(), state.contact_info(), state.engagement_level());
        let score = breakdown.total();
        state.set_score(score, classify(score));
        tracing::debug!(
            "📊 Conversation {} scored {} ({:?}, policy {:?})",
            state.id(),
            score,
            breakdown,
            self.policy
        );

        let mut matched = Vec::new();
        if should_search_properties(state, user_message) {
            matched = self
                .matcher
                .match_properties(state.criteria(), self.match_limit)
                .await;
            state.record_search(matched.clone());
        }

        let prompt = ChatPrompt {
            system: system_prompt_with_context(state, &matched),
            messages: state.messages().to_vec(),
        };
        let response = match self.llm.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    "⚠️ Reply generation failed for conversation {}: {}",
                    state.id(),
                    e
                );
                e.fallback_reply().to_string()
            }
        };
        state.push_message(Message::assistant(response.clone()));

        let outcome = TurnOutcome {
            response,
            should_create_lead: should_create_lead(state),
            conversation_complete: is_conversation_complete(state, user_message),
            matched_properties: matched,
            criteria_extracted: criteria_flags(state),
        };

        tracing::info!(
            "💬 Conversation {} turn processed: score={}, quality={}, lead_ready={}, complete={}",
            state.id(),
            state.qualification_score(),
            state.lead_quality(),
            outcome.should_create_lead,
            outcome.conversation_complete
        );

        Ok(outcome)
    }

    /// Terminal transition. Lead creation (phone-only gate) is done by the caller
    /// beforehand; this stamps the summary and completion fields.
    pub fn finish(&self, state: &mut ConversationState, reason: &str) -> Result<String, AppError> {
        if !state.is_active() {
            return Err(AppError::Conflict(format!(
                "Conversation {} is already completed",
                state.id()
            )));
        }
        let summary = generate_summary(state);
        state.complete(reason.to_string(), summary.clone());
        Ok(summary)
    }
}

/// At least two of {budget, location, type} are known, and either nothing was
/// shown yet or the prospect explicitly asks for listings.
pub fn should_search_properties(state: &ConversationState, latest_message: &str) -> bool {
    let c = state.criteria();
    let known = [c.has_budget(), c.has_location(), c.has_property_type()]
        .iter()
        .filter(|b| **b)
        .count();

    known >= 2
        && (!state.properties_shown()
            || PROPERTIES_REQUEST_PATTERN.is_match(&latest_message.to_lowercase()))
}

/// Turn-time lead gate: warm score, name and phone.
pub fn should_create_lead(state: &ConversationState) -> bool {
    let contact = state.contact_info();
    state.qualification_score() >= WARM_THRESHOLD && contact.name.is_some() && contact.phone.is_some()
}

/// End-of-conversation lead gate: warm score and phone; the name is optional.
pub fn qualifies_for_lead_at_end(state: &ConversationState) -> bool {
    state.qualification_score() >= WARM_THRESHOLD && state.contact_info().phone.is_some()
}

pub fn is_conversation_complete(state: &ConversationState, latest_message: &str) -> bool {
    state.qualification_score() >= HOT_THRESHOLD
        || state.messages().len() > MAX_MESSAGES
        || FAREWELL_PATTERN.is_match(&latest_message.to_lowercase())
}

pub fn criteria_flags(state: &ConversationState) -> CriteriaFlags {
    let c = state.criteria();
    CriteriaFlags {
        budget: c.has_budget(),
        location: c.has_location(),
        property_type: c.has_property_type(),
        contact: state.contact_info().phone.is_some(),
    }
}

/// One-line French summary, e.g.
/// `Prospect Karim recherche appartement à Casablanca budget max 1 500 000 MAD (Score: 75/100)`.
pub fn generate_summary(state: &ConversationState) -> String {
    let criteria = state.criteria();
    let contact = state.contact_info();

    let mut summary = String::from("Prospect ");
    if let Some(name) = &contact.name {
        summary.push_str(name);
        summary.push(' ');
    }
    summary.push_str("recherche ");

    if criteria.property_types.is_empty() {
        summary.push_str("un bien ");
    } else {
        let types: Vec<_> = criteria.property_types.iter().map(|t| t.label_fr()).collect();
        summary.push_str(&types.join(", "));
        summary.push(' ');
    }

    if let Some(t) = criteria.transaction_type {
        summary.push_str(&format!("en {} ", t.label_fr()));
    }

    let places: Vec<&str> = criteria
        .cities
        .iter()
        .chain(criteria.neighborhoods.iter())
        .map(String::as_str)
        .collect();
    if !places.is_empty() {
        summary.push_str(&format!("à {} ", places.join(", ")));
    }

    if let Some(min) = criteria.budget_min {
        summary.push_str(&format!("budget min {} MAD ", format_mad(min)));
    }
    if let Some(max) = criteria.budget_max {
        summary.push_str(&format!("budget max {} MAD ", format_mad(max)));
    }

    summary.push_str(&format!("(Score: {}/100)", state.qualification_score()));
    summary
}

/// Snapshot of the conversation as a lead row.
pub fn build_lead(state: &ConversationState) -> NewLead {
    let criteria = state.criteria();
    let contact = state.contact_info();

    let phone_e164 = contact.phone.as_deref().and_then(|raw| {
        let (valid, normalized) = validate_ma_phone(raw);
        valid.then_some(normalized)
    });

    NewLead {
        id: Uuid::new_v4(),
        name: contact
            .name
            .clone()
            .unwrap_or_else(|| "Prospect".to_string()),
        phone: contact.phone.clone(),
        phone_e164,
        email: contact.email.clone(),
        status: LeadStatus::New,
        priority: LeadPriority::from(state.lead_quality()),
        source: LeadSource::AgentIa,
        budget_min: criteria.budget_min,
        budget_max: criteria.budget_max,
        preferred_cities: criteria.cities.iter().cloned().collect(),
        preferred_districts: criteria.neighborhoods.iter().cloned().collect(),
        property_types: criteria
            .property_types
            .iter()
            .map(|t| t.as_str().to_string())
            .collect(),
        transaction_type: criteria.transaction_type.map(|t| t.as_str().to_string()),
        min_bedrooms: criteria.rooms.and_then(|r| i32::try_from(r).ok()),
        min_area: criteria.area.and_then(|a| i32::try_from(a).ok()),
        must_have_parking: criteria.amenities.contains(&Amenity::Parking),
        must_have_garden: criteria.amenities.contains(&Amenity::Garden),
        must_have_pool: criteria.amenities.contains(&Amenity::Pool),
        must_have_elevator: criteria.amenities.contains(&Amenity::Elevator),
        qualification_score: state.qualification_score() as i32,
        ai_conversation_summary: generate_summary(state),
        conversation_id: state.id(),
        assigned_to: state.assigned_agent_id().map(str::to_string),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactInfo, Criteria, LeadQuality, PropertyType};

    fn state_with(criteria: Criteria, contact: ContactInfo, score: u8) -> ConversationState {
        let mut state = ConversationState::new(None);
        state.merge_extraction(criteria, contact);
        state.set_score(score, classify(score));
        state
    }

    fn located_criteria() -> Criteria {
        let mut c = Criteria {
            budget_max: Some(2_000_000),
            ..Default::default()
        };
        c.cities.insert("Rabat".into());
        c
    }

    #[test]
    fn test_turn_gate_requires_name_and_phone() {
        let name_only = ContactInfo {
            name: Some("Karim".into()),
            ..Default::default()
        };
        let state = state_with(located_criteria(), name_only, 55);
        assert!(!should_create_lead(&state));
        assert!(!qualifies_for_lead_at_end(&state));

        let both = ContactInfo {
            name: Some("Karim".into()),
            phone: Some("0612345678".into()),
            email: None,
        };
        assert!(should_create_lead(&state_with(located_criteria(), both, 55)));
    }

    #[test]
    fn test_end_gate_accepts_phone_only() {
        let phone_only = ContactInfo {
            phone: Some("0612345678".into()),
            ..Default::default()
        };
        let state = state_with(located_criteria(), phone_only, 55);
        assert!(!should_create_lead(&state));
        assert!(qualifies_for_lead_at_end(&state));

        let cold = state_with(
            Criteria::default(),
            ContactInfo {
                phone: Some("0612345678".into()),
                ..Default::default()
            },
            45,
        );
        assert!(!qualifies_for_lead_at_end(&cold));
    }

    #[test]
    fn test_search_needs_two_of_three() {
        let mut only_budget = Criteria {
            budget_max: Some(1_000_000),
            ..Default::default()
        };
        let state = state_with(only_budget.clone(), ContactInfo::default(), 25);
        assert!(!should_search_properties(&state, "bonjour"));

        only_budget.property_types.insert(PropertyType::Villa);
        let mut state = state_with(only_budget, ContactInfo::default(), 40);
        assert!(should_search_properties(&state, "bonjour"));

        state.record_search(Vec::new());
        assert!(!should_search_properties(&state, "d'accord"));
        assert!(should_search_properties(&state, "montrez-moi les annonces"));
        assert!(should_search_properties(&state, "d'autres Biens ?"));
    }

    #[test]
    fn test_completion_conditions() {
        let state = state_with(located_criteria(), ContactInfo::default(), 70);
        assert!(is_conversation_complete(&state, "ok"));

        let state = state_with(located_criteria(), ContactInfo::default(), 45);
        assert!(!is_conversation_complete(&state, "ok"));
        assert!(is_conversation_complete(&state, "Merci, au revoir"));
        assert!(!is_conversation_complete(&state, "je réfléchis"));
    }

    #[test]
    fn test_summary() {
        let mut criteria = located_criteria();
        criteria.property_types.insert(PropertyType::Apartment);
        let state = state_with(
            criteria,
            ContactInfo {
                name: Some("Karim".into()),
                ..Default::default()
            },
            65,
        );

        assert_eq!(
            generate_summary(&state),
            "Prospect Karim recherche appartement à Rabat budget max 2 000 000 MAD (Score: 65/100)"
        );

        let empty = ConversationState::new(None);
        assert_eq!(
            generate_summary(&empty),
            "Prospect recherche un bien (Score: 0/100)"
        );
    }

    #[test]
    fn test_build_lead_snapshot() {
        let mut criteria = located_criteria();
        criteria.amenities.insert(Amenity::Pool);
        let state = state_with(
            criteria,
            ContactInfo {
                phone: Some("0612345678".into()),
                ..Default::default()
            },
            72,
        );

        let lead = build_lead(&state);
        assert_eq!(lead.name, "Prospect");
        assert_eq!(lead.phone_e164.as_deref(), Some("+212612345678"));
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.source, LeadSource::AgentIa);
        assert_eq!(lead.priority, LeadPriority::High);
        assert_eq!(lead.preferred_cities, vec!["Rabat".to_string()]);
        assert!(lead.must_have_pool);
        assert!(!lead.must_have_garden);
        assert_eq!(lead.qualification_score, 72);
        assert_eq!(lead.conversation_id, state.id());
        assert_eq!(state.lead_quality(), LeadQuality::Hot);
    }
}
