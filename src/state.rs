use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ContactInfo, ConversationStatus, ConversationView, Criteria, LeadQuality, Message, Property,
};

/// Upper bound of the engagement signal.
pub const MAX_ENGAGEMENT: u8 = 10;

/// Working memory of one qualification session.
///
/// Built only through [`ConversationState::new`]; every other change goes
/// through the transitions in `workflow` and the lifecycle in `agent`.
/// Fields are readable through accessors from outside the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub(crate) id: Uuid,
    pub(crate) messages: Vec<Message>,
    pub(crate) criteria: Criteria,
    pub(crate) contact_info: ContactInfo,
    pub(crate) engagement_level: u8,
    pub(crate) qualification_score: u8,
    pub(crate) lead_quality: LeadQuality,
    pub(crate) status: ConversationStatus,
    pub(crate) lead_id: Option<Uuid>,
    pub(crate) matched_properties: Vec<Property>,
    pub(crate) properties_shown: bool,
    pub(crate) assigned_agent_id: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) end_reason: Option<String>,
    pub(crate) summary: Option<String>,
}

impl ConversationState {
    /// Initial state: no messages, nothing known, score 0, cold, active.
    pub fn new(assigned_agent_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            criteria: Criteria::default(),
            contact_info: ContactInfo::default(),
            engagement_level: 0,
            qualification_score: 0,
            lead_quality: LeadQuality::Cold,
            status: ConversationStatus::Active,
            lead_id: None,
            matched_properties: Vec::new(),
            properties_shown: false,
            assigned_agent_id,
            created_at: now,
            updated_at: now,
            ended_at: None,
            end_reason: None,
            summary: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn contact_info(&self) -> &ContactInfo {
        &self.contact_info
    }

    pub fn engagement_level(&self) -> u8 {
        self.engagement_level
    }

    pub fn qualification_score(&self) -> u8 {
        self.qualification_score
    }

    pub fn lead_quality(&self) -> LeadQuality {
        self.lead_quality
    }

    pub fn status(&self) -> ConversationStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    pub fn lead_id(&self) -> Option<Uuid> {
        self.lead_id
    }

    pub fn matched_properties(&self) -> &[Property] {
        &self.matched_properties
    }

    pub fn properties_shown(&self) -> bool {
        self.properties_shown
    }

    pub fn assigned_agent_id(&self) -> Option<&str> {
        self.assigned_agent_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn end_reason(&self) -> Option<&str> {
        self.end_reason.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Latest message written by the prospect.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::models::Role::User)
    }

    pub fn view(&self) -> ConversationView {
        ConversationView {
            conversation_id: self.id,
            messages: self.messages.clone(),
            qualification_score: self.qualification_score,
            lead_quality: self.lead_quality,
            criteria: self.criteria.clone(),
            contact_info: self.contact_info.clone(),
            status: self.status,
            lead_id: self.lead_id,
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn bump_engagement(&mut self) {
        self.engagement_level = (self.engagement_level + 1).min(MAX_ENGAGEMENT);
    }

    /// Folds a fresh extraction into the cumulative criteria and contact.
    ///
    /// Sets are unioned, scalars are overwritten only when the new pass found
    /// a value, contact fields are overwritten only by non-empty values.
    pub(crate) fn merge_extraction(&mut self, fresh: Criteria, contact: ContactInfo) {
        let c = &mut self.criteria;
        c.cities.extend(fresh.cities);
        c.neighborhoods.extend(fresh.neighborhoods);
        c.property_types.extend(fresh.property_types);
        c.amenities.extend(fresh.amenities);
        if fresh.transaction_type.is_some() {
            c.transaction_type = fresh.transaction_type;
        }
        if fresh.budget_min.is_some() {
            c.budget_min = fresh.budget_min;
        }
        if fresh.budget_max.is_some() {
            c.budget_max = fresh.budget_max;
        }
        if fresh.rooms.is_some() {
            c.rooms = fresh.rooms;
        }
        if fresh.area.is_some() {
            c.area = fresh.area;
        }
        if fresh.timeframe.is_some() {
            c.timeframe = fresh.timeframe;
        }

        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        if let Some(name) = keep(contact.name) {
            self.contact_info.name = Some(name);
        }
        if let Some(phone) = keep(contact.phone) {
            self.contact_info.phone = Some(phone);
        }
        if let Some(email) = keep(contact.email) {
            self.contact_info.email = Some(email);
        }
    }

    pub(crate) fn set_score(&mut self, score: u8, quality: LeadQuality) {
        self.qualification_score = score;
        self.lead_quality = quality;
    }

    pub(crate) fn record_search(&mut self, properties: Vec<Property>) {
        self.matched_properties = properties;
        self.properties_shown = true;
    }

    /// Records the lead id. Returns false, leaving the state untouched, when a
    /// lead was already attached.
    pub(crate) fn attach_lead(&mut self, lead_id: Uuid) -> bool {
        if self.lead_id.is_some() {
            return false;
        }
        self.lead_id = Some(lead_id);
        true
    }

    pub(crate) fn complete(&mut self, reason: String, summary: String) {
        self.status = ConversationStatus::Completed;
        self.ended_at = Some(Utc::now());
        self.end_reason = Some(reason);
        self.summary = Some(summary);
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amenity, PropertyType};

    #[test]
    fn test_initial_state() {
        let state = ConversationState::new(Some("agent-7".into()));
        assert!(state.messages().is_empty());
        assert!(state.criteria().is_empty());
        assert_eq!(state.qualification_score(), 0);
        assert_eq!(state.lead_quality(), LeadQuality::Cold);
        assert!(state.is_active());
        assert_eq!(state.lead_id(), None);
        assert_eq!(state.assigned_agent_id(), Some("agent-7"));
    }

    #[test]
    fn test_merge_unions_sets_and_keeps_scalars() {
        let mut state = ConversationState::new(None);

        let mut first = Criteria {
            budget_max: Some(2_000_000),
            rooms: Some(3),
            ..Default::default()
        };
        first.cities.insert("Rabat".into());
        first.amenities.insert(Amenity::Pool);
        state.merge_extraction(first, ContactInfo::default());

        let mut second = Criteria {
            budget_min: Some(1_000_000),
            ..Default::default()
        };
        second.cities.insert("Salé".into());
        second.property_types.insert(PropertyType::Villa);
        state.merge_extraction(second, ContactInfo::default());

        let c = state.criteria();
        assert_eq!(c.cities.len(), 2);
        assert!(c.amenities.contains(&Amenity::Pool));
        assert_eq!(c.budget_max, Some(2_000_000));
        assert_eq!(c.budget_min, Some(1_000_000));
        assert_eq!(c.rooms, Some(3));
        assert!(c.property_types.contains(&PropertyType::Villa));
    }

    #[test]
    fn test_contact_never_cleared() {
        let mut state = ConversationState::new(None);
        state.merge_extraction(
            Criteria::default(),
            ContactInfo {
                name: Some("Karim".into()),
                phone: Some("0612345678".into()),
                email: None,
            },
        );
        state.merge_extraction(
            Criteria::default(),
            ContactInfo {
                name: Some("  ".into()),
                phone: None,
                email: Some("karim@example.ma".into()),
            },
        );

        let contact = state.contact_info();
        assert_eq!(contact.name.as_deref(), Some("Karim"));
        assert_eq!(contact.phone.as_deref(), Some("0612345678"));
        assert_eq!(contact.email.as_deref(), Some("karim@example.ma"));
    }

    #[test]
    fn test_lead_attached_once() {
        let mut state = ConversationState::new(None);
        let first = Uuid::new_v4();
        assert!(state.attach_lead(first));
        assert!(!state.attach_lead(Uuid::new_v4()));
        assert_eq!(state.lead_id(), Some(first));
    }

    #[test]
    fn test_engagement_capped() {
        let mut state = ConversationState::new(None);
        for _ in 0..15 {
            state.bump_engagement();
        }
        assert_eq!(state.engagement_level(), MAX_ENGAGEMENT);
    }
}
