use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

// ============ Domain Enums ============

/// Kind of real-estate asset a prospect is looking for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    Villa,
    House,
    /// Traditional Moroccan house built around a courtyard.
    Riad,
    Land,
    Office,
    Commercial,
}

impl PropertyType {
    pub const ALL: [PropertyType; 7] = [
        PropertyType::Apartment,
        PropertyType::Villa,
        PropertyType::House,
        PropertyType::Riad,
        PropertyType::Land,
        PropertyType::Office,
        PropertyType::Commercial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::Villa => "villa",
            PropertyType::House => "house",
            PropertyType::Riad => "riad",
            PropertyType::Land => "land",
            PropertyType::Office => "office",
            PropertyType::Commercial => "commercial",
        }
    }

    /// French label used in summaries and prompts.
    pub fn label_fr(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "appartement",
            PropertyType::Villa => "villa",
            PropertyType::House => "maison",
            PropertyType::Riad => "riad",
            PropertyType::Land => "terrain",
            PropertyType::Office => "bureau",
            PropertyType::Commercial => "local commercial",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown property type: {}", s))
    }
}

/// Sale or rental.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Rent,
    VacationRental,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Rent => "rent",
            TransactionType::VacationRental => "vacation_rental",
        }
    }

    pub fn label_fr(&self) -> &'static str {
        match self {
            TransactionType::Sale => "achat",
            TransactionType::Rent => "location",
            TransactionType::VacationRental => "location saisonnière",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional features a prospect may require.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Parking,
    Garden,
    Pool,
    Elevator,
    Terrace,
    Furnished,
}

/// Coarse three-tier label derived from the qualification score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadQuality {
    Hot,
    Warm,
    Cold,
}

impl LeadQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadQuality::Hot => "hot",
            LeadQuality::Warm => "warm",
            LeadQuality::Cold => "cold",
        }
    }
}

impl fmt::Display for LeadQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Completed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Sales pipeline stage of a lead. New leads always start at `New`;
/// later stages are owned by the sales team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Interested,
    MeetingScheduled,
    ProposalSent,
    Negotiation,
    Converted,
    Lost,
    Unqualified,
    Archived,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Interested => "interested",
            LeadStatus::MeetingScheduled => "meeting_scheduled",
            LeadStatus::ProposalSent => "proposal_sent",
            LeadStatus::Negotiation => "negotiation",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
            LeadStatus::Unqualified => "unqualified",
            LeadStatus::Archived => "archived",
        }
    }
}

/// Acquisition channel of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    AgentIa,
    Chatbot,
    Website,
    WebForm,
    Phone,
    Email,
    Referral,
    SocialMedia,
    WalkIn,
    Other,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::AgentIa => "agent_ia",
            LeadSource::Chatbot => "chatbot",
            LeadSource::Website => "website",
            LeadSource::WebForm => "web_form",
            LeadSource::Phone => "phone",
            LeadSource::Email => "email",
            LeadSource::Referral => "referral",
            LeadSource::SocialMedia => "social_media",
            LeadSource::WalkIn => "walk_in",
            LeadSource::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl LeadPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadPriority::Low => "low",
            LeadPriority::Medium => "medium",
            LeadPriority::High => "high",
            LeadPriority::Urgent => "urgent",
        }
    }
}

impl From<LeadQuality> for LeadPriority {
    fn from(quality: LeadQuality) -> Self {
        match quality {
            LeadQuality::Hot => LeadPriority::High,
            LeadQuality::Warm => LeadPriority::Medium,
            LeadQuality::Cold => LeadPriority::Low,
        }
    }
}

// ============ Conversation Models ============

/// One utterance of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Structured search criteria inferred from the conversation.
///
/// Used both for a single extraction pass and for the cumulative view kept on
/// the conversation. Empty sets and `None` mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Criteria {
    /// Purchase or rental.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// Requested property types.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub property_types: BTreeSet<PropertyType>,
    /// Canonical city names.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub cities: BTreeSet<String>,
    /// Canonical neighborhood names.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub neighborhoods: BTreeSet<String>,
    /// Lower budget bound in MAD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_min: Option<i64>,
    /// Upper budget bound in MAD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<i64>,
    /// Number of bedrooms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<u32>,
    /// Surface in square meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub amenities: BTreeSet<Amenity>,
    /// Project horizon ("urgent", "3 mois", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
}

impl Criteria {
    pub fn has_budget(&self) -> bool {
        self.budget_min.is_some() || self.budget_max.is_some()
    }

    pub fn has_location(&self) -> bool {
        !self.cities.is_empty() || !self.neighborhoods.is_empty()
    }

    pub fn has_property_type(&self) -> bool {
        !self.property_types.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        *self == Criteria::default()
    }
}

/// Contact details volunteered by the prospect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

// ============ Database Models ============

/// Inventory listing. Read-only from the qualification flow.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Property {
    pub id: Uuid,
    pub title: String,
    /// One of `sale`, `rent`, `vacation_rental`.
    pub transaction_type: String,
    /// One of the `PropertyType` identifiers.
    pub property_type: String,
    pub city: String,
    /// Neighborhood.
    pub district: Option<String>,
    /// Asking price (or monthly rent) in MAD.
    pub price: f64,
    pub bedrooms: Option<i32>,
    /// Surface in square meters.
    pub area: Option<i32>,
    pub is_available: bool,
}

/// Lead row to insert, snapshotting the conversation at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub id: Uuid,
    /// Falls back to "Prospect" when the prospect never gave a name.
    pub name: String,
    pub phone: Option<String>,
    /// E.164 form of `phone` when it is a valid Moroccan number.
    pub phone_e164: Option<String>,
    pub email: Option<String>,
    pub status: LeadStatus,
    pub priority: LeadPriority,
    pub source: LeadSource,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub preferred_cities: Vec<String>,
    pub preferred_districts: Vec<String>,
    pub property_types: Vec<String>,
    pub transaction_type: Option<String>,
    pub min_bedrooms: Option<i32>,
    pub min_area: Option<i32>,
    pub must_have_parking: bool,
    pub must_have_garden: bool,
    pub must_have_pool: bool,
    pub must_have_elevator: bool,
    pub qualification_score: i32,
    pub ai_conversation_summary: String,
    pub conversation_id: Uuid,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============ API Models ============

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StartConversationRequest {
    /// Optional opening message from the prospect.
    pub initial_message: Option<String>,
    /// Agent the conversation (and its lead) is assigned to.
    pub assigned_agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContinueConversationRequest {
    pub user_message: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EndConversationRequest {
    /// Defaults to "completed".
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StartConversationResponse {
    pub conversation_id: Uuid,
    pub response: String,
    pub status: ConversationStatus,
    pub qualification_score: u8,
    /// False when the initial snapshot could not be written to the store.
    pub persisted: bool,
}

/// Which criteria groups are known after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CriteriaFlags {
    pub budget: bool,
    pub location: bool,
    pub property_type: bool,
    pub contact: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TurnResult {
    pub conversation_id: Uuid,
    pub response: String,
    pub qualification_score: u8,
    pub lead_quality: LeadQuality,
    pub should_create_lead: bool,
    pub lead_created: bool,
    pub lead_id: Option<Uuid>,
    pub conversation_complete: bool,
    pub properties_shown: bool,
    pub matched_properties_count: usize,
    pub criteria_extracted: CriteriaFlags,
    pub persisted: bool,
}

/// Read view of a conversation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationView {
    pub conversation_id: Uuid,
    pub messages: Vec<Message>,
    pub qualification_score: u8,
    pub lead_quality: LeadQuality,
    pub criteria: Criteria,
    pub contact_info: ContactInfo,
    pub status: ConversationStatus,
    pub lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub status: ConversationStatus,
    pub qualification_score: u8,
    pub lead_quality: LeadQuality,
    pub lead_created: bool,
    pub lead_id: Option<Uuid>,
    pub messages_count: usize,
    pub summary: String,
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatsResponse {
    pub active_conversations_count: u64,
}
