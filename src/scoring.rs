//! Qualification scoring.
//!
//! Two weighting tables are supported and one is chosen at startup:
//!
//! | signal               | `Turn` | `Workflow`            |
//! |----------------------|--------|-----------------------|
//! | budget               | 25     | 25                    |
//! | location             | 20     | 20                    |
//! | property type        | 15     | 15                    |
//! | transaction type     | 10     | -                     |
//! | timeframe            | -      | 10                    |
//! | rooms / area         | 5 + 5  | 5 each, with amenities, capped at 10 |
//! | engagement           | -      | engagement / 2, capped at 5 |
//! | name / phone / email | 5 / 10 / 5 | 15 when name and phone are both known |
//!
//! Both tables top out at 100 and the result is clipped to 100.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{ContactInfo, Criteria, LeadQuality};

pub const HOT_THRESHOLD: u8 = 70;
pub const WARM_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Criteria plus individual contact fields.
    #[default]
    Turn,
    /// Criteria plus timeframe, contact completeness and engagement.
    Workflow,
}

impl FromStr for ScoringPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turn" => Ok(ScoringPolicy::Turn),
            "workflow" => Ok(ScoringPolicy::Workflow),
            other => Err(format!(
                "unknown scoring policy '{}' (expected 'turn' or 'workflow')",
                other
            )),
        }
    }
}

/// Points awarded per signal, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub budget: u8,
    pub location: u8,
    pub property_type: u8,
    pub transaction: u8,
    pub timeframe: u8,
    pub specific_criteria: u8,
    pub engagement: u8,
    pub contact: u8,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        let sum = self.budget as u16
            + self.location as u16
            + self.property_type as u16
            + self.transaction as u16
            + self.timeframe as u16
            + self.specific_criteria as u16
            + self.engagement as u16
            + self.contact as u16;
        sum.min(100) as u8
    }
}

impl ScoringPolicy {
    pub fn breakdown(
        &self,
        criteria: &Criteria,
        contact: &ContactInfo,
        engagement: u8,
    ) -> ScoreBreakdown {
        let points = |present: bool, value: u8| if present { value } else { 0 };

        let mut b = ScoreBreakdown {
            budget: points(criteria.has_budget(), 25),
            location: points(criteria.has_location(), 20),
            property_type: points(criteria.has_property_type(), 15),
            ..Default::default()
        };

        match self {
            ScoringPolicy::Turn => {
                b.transaction = points(criteria.transaction_type.is_some(), 10);
                b.specific_criteria =
                    points(criteria.rooms.is_some(), 5) + points(criteria.area.is_some(), 5);
                b.contact = points(contact.name.is_some(), 5)
                    + points(contact.phone.is_some(), 10)
                    + points(contact.email.is_some(), 5);
            }
            ScoringPolicy::Workflow => {
                b.timeframe = points(criteria.timeframe.is_some(), 10);
                let specific = criteria.rooms.is_some() as usize
                    + criteria.area.is_some() as usize
                    + criteria.amenities.len();
                b.specific_criteria = (specific * 5).min(10) as u8;
                b.engagement = (engagement / 2).min(5);
                b.contact = points(contact.name.is_some() && contact.phone.is_some(), 15);
            }
        }

        b
    }

    /// Computes the qualification score, always in `0..=100`.
    pub fn score(&self, criteria: &Criteria, contact: &ContactInfo, engagement: u8) -> u8 {
        self.breakdown(criteria, contact, engagement).total()
    }
}

/// Maps a score to its quality tier: hot from 70, warm from 50.
pub fn classify(score: u8) -> LeadQuality {
    if score >= HOT_THRESHOLD {
        LeadQuality::Hot
    } else if score >= WARM_THRESHOLD {
        LeadQuality::Warm
    } else {
        LeadQuality::Cold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amenity, PropertyType, TransactionType};

    fn full_criteria() -> Criteria {
        let mut c = Criteria {
            transaction_type: Some(TransactionType::Sale),
            budget_max: Some(2_000_000),
            rooms: Some(3),
            area: Some(120),
            timeframe: Some("urgent".into()),
            ..Default::default()
        };
        c.cities.insert("Rabat".into());
        c.property_types.insert(PropertyType::Villa);
        c.amenities.insert(Amenity::Pool);
        c
    }

    fn full_contact() -> ContactInfo {
        ContactInfo {
            name: Some("Karim".into()),
            phone: Some("0612345678".into()),
            email: Some("karim@example.ma".into()),
        }
    }

    #[test]
    fn test_turn_policy_point_table() {
        let mut criteria = Criteria {
            budget_max: Some(1_500_000),
            ..Default::default()
        };
        criteria.cities.insert("Casablanca".into());
        criteria.property_types.insert(PropertyType::Apartment);

        let policy = ScoringPolicy::Turn;
        assert_eq!(policy.score(&criteria, &ContactInfo::default(), 1), 60);

        let contact = ContactInfo {
            name: Some("Karim".into()),
            phone: Some("0612345678".into()),
            email: None,
        };
        assert_eq!(policy.score(&criteria, &contact, 2), 75);
    }

    #[test]
    fn test_both_policies_max_out_at_100() {
        let criteria = full_criteria();
        let contact = full_contact();
        assert_eq!(ScoringPolicy::Turn.score(&criteria, &contact, 10), 100);
        assert_eq!(ScoringPolicy::Workflow.score(&criteria, &contact, 10), 100);
    }

    #[test]
    fn test_workflow_caps() {
        let mut criteria = Criteria::default();
        criteria.rooms = Some(2);
        criteria.area = Some(90);
        criteria.amenities.insert(Amenity::Garden);
        criteria.amenities.insert(Amenity::Pool);

        let b = ScoringPolicy::Workflow.breakdown(&criteria, &ContactInfo::default(), 10);
        assert_eq!(b.specific_criteria, 10);
        assert_eq!(b.engagement, 5);

        let b = ScoringPolicy::Workflow.breakdown(&criteria, &ContactInfo::default(), 3);
        assert_eq!(b.engagement, 1);
    }

    #[test]
    fn test_workflow_contact_requires_name_and_phone() {
        let phone_only = ContactInfo {
            phone: Some("0612345678".into()),
            ..Default::default()
        };
        let b = ScoringPolicy::Workflow.breakdown(&Criteria::default(), &phone_only, 0);
        assert_eq!(b.contact, 0);
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify(0), LeadQuality::Cold);
        assert_eq!(classify(49), LeadQuality::Cold);
        assert_eq!(classify(50), LeadQuality::Warm);
        assert_eq!(classify(69), LeadQuality::Warm);
        assert_eq!(classify(70), LeadQuality::Hot);
        assert_eq!(classify(100), LeadQuality::Hot);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("turn".parse::<ScoringPolicy>().unwrap(), ScoringPolicy::Turn);
        assert_eq!(
            " Workflow ".parse::<ScoringPolicy>().unwrap(),
            ScoringPolicy::Workflow
        );
        assert!("blended".parse::<ScoringPolicy>().is_err());
    }
}
