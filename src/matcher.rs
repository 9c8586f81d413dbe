use std::sync::Arc;

use crate::db_storage::Datastore;
use crate::models::{Criteria, Property};

pub const DEFAULT_MATCH_LIMIT: usize = 5;
pub const MAX_MATCH_LIMIT: usize = 10;
/// Listings shown to the prospect in a single reply.
pub const RENDERED_PROPERTIES: usize = 3;

/// Conjunction of filters sent to the property store.
///
/// Empty lists and `None` mean "no constraint". Only available listings are
/// ever returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyQuery {
    pub cities: Vec<String>,
    pub districts: Vec<String>,
    pub property_types: Vec<String>,
    pub transaction_type: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub min_bedrooms: Option<i32>,
    pub limit: usize,
}

impl PropertyQuery {
    pub fn from_criteria(criteria: &Criteria, limit: usize) -> Self {
        Self {
            cities: criteria.cities.iter().cloned().collect(),
            districts: criteria.neighborhoods.iter().cloned().collect(),
            property_types: criteria
                .property_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            transaction_type: criteria.transaction_type.map(|t| t.as_str().to_string()),
            price_min: criteria.budget_min.map(|v| v as f64),
            price_max: criteria.budget_max.map(|v| v as f64),
            min_bedrooms: criteria.rooms.and_then(|r| i32::try_from(r).ok()),
            limit: limit.clamp(1, MAX_MATCH_LIMIT),
        }
    }

    /// True when no filter at all would be applied.
    pub fn is_unfiltered(&self) -> bool {
        self.cities.is_empty()
            && self.districts.is_empty()
            && self.property_types.is_empty()
            && self.transaction_type.is_none()
            && self.price_min.is_none()
            && self.price_max.is_none()
            && self.min_bedrooms.is_none()
    }

    /// In-process evaluation of the same predicates the SQL store applies.
    pub fn matches(&self, p: &Property) -> bool {
        p.is_available
            && (self.cities.is_empty() || self.cities.contains(&p.city))
            && (self.districts.is_empty()
                || p.district.as_ref().is_some_and(|d| self.districts.contains(d)))
            && (self.property_types.is_empty() || self.property_types.contains(&p.property_type))
            && self
                .transaction_type
                .as_ref()
                .map_or(true, |t| *t == p.transaction_type)
            && self.price_min.map_or(true, |min| p.price >= min)
            && self.price_max.map_or(true, |max| p.price <= max)
            && self
                .min_bedrooms
                .map_or(true, |min| p.bedrooms.is_some_and(|b| b >= min))
    }
}

/// Translates criteria into a bounded property search.
#[derive(Clone)]
pub struct PropertyMatcher {
    store: Arc<dyn Datastore>,
}

impl PropertyMatcher {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Returns at most `limit` (clamped to `1..=10`) available listings.
    ///
    /// Never fails: a store error or a criteria set without any filter yields
    /// an empty list.
    pub async fn match_properties(&self, criteria: &Criteria, limit: usize) -> Vec<Property> {
        let query = PropertyQuery::from_criteria(criteria, limit);
        if query.is_unfiltered() {
            tracing::debug!("No usable filters, skipping property search");
            return Vec::new();
        }

        match self.store.search_properties(&query).await {
            Ok(mut properties) => {
                properties.truncate(query.limit);
                tracing::info!("🔍 {} properties matched", properties.len());
                properties
            }
            Err(e) => {
                tracing::error!("❌ Property search failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// French rendering of the first three listings, for the reply context.
pub fn render_properties(properties: &[Property]) -> String {
    if properties.is_empty() {
        return String::new();
    }

    let mut out = format!(
        "{} PROPRIÉTÉS CORRESPONDANTES TROUVÉES :\n",
        properties.len()
    );
    for (i, p) in properties.iter().take(RENDERED_PROPERTIES).enumerate() {
        out.push_str(&format!(
            "\n{}. {} - {}\n   Prix : {} MAD\n   Type : {}\n   Superficie : {} m²\n   Chambres : {}\n",
            i + 1,
            p.title,
            p.city,
            format_mad(p.price.round() as i64),
            p.property_type,
            p.area.unwrap_or(0),
            p.bedrooms.unwrap_or(0),
        ));
    }
    out
}

/// Formats an amount with space-separated thousands ("1 500 000").
pub fn format_mad(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyType, TransactionType};
    use uuid::Uuid;

    fn listing(city: &str, price: f64, bedrooms: i32) -> Property {
        Property {
            id: Uuid::new_v4(),
            title: format!("Appartement {}", city),
            transaction_type: "sale".into(),
            property_type: "apartment".into(),
            city: city.into(),
            district: None,
            price,
            bedrooms: Some(bedrooms),
            area: Some(100),
            is_available: true,
        }
    }

    #[test]
    fn test_query_from_criteria() {
        let mut criteria = Criteria {
            transaction_type: Some(TransactionType::Sale),
            budget_max: Some(1_500_000),
            rooms: Some(2),
            ..Default::default()
        };
        criteria.cities.insert("Casablanca".into());
        criteria.property_types.insert(PropertyType::Apartment);

        let query = PropertyQuery::from_criteria(&criteria, 50);
        assert_eq!(query.cities, vec!["Casablanca".to_string()]);
        assert_eq!(query.property_types, vec!["apartment".to_string()]);
        assert_eq!(query.transaction_type.as_deref(), Some("sale"));
        assert_eq!(query.price_max, Some(1_500_000.0));
        assert_eq!(query.min_bedrooms, Some(2));
        assert_eq!(query.limit, MAX_MATCH_LIMIT);
        assert!(!query.is_unfiltered());
    }

    #[test]
    fn test_predicates() {
        let query = PropertyQuery {
            cities: vec!["Rabat".into()],
            price_max: Some(1_000_000.0),
            min_bedrooms: Some(2),
            limit: 5,
            ..Default::default()
        };

        assert!(query.matches(&listing("Rabat", 900_000.0, 2)));
        assert!(!query.matches(&listing("Rabat", 1_100_000.0, 2)));
        assert!(!query.matches(&listing("Rabat", 900_000.0, 1)));
        assert!(!query.matches(&listing("Agadir", 900_000.0, 3)));

        let mut unavailable = listing("Rabat", 900_000.0, 2);
        unavailable.is_available = false;
        assert!(!query.matches(&unavailable));
    }

    #[test]
    fn test_render_shows_at_most_three() {
        let properties: Vec<_> = (0..5).map(|i| listing("Rabat", 1_000_000.0 + i as f64, 2)).collect();
        let rendered = render_properties(&properties);
        assert!(rendered.starts_with("5 PROPRIÉTÉS"));
        assert!(rendered.contains("\n3. "));
        assert!(!rendered.contains("\n4. "));
        assert!(rendered.contains("1 000 000 MAD"));
    }

    #[test]
    fn test_format_mad() {
        assert_eq!(format_mad(0), "0");
        assert_eq!(format_mad(950), "950");
        assert_eq!(format_mad(1_500_000), "1 500 000");
        assert_eq!(format_mad(12_000), "12 000");
    }
}
