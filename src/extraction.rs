//! Rule-based criteria and contact extraction.
//!
//! Every rule is a pure function over the prospect's transcript. Criteria
//! rules see the lowercased text; contact rules see the original text so that
//! capitalization can be used to recognize names. Rules never fail: a rule
//! that finds nothing leaves its field unset.
//!
//! Static patterns are compiled once with `once_cell::sync::Lazy`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::models::{Amenity, ContactInfo, Criteria, Message, PropertyType, Role, TransactionType};
use crate::validation::is_valid_email;

// =============================================================================
// DICTIONARIES
// =============================================================================

/// Canonical city name and its accepted surface forms (already lowercase).
pub const CITY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Casablanca", &["casablanca", "casa"]),
    ("Rabat", &["rabat"]),
    ("Marrakech", &["marrakech", "marrakesh", "marrakch"]),
    ("Fès", &["fès", "fes", "fez"]),
    ("Tanger", &["tanger", "tangier", "tanja"]),
    ("Agadir", &["agadir"]),
    ("Meknès", &["meknès", "meknes"]),
    ("Oujda", &["oujda"]),
    ("Tétouan", &["tétouan", "tetouan"]),
    ("Kénitra", &["kénitra", "kenitra"]),
    ("Salé", &["salé"]),
    ("El Jadida", &["el jadida", "eljadida"]),
    ("Essaouira", &["essaouira"]),
    ("Mohammedia", &["mohammedia"]),
];

pub const NEIGHBORHOOD_KEYWORDS: &[(&str, &[&str])] = &[
    ("Maârif", &["maârif", "maarif"]),
    ("Anfa", &["anfa"]),
    ("Gauthier", &["gauthier"]),
    ("Racine", &["racine"]),
    ("Bourgogne", &["bourgogne"]),
    ("Aïn Diab", &["aïn diab", "ain diab"]),
    ("Californie", &["californie"]),
    ("Agdal", &["agdal"]),
    ("Souissi", &["souissi"]),
    ("Guéliz", &["guéliz", "gueliz"]),
    ("Hivernage", &["hivernage"]),
    ("Palmeraie", &["palmeraie"]),
    ("Malabata", &["malabata"]),
];

static CITY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| keyword_patterns(CITY_KEYWORDS));

static NEIGHBORHOOD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| keyword_patterns(NEIGHBORHOOD_KEYWORDS));

/// Matches any surface form starting at a word boundary. Suffixes are allowed
/// so that "casa" still covers "casablanca" while "fes" does not fire inside
/// "professionnel".
fn keyword_patterns(
    dict: &'static [(&'static str, &'static [&'static str])],
) -> Vec<(&'static str, Regex)> {
    dict.iter()
        .map(|(canonical, forms)| {
            let alternation = forms
                .iter()
                .map(|f| regex::escape(f))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!(r"\b(?:{})", alternation)).unwrap();
            (*canonical, re)
        })
        .collect()
}

static PROPERTY_TYPE_PATTERNS: Lazy<Vec<(PropertyType, Regex)>> = Lazy::new(|| vec![
    (PropertyType::Apartment, Regex::new(r"\b(?:appart\w*|apartment|studio)").unwrap()),
    (PropertyType::Villa, Regex::new(r"\bvillas?\b").unwrap()),
    (PropertyType::House, Regex::new(r"\b(?:maisons?|house)\b").unwrap()),
    (PropertyType::Riad, Regex::new(r"\briads?\b").unwrap()),
    (PropertyType::Land, Regex::new(r"\b(?:terrains?|land|lots? de terrain)\b").unwrap()),
    (PropertyType::Office, Regex::new(r"\b(?:bureaux?|offices?|plateau de bureau)\b").unwrap()),
    (PropertyType::Commercial, Regex::new(r"\b(?:locaux commerciaux|local commercial|commerces?|magasins?|boutiques?|fonds de commerce)\b").unwrap()),
]);

static PURCHASE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:achat|acheter|achète|achete|acquérir|acquisition|vente|à vendre|buy|buying|purchase)\b").unwrap()
});

static RENTAL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:location|louer|loue|loyer|rent|rental|renting)\b").unwrap()
});

static VACATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:vacances|saisonni\w*|courte durée|holiday)").unwrap()
});

static AMENITY_PATTERNS: Lazy<Vec<(Amenity, Regex)>> = Lazy::new(|| vec![
    (Amenity::Parking, Regex::new(r"\b(?:parking|garage)").unwrap()),
    (Amenity::Garden, Regex::new(r"\b(?:jardin|garden)").unwrap()),
    (Amenity::Pool, Regex::new(r"\b(?:piscine|pool)").unwrap()),
    (Amenity::Elevator, Regex::new(r"\b(?:ascenseur|elevator|lift)\b").unwrap()),
    (Amenity::Terrace, Regex::new(r"\b(?:terrasse|terrace)").unwrap()),
    (Amenity::Furnished, Regex::new(r"\b(?:meublé|meuble|furnished)\b").unwrap()),
]);

// =============================================================================
// NUMERIC PATTERNS
// =============================================================================

/// Budget patterns in priority order. The first pattern with a usable match wins.
static BUDGET_PATTERNS: Lazy<Vec<(BudgetPattern, Regex)>> = Lazy::new(|| vec![
    // "2 millions", "1.5 million", "3m". The trailing class keeps "100 m²" / "80 m2" out.
    (BudgetPattern::Millions, Regex::new(r"(\d+(?:[.,]\d+)?)\s*(millions?|m)(?:[^\w²]|$)").unwrap()),
    // "1 500 000", "1.500.000"
    (BudgetPattern::GroupedThousands, Regex::new(r"\b(\d{1,3}(?:[ .\u{a0}]\d{3})+)\b").unwrap()),
    (BudgetPattern::BareInteger, Regex::new(r"\b(\d{6,})\b").unwrap()),
]);

/// Words after a bare "m" that make it a distance ("100 m de la plage").
static DISTANCE_AFTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:de la|de l'|de l’|du|des|à pied|a pied|from)\b").unwrap()
});

static BUDGET_MAX_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:max|maximum|jusqu'à|jusqu’à|jusqu'a|pas plus|plafond|up to|no more than)\b").unwrap()
});

static BUDGET_MIN_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:min|minimum|au moins|à partir|a partir|partir de|at least|starting from)\b").unwrap()
});

static ROOMS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(?:chambres?|pi[eè]ces?|bedrooms?|rooms?)\b").unwrap()
});

static AREA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(?:m²|m2|mètres? carrés?|metres? carres?|square meters?)").unwrap()
});

static TIMEFRAME_PATTERNS: Lazy<Vec<(Regex, Timeframe)>> = Lazy::new(|| vec![
    (Regex::new(r"\b(?:urgent|urgence|rapidement|au plus vite|dès que possible|asap|immédiatement|tout de suite)").unwrap(), Timeframe::Urgent),
    (Regex::new(r"(\d+)\s*(?:mois|months?)\b").unwrap(), Timeframe::Months),
    (Regex::new(r"\b(?:cette année|this year|d'ici la fin de l'année)").unwrap(), Timeframe::ThisYear),
    (Regex::new(r"\b(?:l'année prochaine|l’année prochaine|next year)").unwrap(), Timeframe::NextYear),
]);

// =============================================================================
// CONTACT PATTERNS
// =============================================================================

static MA_PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d+])((?:\+212|0)[\s.-]?[5-7](?:[\s.-]?\d){8})").unwrap()
});

static BARE_PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{10})\b").unwrap());

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)*\.[a-zA-Z]{2,}").unwrap()
});

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:je m'appelle|je m’appelle|mon nom est|je suis|moi c'est|moi c’est|my name is|i am|i'm|i’m)\s+(\p{Lu}\p{Ll}+(?:[ -]\p{Lu}\p{Ll}+)?)").unwrap()
});

/// Capitalized words that follow "je suis" / "I am" without being names.
const NOT_A_NAME: &[&str] = &[
    "Intéressé", "Intéressée", "Interested", "Looking", "Disponible", "Pressé", "Pressée",
    "Marié", "Mariée", "Propriétaire", "Locataire", "Investisseur",
];

// =============================================================================
// RULES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BudgetPattern {
    Millions,
    GroupedThousands,
    BareInteger,
}

#[derive(Debug, Clone, Copy)]
enum Timeframe {
    Urgent,
    Months,
    ThisYear,
    NextYear,
}

/// Which side of the budget range a figure was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetBound {
    Min(i64),
    Max(i64),
}

type CriteriaRule = fn(&str, &mut Criteria);

/// Criteria rules in application order. Each rule writes only its own field(s).
const CRITERIA_RULES: &[(&str, CriteriaRule)] = &[
    ("cities", rule_cities),
    ("neighborhoods", rule_neighborhoods),
    ("property_types", rule_property_types),
    ("transaction_type", rule_transaction_type),
    ("budget", rule_budget),
    ("rooms", rule_rooms),
    ("area", rule_area),
    ("amenities", rule_amenities),
    ("timeframe", rule_timeframe),
];

fn rule_cities(text: &str, c: &mut Criteria) {
    c.cities = detect_keywords(&CITY_PATTERNS, text);
}

fn rule_neighborhoods(text: &str, c: &mut Criteria) {
    c.neighborhoods = detect_keywords(&NEIGHBORHOOD_PATTERNS, text);
}

fn rule_property_types(text: &str, c: &mut Criteria) {
    c.property_types = PROPERTY_TYPE_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(t, _)| *t)
        .collect();
}

fn rule_transaction_type(text: &str, c: &mut Criteria) {
    c.transaction_type = detect_transaction_type(text);
}

fn rule_budget(text: &str, c: &mut Criteria) {
    match extract_budget(text) {
        Some(BudgetBound::Min(amount)) => c.budget_min = Some(amount),
        Some(BudgetBound::Max(amount)) => c.budget_max = Some(amount),
        None => {}
    }
}

fn rule_rooms(text: &str, c: &mut Criteria) {
    c.rooms = first_number(&ROOMS_PATTERN, text);
}

fn rule_area(text: &str, c: &mut Criteria) {
    c.area = first_number(&AREA_PATTERN, text);
}

fn rule_amenities(text: &str, c: &mut Criteria) {
    c.amenities = AMENITY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(amenity, _)| *amenity)
        .collect();
}

fn rule_timeframe(text: &str, c: &mut Criteria) {
    c.timeframe = detect_timeframe(text);
}

/// Joins the user-authored messages, in order, into the transcript the rules
/// run on. Assistant replies are excluded so that listings and prompts echoed
/// back to the prospect never count as their criteria.
pub fn user_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts search criteria from a transcript.
///
/// Deterministic and idempotent: the result depends only on `text`.
pub fn extract(text: &str) -> Criteria {
    let lowered = text.to_lowercase();
    let mut criteria = Criteria::default();
    for (name, rule) in CRITERIA_RULES {
        rule(&lowered, &mut criteria);
        tracing::trace!("extraction rule '{}' applied", name);
    }
    criteria
}

/// Extracts contact details (name, phone, email) from a transcript.
pub fn extract_contact(text: &str) -> ContactInfo {
    ContactInfo {
        name: extract_name(text),
        phone: extract_phone(text),
        email: extract_email(text),
    }
}

fn detect_keywords(patterns: &[(&'static str, Regex)], text: &str) -> BTreeSet<String> {
    patterns
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(canonical, _)| canonical.to_string())
        .collect()
}

/// Purchase vocabulary is checked first; it wins when both vocabularies appear.
fn detect_transaction_type(text: &str) -> Option<TransactionType> {
    if PURCHASE_PATTERN.is_match(text) {
        Some(TransactionType::Sale)
    } else if RENTAL_PATTERN.is_match(text) {
        if VACATION_PATTERN.is_match(text) {
            Some(TransactionType::VacationRental)
        } else {
            Some(TransactionType::Rent)
        }
    } else {
        None
    }
}

/// Finds the budget figure and the side of the range it belongs to.
///
/// Patterns are tried in priority order (millions, grouped thousands, bare
/// integers of 6+ digits); the first match of the first pattern that has one
/// is used. Numbers shaped like phone numbers are skipped. The 50 characters
/// around the figure decide the bound: max-words first, then min-words, and
/// `Max` when neither is present.
pub fn extract_budget(text: &str) -> Option<BudgetBound> {
    let lowered = text.to_lowercase();

    for (kind, re) in BUDGET_PATTERNS.iter() {
        for caps in re.captures_iter(&lowered) {
            let Some(number) = caps.get(1) else { continue };
            if *kind != BudgetPattern::Millions
                && looks_like_phone(&lowered, number.start(), number.as_str())
            {
                continue;
            }
            if let Some(unit) = caps.get(2) {
                if unit.as_str() == "m" && DISTANCE_AFTER.is_match(&lowered[unit.end()..]) {
                    continue;
                }
            }
            let Some(amount) = parse_amount(number.as_str(), *kind) else {
                continue;
            };

            let before: String = {
                let mut chars: Vec<char> = lowered[..number.start()].chars().rev().take(50).collect();
                chars.reverse();
                chars.into_iter().collect()
            };
            let after: String = lowered[number.end()..].chars().take(50).collect();
            let window = format!("{}{}{}", before, number.as_str(), after);

            let bound = if BUDGET_MAX_WORDS.is_match(&window) {
                BudgetBound::Max(amount)
            } else if BUDGET_MIN_WORDS.is_match(&window) {
                BudgetBound::Min(amount)
            } else {
                BudgetBound::Max(amount)
            };
            tracing::debug!("💰 Budget detected: {:?} (pattern {:?})", bound, kind);
            return Some(bound);
        }
    }

    None
}

fn parse_amount(raw: &str, kind: BudgetPattern) -> Option<i64> {
    match kind {
        BudgetPattern::Millions => {
            let value: f64 = raw.replace(',', ".").parse().ok()?;
            let amount = (value * 1_000_000.0).round();
            (amount.is_finite() && amount > 0.0 && amount < i64::MAX as f64).then_some(amount as i64)
        }
        BudgetPattern::GroupedThousands | BudgetPattern::BareInteger => {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<i64>().ok().filter(|v| *v > 0)
        }
    }
}

/// Leading zero, international prefix, or a `+` right before the digits.
fn looks_like_phone(text: &str, start: usize, raw: &str) -> bool {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let preceded_by_plus = text[..start].ends_with('+');
    preceded_by_plus || digits.starts_with('0') || (digits.starts_with("212") && digits.len() == 12)
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures_iter(text)
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()))
}

fn detect_timeframe(text: &str) -> Option<String> {
    TIMEFRAME_PATTERNS.iter().find_map(|(re, kind)| {
        let caps = re.captures(text)?;
        Some(match kind {
            Timeframe::Urgent => "urgent".to_string(),
            Timeframe::Months => format!("{} mois", caps.get(1)?.as_str()),
            Timeframe::ThisYear => "cette année".to_string(),
            Timeframe::NextYear => "l'année prochaine".to_string(),
        })
    })
}

/// Moroccan mobile/landline number, falling back to any 10-digit run.
/// Separators are stripped from the returned value.
fn extract_phone(text: &str) -> Option<String> {
    for caps in MA_PHONE_PATTERN.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let followed_by_digit = text[m.end()..].starts_with(|c: char| c.is_ascii_digit());
        if followed_by_digit {
            continue;
        }
        let normalized: String = m
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        return Some(normalized);
    }

    BARE_PHONE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_email(text: &str) -> Option<String> {
    EMAIL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|candidate| is_valid_email(candidate))
        .map(|e| e.to_lowercase())
}

/// Only explicit self-introductions count. The extractor never guesses a name.
fn extract_name(text: &str) -> Option<String> {
    NAME_PATTERN.captures_iter(text).find_map(|caps| {
        let name = caps.get(1)?.as_str().trim();
        let first_word = name.split([' ', '-']).next().unwrap_or(name);
        if NOT_A_NAME.contains(&first_word) {
            None
        } else {
            Some(name.to_string())
        }
    })
}
