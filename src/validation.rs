use once_cell::sync::Lazy;
use phonenumber::{country::Id as CountryId, Mode};
use regex::Regex;

/// RFC 5322 simplified: local@domain.tld
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .unwrap()
});

/// Validate an email address before it is kept as contact information.
///
/// Rejects:
/// - Fake/placeholder patterns (repeated digits like 999999, 111111)
/// - Addresses shorter than 5 characters
/// - Anything that is not `local@domain.tld`
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];

    for pattern in &fake_patterns {
        if email.contains(pattern) {
            tracing::warn!(
                "❌ Invalid email detected (fake pattern '{}'): {}",
                pattern,
                email
            );
            return false;
        }
    }

    if !EMAIL_REGEX.is_match(email) {
        tracing::debug!("❌ Invalid email format: {}", email);
        return false;
    }

    true
}

/// Validate and normalize a Moroccan phone number.
///
/// Parses with the MA region (so both `0612345678` and `+212612345678` are
/// accepted) and returns the E.164 form (`+212612345678`).
///
/// Returns: (is_valid, normalized_phone_or_error_msg)
pub fn validate_ma_phone(raw: &str) -> (bool, String) {
    if raw.trim().is_empty() || raw.len() < 8 {
        return (false, "Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::MA), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("✓ Valid MA phone: {} → {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::warn!("❌ Invalid MA phone number: {}", raw);
                (false, "Invalid Moroccan phone number".to_string())
            }
        }
        Err(e) => {
            tracing::warn!("❌ Failed to parse MA phone '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}
