use sha2::{Digest, Sha256};

use crate::errors::AppError;
use crate::state::ConversationState;

/// Conversation snapshot with a SHA-256 integrity checksum.
///
/// The checksum is computed over the canonical JSON encoding of the state
/// (struct field order, sorted sets), so it survives a round trip through a
/// store that re-encodes JSON (e.g. Postgres `JSONB`). A snapshot whose
/// checksum does not match is never served.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedSnapshot {
    /// Canonical JSON encoding of the conversation state.
    pub data: String,
    /// SHA-256 checksum of `data` (hex encoded).
    pub checksum: String,
}

impl ValidatedSnapshot {
    /// Encodes a conversation state and computes its checksum.
    pub fn seal(state: &ConversationState) -> Result<Self, AppError> {
        let data = serde_json::to_string(state)?;
        let checksum = Self::compute_checksum(&data);
        Ok(Self { data, checksum })
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Returns true if the checksum matches `data` byte for byte.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Decodes a stored snapshot and validates it against `checksum`.
    ///
    /// `raw` may be any JSON encoding of the state; it is re-encoded
    /// canonically before the checksum comparison.
    pub fn open(raw: &str, checksum: &str) -> Result<ConversationState, AppError> {
        let state: ConversationState = serde_json::from_str(raw).map_err(|e| {
            AppError::InternalError(format!("Corrupted conversation snapshot: {}", e))
        })?;

        let canonical = serde_json::to_string(&state)?;
        if Self::compute_checksum(&canonical) != checksum {
            tracing::error!(
                "⚠️ Snapshot checksum mismatch for conversation {}",
                state.id()
            );
            return Err(AppError::InternalError(format!(
                "Snapshot checksum mismatch for conversation {}",
                state.id()
            )));
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    fn sample_state() -> ConversationState {
        let mut state = ConversationState::new(None);
        state.push_message(Message::user("un appartement à Rabat"));
        state
    }

    #[test]
    fn test_seal_and_open() {
        let state = sample_state();
        let snap = ValidatedSnapshot::seal(&state).unwrap();
        assert!(snap.is_valid());

        let reopened = ValidatedSnapshot::open(&snap.data, &snap.checksum).unwrap();
        assert_eq!(reopened, state);
    }

    #[test]
    fn test_reencoded_json_still_validates() {
        let state = sample_state();
        let snap = ValidatedSnapshot::seal(&state).unwrap();

        // Pretty-printing changes the bytes but not the content.
        let value: serde_json::Value = serde_json::from_str(&snap.data).unwrap();
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        assert_ne!(pretty, snap.data);

        assert!(ValidatedSnapshot::open(&pretty, &snap.checksum).is_ok());
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let state = sample_state();
        let snap = ValidatedSnapshot::seal(&state).unwrap();
        let tampered = snap.data.replace("Rabat", "Agadir");

        let result = ValidatedSnapshot::open(&tampered, &snap.checksum);
        assert!(matches!(result, Err(AppError::InternalError(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = ValidatedSnapshot::open("not json", "abc");
        assert!(result.is_err());
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        let snap = ValidatedSnapshot::seal(&sample_state()).unwrap();
        assert_eq!(snap.checksum.len(), 64);
        assert!(snap.checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
