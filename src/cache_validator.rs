use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cached lookup response stored with its SHA-256 checksum.
///
/// Entries that fail validation on read are treated as cache misses and
/// the lookup is repeated against the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCacheEntry {
    /// Response body as JSON text.
    pub data: String,
    /// Hex-encoded SHA-256 of `data`.
    pub checksum: String,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = checksum(&data);
        Self { data, checksum }
    }

    pub fn is_valid(&self) -> bool {
        checksum(&self.data) == self.checksum
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Returns the payload when the entry parses and its checksum matches.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.data)
        } else {
            tracing::warn!(
                "Lookup cache entry failed validation (checksum {}, {} bytes)",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

/// Hex-encoded SHA-256 of `data`.
pub fn checksum(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_roundtrip() {
        let data = r#"{"title":"Owner","company":"Acme"}"#.to_string();
        let serialized = ValidatedCacheEntry::new(data.clone()).serialize();

        assert_eq!(
            ValidatedCacheEntry::deserialize_and_validate(&serialized),
            Some(data)
        );
    }

    #[test]
    fn test_tampered_entry_is_rejected() {
        let serialized = ValidatedCacheEntry::new(r#"{"capacity":"low"}"#.to_string()).serialize();
        let tampered = serialized.replace("low", "high");

        assert_eq!(ValidatedCacheEntry::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(ValidatedCacheEntry::deserialize_and_validate("not json"), None);
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(checksum("null"), checksum("null"));
        assert_ne!(checksum("null"), checksum("{}"));
        assert_eq!(checksum("").len(), 64);
    }
}
