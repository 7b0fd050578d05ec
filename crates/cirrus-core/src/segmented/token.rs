use serde::{Deserialize, Serialize};

use crate::location::StorageLocation;

/// Opaque server-issued continuation marker.
///
/// The value is only stored and forwarded. The location hint records which
/// endpoint served the page that issued it; later pages of the same listing
/// must go to the same endpoint, since markers are not portable between
/// replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<StorageLocation>,
}

impl ContinuationToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: StorageLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn location(&self) -> Option<StorageLocation> {
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_token_keeps_location_hint() {
        let token = ContinuationToken::new("2!88!MDAw").with_location(StorageLocation::Secondary);
        let saved = serde_json::to_string(&token).unwrap();
        let restored: ContinuationToken = serde_json::from_str(&saved).unwrap();
        assert_eq!(restored, token);
        assert_eq!(restored.as_str(), "2!88!MDAw");
    }

    #[test]
    fn token_without_hint() {
        let restored: ContinuationToken = serde_json::from_str(r#"{"value":"abc"}"#).unwrap();
        assert_eq!(restored.location(), None);
    }
}
