use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

use crate::{constants::UNCATEGORIZED, error::QuoteError};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,

    pub text: String,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<OffsetDateTime>,
}

impl Quote {
    /// A fresh locally authored quote with a new id.
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Quote {
            id: Some(uuid::Uuid::new_v4().to_string()),
            text: text.into(),
            category: category.into(),
            last_modified: Some(OffsetDateTime::now_utc()),
        }
    }

    /// Validates one untrusted JSON entry (import file, stored snapshot).
    /// Text and category are trimmed the same way `QuoteStore::add` trims them.
    pub fn from_candidate(value: serde_json::Value) -> Result<Self, QuoteError> {
        if !value.is_object() {
            return Err(QuoteError::validation("entry is not an object"));
        }

        let mut quote: Quote =
            serde_json::from_value(value).map_err(|e| QuoteError::validation(e.to_string()))?;

        quote.text = quote.text.trim().to_string();
        quote.category = quote.category.trim().to_string();

        if quote.text.is_empty() {
            return Err(QuoteError::validation("text is empty"));
        }

        if quote.category.is_empty() {
            return Err(QuoteError::validation("category is empty"));
        }

        Ok(quote)
    }

    /// True when `other` carries different content for the same record.
    ///
    /// Timestamps only count when both sides have one.
    pub fn differs_from(&self, other: &Quote) -> bool {
        if self.text != other.text || self.category != other.category {
            return true;
        }

        matches!(
            (self.last_modified, other.last_modified),
            (Some(a), Some(b)) if a != b
        )
    }
}

fn default_category() -> String {
    UNCATEGORIZED.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

/// Ids arrive as strings or numbers depending on who produced them; both are
/// kept as strings so local and remote ids compare equal.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawId>::deserialize(deserializer)?;

    Ok(match raw {
        Some(RawId::Text(id)) if !id.trim().is_empty() => Some(id),
        Some(RawId::Text(_)) | None => None,
        Some(RawId::Int(id)) => Some(id.to_string()),
        Some(RawId::Float(id)) => Some(id.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_and_string_ids_coerce_to_strings() {
        let a: Quote = serde_json::from_value(json!({"id": 7, "text": "a"})).unwrap();
        let b: Quote = serde_json::from_value(json!({"id": "7", "text": "a"})).unwrap();

        assert_eq!(a.id.as_deref(), Some("7"));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn missing_category_defaults() {
        let quote = Quote::from_candidate(json!({"text": "hello"})).unwrap();

        assert_eq!(quote.category, UNCATEGORIZED);
        assert!(quote.id.is_none());
        assert!(quote.last_modified.is_none());
    }

    #[test]
    fn candidate_validation_rejects_bad_entries() {
        assert!(Quote::from_candidate(json!("just a string")).is_err());
        assert!(Quote::from_candidate(json!({"category": "x"})).is_err());
        assert!(Quote::from_candidate(json!({"text": "   "})).is_err());
        assert!(Quote::from_candidate(json!({"text": "a", "category": ""})).is_err());
        assert!(Quote::from_candidate(json!({"text": 12})).is_err());
        assert!(
            Quote::from_candidate(json!({"text": "a", "lastModified": "yesterday"})).is_err()
        );
    }

    #[test]
    fn serializes_camel_case_without_empty_fields() {
        let quote = Quote {
            id: None,
            text: "a".into(),
            category: "b".into(),
            last_modified: Some(time::macros::datetime!(2024-01-02 03:04:05 UTC)),
        };

        let value = serde_json::to_value(&quote).unwrap();

        assert_eq!(
            value,
            json!({"text": "a", "category": "b", "lastModified": "2024-01-02T03:04:05Z"})
        );
    }

    #[test]
    fn differs_only_compares_timestamps_when_both_present() {
        let mut local = Quote::new("a", "x");
        let mut remote = local.clone();
        remote.last_modified = None;

        assert!(!local.differs_from(&remote));

        remote.last_modified = Some(OffsetDateTime::UNIX_EPOCH);
        assert!(local.differs_from(&remote));

        local.last_modified = remote.last_modified;
        remote.category = "y".into();
        assert!(local.differs_from(&remote));
    }
}
