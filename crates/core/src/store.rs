use crate::error::StoreError;
use crate::models::{Candidate, Record};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

pub const WORDS_FIELD: &str = "simple_words";
pub const SIGNATURE_FIELD: &str = "signature";
pub const PATH_FIELD: &str = "path";
pub const LEGACY_PATH_FIELD: &str = "url";
pub const METADATA_FIELD: &str = "metadata";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// A raw hit as returned by a document store, `source` holding the stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: String,
    pub score: f64,
    pub source: Value,
}

impl StoreHit {
    pub fn stored_path(&self) -> Option<&str> {
        self.source
            .get(LEGACY_PATH_FIELD)
            .or_else(|| self.source.get(PATH_FIELD))
            .and_then(Value::as_str)
    }

    pub fn into_candidate(self) -> Result<Candidate, StoreError> {
        let signature = decode_signature(&self.id, &self.source)?;
        let path = self.stored_path().unwrap_or_default().to_string();
        let metadata = self
            .source
            .get(METADATA_FIELD)
            .filter(|value| !value.is_null())
            .cloned();

        Ok(Candidate {
            id: self.id,
            store_score: self.score,
            signature,
            path,
            metadata,
            dist: None,
        })
    }
}

/// Builds the stored document for `record`, words flattened into one whitespace-separated field.
pub fn encode_record(record: &Record, timestamp: DateTime<Utc>) -> Value {
    let mut document = Map::new();
    document.insert(PATH_FIELD.to_string(), json!(record.path));
    document.insert(SIGNATURE_FIELD.to_string(), json!(record.signature));
    document.insert(WORDS_FIELD.to_string(), json!(record.words.join(" ")));
    if let Some(metadata) = &record.metadata {
        document.insert(METADATA_FIELD.to_string(), metadata.clone());
    }
    document.insert(TIMESTAMP_FIELD.to_string(), json!(timestamp.to_rfc3339()));
    Value::Object(document)
}

/// Splits a stored words field back into tokens.
pub fn decode_words(source: &Value) -> Vec<String> {
    source
        .get(WORDS_FIELD)
        .and_then(Value::as_str)
        .map(|words| words.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn decode_signature(id: &str, source: &Value) -> Result<Vec<i32>, StoreError> {
    let values = source
        .get(SIGNATURE_FIELD)
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::MalformedHit(format!("{id}: missing signature")))?;

    values
        .iter()
        .map(|value| {
            value
                .as_i64()
                .and_then(|number| i32::try_from(number).ok())
                .ok_or_else(|| StoreError::MalformedHit(format!("{id}: non-integer signature value")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new(
            "images/cat.png",
            vec![1, -1, 0],
            vec!["11".to_string(), "22".to_string(), "33".to_string()],
            Some(json!({"tenant": "a"})),
        )
    }

    #[test]
    fn encoded_record_flattens_words() {
        let document = encode_record(&record(), Utc::now());
        assert_eq!(document[WORDS_FIELD], "11 22 33");
        assert_eq!(document[SIGNATURE_FIELD], json!([1, -1, 0]));
        assert_eq!(document[METADATA_FIELD]["tenant"], "a");
        assert_eq!(decode_words(&document), vec!["11", "22", "33"]);
    }

    #[test]
    fn candidate_prefers_legacy_url_field() -> Result<(), StoreError> {
        let hit = StoreHit {
            id: "doc-1".to_string(),
            score: 3.5,
            source: json!({"url": "http://a/b.jpg", "path": "b.jpg", "signature": [0, 2]}),
        };
        let candidate = hit.into_candidate()?;
        assert_eq!(candidate.path, "http://a/b.jpg");
        assert_eq!(candidate.signature, vec![0, 2]);
        assert_eq!(candidate.metadata, None);
        assert_eq!(candidate.dist, None);
        Ok(())
    }

    #[test]
    fn hit_without_signature_is_malformed() {
        let hit = StoreHit {
            id: "doc-2".to_string(),
            score: 1.0,
            source: json!({"path": "x.png"}),
        };
        assert!(matches!(hit.into_candidate(), Err(StoreError::MalformedHit(_))));
    }
}
