use crate::error::MatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DurationMilliSeconds};
use std::time::Duration;

/// One image as exchanged with the document store, either to be indexed or used as a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub path: String,
    pub signature: Vec<i32>,
    pub words: Vec<String>,
    pub metadata: Option<Value>,
    pub timestamp: Option<DateTime<Utc>>,
    pub id: Option<String>,
}

impl Record {
    pub fn new(
        path: impl Into<String>,
        signature: Vec<i32>,
        words: Vec<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            signature,
            words,
            metadata,
            timestamp: None,
            id: None,
        }
    }

    /// Checks that signature and words both carry exactly `n` entries.
    pub fn validate(&self, n: usize) -> Result<(), MatchError> {
        if self.signature.len() != n {
            return Err(MatchError::InvalidRecord(format!(
                "signature length {} != {}",
                self.signature.len(),
                n
            )));
        }
        if self.words.len() != n {
            return Err(MatchError::InvalidRecord(format!(
                "word count {} != {}",
                self.words.len(),
                n
            )));
        }
        Ok(())
    }
}

/// A document returned by the store, before or after rerank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub store_score: f64,
    pub signature: Vec<i32>,
    pub path: String,
    pub metadata: Option<Value>,
    pub dist: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub path: String,
    pub dist: f64,
    pub metadata: Option<Value>,
    pub store_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchOptions {
    pub all_orientations: bool,
    /// Store-native filter clause conjoined with the word overlap match.
    pub pre_filter: Option<Value>,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub index: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
    pub result_limit: usize,
    pub min_overlap: usize,
    pub distance_cutoff: f64,
    pub n: usize,
    pub k: usize,
    pub grid_size: usize,
    pub refresh_after: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: "images".to_string(),
            timeout: Duration::from_secs(10),
            result_limit: 100,
            min_overlap: 6,
            distance_cutoff: 0.45,
            n: 648,
            k: 3,
            grid_size: 9,
            refresh_after: false,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.index.trim().is_empty() {
            return Err(MatchError::InvalidConfig("index name is empty".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(MatchError::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.result_limit == 0 {
            return Err(MatchError::InvalidConfig(
                "result_limit must be at least 1".to_string(),
            ));
        }
        if self.min_overlap == 0 || self.min_overlap > self.n {
            return Err(MatchError::InvalidConfig(format!(
                "min_overlap {} must be within 1..={}",
                self.min_overlap, self.n
            )));
        }
        if !(0.0..=1.0).contains(&self.distance_cutoff) {
            return Err(MatchError::InvalidConfig(format!(
                "distance_cutoff {} outside [0, 1]",
                self.distance_cutoff
            )));
        }
        if self.k == 0 || self.k > 20 {
            return Err(MatchError::InvalidConfig(format!(
                "k {} must be within 1..=20",
                self.k
            )));
        }
        if self.grid_size == 0 {
            return Err(MatchError::InvalidConfig("grid_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_overlap_above_word_count() {
        let config = SearchConfig {
            min_overlap: 700,
            ..SearchConfig::default()
        };
        assert!(matches!(config.validate(), Err(MatchError::InvalidConfig(_))));
    }

    #[test]
    fn config_timeout_round_trips_as_millis() -> Result<(), Box<dyn std::error::Error>> {
        let config: SearchConfig = serde_json::from_str(r#"{"timeout": 2500, "index": "photos"}"#)?;
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.index, "photos");
        assert_eq!(config.result_limit, 100);
        Ok(())
    }

    #[test]
    fn record_validation_checks_both_lengths() {
        let record = Record::new("a.png", vec![0, 1, 2], vec!["1".into(), "2".into()], None);
        assert!(record.validate(3).is_err());
        let record = Record::new("a.png", vec![0, 1], vec!["1".into(), "2".into()], None);
        assert!(record.validate(2).is_ok());
    }
}
