use crate::error::MatchError;
use crate::models::Candidate;
use crate::store::WORDS_FIELD;
use crate::traits::DocumentStore;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// A word overlap query, store agnostic until rendered with [`StoreQuery::to_body`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub words: Vec<String>,
    pub min_overlap: usize,
    pub pre_filter: Option<Value>,
    pub excluded_fields: Vec<String>,
}

impl StoreQuery {
    /// Elasticsearch / OpenSearch request body.
    pub fn to_body(&self) -> Value {
        let mut bool_clause = json!({
            "must": {
                "match": {
                    WORDS_FIELD: {
                        "query": self.words.join(" "),
                        "minimum_should_match": self.min_overlap.to_string(),
                    }
                }
            }
        });

        if let Some(filter) = &self.pre_filter {
            bool_clause["filter"] = filter.clone();
        }

        json!({
            "query": { "bool": bool_clause },
            "_source": { "excludes": self.excluded_fields },
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    min_overlap: usize,
}

impl QueryBuilder {
    pub fn new(min_overlap: usize) -> Self {
        Self { min_overlap }
    }

    pub fn build(&self, words: &[String], pre_filter: Option<&Value>) -> StoreQuery {
        StoreQuery {
            words: words.to_vec(),
            min_overlap: self.min_overlap,
            pre_filter: pre_filter.cloned(),
            excluded_fields: vec![WORDS_FIELD.to_string()],
        }
    }
}

/// Runs `query` and decodes every hit. Any store or decode failure aborts the pass.
pub async fn retrieve<S>(
    store: &S,
    query: &StoreQuery,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<Candidate>, MatchError>
where
    S: DocumentStore + ?Sized,
{
    let hits = store
        .search(query, limit, timeout)
        .await
        .map_err(MatchError::Retrieval)?;

    debug!(hits = hits.len(), min_overlap = query.min_overlap, "candidates retrieved");

    hits.into_iter()
        .map(|hit| hit.into_candidate().map_err(MatchError::Retrieval))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn body_requires_minimum_overlap_on_words_field() {
        let query = QueryBuilder::new(4).build(&words("11111 99999 33333"), None);
        let body = query.to_body();

        let matcher = &body["query"]["bool"]["must"]["match"][WORDS_FIELD];
        assert_eq!(matcher["query"], "11111 99999 33333");
        assert_eq!(matcher["minimum_should_match"], "4");
        assert!(body["query"]["bool"].get("filter").is_none());
        assert_eq!(body["_source"]["excludes"], json!([WORDS_FIELD]));
    }

    #[test]
    fn pre_filter_is_conjoined_as_filter_clause() {
        let filter = json!({"term": {"metadata.tenant": "acme"}});
        let query = QueryBuilder::new(2).build(&words("1 2 3"), Some(&filter));
        let body = query.to_body();

        assert_eq!(body["query"]["bool"]["filter"], filter);
        assert_eq!(
            body["query"]["bool"]["must"]["match"][WORDS_FIELD]["minimum_should_match"],
            "2"
        );
    }
}
