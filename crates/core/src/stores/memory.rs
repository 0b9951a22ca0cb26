use crate::error::StoreError;
use crate::query::StoreQuery;
use crate::store::{decode_words, StoreHit, PATH_FIELD};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store with the same overlap semantics as the Elasticsearch `match` query.
///
/// Every write is visible immediately. Pre-filters support `term`, `terms` and `bool`
/// (`must`/`filter`) clauses over dotted field paths.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<Vec<(String, Value)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Value> {
        self.documents
            .read()
            .await
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, document)| document.clone())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn search(
        &self,
        query: &StoreQuery,
        limit: usize,
        _timeout: Duration,
    ) -> Result<Vec<StoreHit>, StoreError> {
        let wanted: HashSet<&str> = query.words.iter().map(String::as_str).collect();
        let documents = self.documents.read().await;

        let mut hits = Vec::new();
        for (id, document) in documents.iter() {
            let stored = decode_words(document);
            let overlap = stored
                .iter()
                .map(String::as_str)
                .collect::<HashSet<_>>()
                .intersection(&wanted)
                .count();

            if overlap < query.min_overlap {
                continue;
            }
            if let Some(filter) = &query.pre_filter {
                if !matches_filter(document, filter)? {
                    continue;
                }
            }

            let mut source = document.clone();
            if let Some(fields) = source.as_object_mut() {
                for excluded in &query.excluded_fields {
                    fields.remove(excluded);
                }
            }
            hits.push(StoreHit {
                id: id.clone(),
                score: overlap as f64,
                source,
            });
        }

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn index(&self, document: &Value, _refresh: bool) -> Result<String, StoreError> {
        if !document.is_object() {
            return Err(StoreError::BackendResponse {
                backend: "memory".to_string(),
                details: "document must be a json object".to_string(),
            });
        }
        let id = Uuid::new_v4().to_string();
        self.documents
            .write()
            .await
            .push((id.clone(), document.clone()));
        Ok(id)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let position = documents
            .iter()
            .position(|(stored_id, _)| stored_id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        documents.remove(position);
        Ok(())
    }

    async fn find_by_path(&self, path: &str) -> Result<Vec<StoreHit>, StoreError> {
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|(_, document)| document.get(PATH_FIELD).and_then(Value::as_str) == Some(path))
            .map(|(id, document)| StoreHit {
                id: id.clone(),
                score: 1.0,
                source: document.clone(),
            })
            .collect())
    }
}

fn matches_filter(document: &Value, filter: &Value) -> Result<bool, StoreError> {
    if let Some(clauses) = filter.as_array() {
        for clause in clauses {
            if !matches_filter(document, clause)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Some(term) = filter.get("term").and_then(Value::as_object) {
        for (field, expected) in term {
            let expected = expected.get("value").unwrap_or(expected);
            if !field_has_value(document, field, expected) {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Some(terms) = filter.get("terms").and_then(Value::as_object) {
        for (field, allowed) in terms {
            let allowed = allowed.as_array().ok_or_else(|| {
                StoreError::Unsupported(format!("terms on {field} needs an array"))
            })?;
            if !allowed
                .iter()
                .any(|value| field_has_value(document, field, value))
            {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    if let Some(bool_clause) = filter.get("bool").and_then(Value::as_object) {
        for (occurrence, clauses) in bool_clause {
            match occurrence.as_str() {
                "must" | "filter" => {
                    if !matches_filter(document, clauses)? {
                        return Ok(false);
                    }
                }
                other => {
                    return Err(StoreError::Unsupported(format!("bool.{other}")));
                }
            }
        }
        return Ok(true);
    }

    Err(StoreError::Unsupported(filter.to_string()))
}

fn field_has_value(document: &Value, field: &str, expected: &Value) -> bool {
    let found = field
        .split('.')
        .try_fold(document, |current, segment| current.get(segment));

    match found {
        Some(Value::Array(values)) => values.contains(expected),
        Some(value) => value == expected,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;
    use serde_json::json;

    fn words(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(str::to_string).collect()
    }

    async fn seeded() -> Result<(MemoryStore, String), StoreError> {
        let store = MemoryStore::new();
        let id = store
            .index(
                &json!({
                    "path": "doc.png",
                    "signature": [0, 1],
                    "simple_words": "11111 22222 33333 44444 55555 66666 77777",
                    "metadata": {"tenant": "acme", "tags": ["cat", "pet"]}
                }),
                false,
            )
            .await?;
        Ok((store, id))
    }

    #[tokio::test]
    async fn overlap_threshold_matches_shared_word_count() -> Result<(), StoreError> {
        let (store, id) = seeded().await?;
        let query_words = words("11111 99999 33333 44444 00000 55555 88888");
        let timeout = Duration::from_secs(1);

        for min_overlap in 1..=4 {
            let query = QueryBuilder::new(min_overlap).build(&query_words, None);
            let hits = store.search(&query, 10, timeout).await?;
            assert_eq!(hits.len(), 1, "min_overlap={min_overlap}");
            assert_eq!(hits[0].id, id);
            assert_eq!(hits[0].score, 4.0);
        }

        let query = QueryBuilder::new(5).build(&query_words, None);
        assert!(store.search(&query, 10, timeout).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn word_order_does_not_matter() -> Result<(), StoreError> {
        let (store, _) = seeded().await?;
        let query = QueryBuilder::new(4).build(&words("88888 55555 00000 44444 33333 99999 11111"), None);
        assert_eq!(store.search(&query, 10, Duration::from_secs(1)).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn excluded_fields_are_stripped() -> Result<(), StoreError> {
        let (store, _) = seeded().await?;
        let query = QueryBuilder::new(1).build(&words("11111"), None);
        let hits = store.search(&query, 10, Duration::from_secs(1)).await?;
        assert!(hits[0].source.get("simple_words").is_none());
        assert!(hits[0].source.get("signature").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn pre_filter_restricts_candidates() -> Result<(), StoreError> {
        let (store, _) = seeded().await?;
        let query_words = words("11111 22222");
        let timeout = Duration::from_secs(1);

        let acme = json!({"term": {"metadata.tenant": "acme"}});
        let query = QueryBuilder::new(2).build(&query_words, Some(&acme));
        assert_eq!(store.search(&query, 10, timeout).await?.len(), 1);

        let other = json!([{"terms": {"metadata.tags": ["dog"]}}]);
        let query = QueryBuilder::new(2).build(&query_words, Some(&other));
        assert!(store.search(&query, 10, timeout).await?.is_empty());

        let unsupported = json!({"range": {"timestamp": {"gte": "now-1d"}}});
        let query = QueryBuilder::new(2).build(&query_words, Some(&unsupported));
        assert!(matches!(
            store.search(&query, 10, timeout).await,
            Err(StoreError::Unsupported(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn limit_bounds_hits_and_delete_removes() -> Result<(), StoreError> {
        let (store, first) = seeded().await?;
        store
            .index(&json!({"path": "b.png", "signature": [0, 1], "simple_words": "11111"}), false)
            .await?;

        let query = QueryBuilder::new(1).build(&words("11111"), None);
        assert_eq!(store.search(&query, 1, Duration::from_secs(1)).await?.len(), 1);

        store.delete(&first).await?;
        assert_eq!(store.len().await, 1);
        assert!(matches!(store.delete(&first).await, Err(StoreError::NotFound(_))));
        Ok(())
    }
}
