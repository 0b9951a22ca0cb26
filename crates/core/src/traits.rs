use crate::error::{MatchError, StoreError};
use crate::query::StoreQuery;
use crate::store::StoreHit;
use async_trait::async_trait;
use image::GrayImage;
use serde_json::Value;
use std::time::Duration;

/// The document store capability used by the retrieval pipeline.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Word overlap search, bounded by `limit` hits and `timeout`.
    async fn search(
        &self,
        query: &StoreQuery,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<StoreHit>, StoreError>;

    async fn index(&self, document: &Value, refresh: bool) -> Result<String, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Documents whose stored `path` equals `path`.
    async fn find_by_path(&self, path: &str) -> Result<Vec<StoreHit>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSignature {
    pub signature: Vec<i32>,
    pub words: Vec<String>,
}

pub trait SignatureGenerator: Send + Sync {
    fn signature_len(&self) -> usize;

    fn signature_of(&self, image: &GrayImage) -> Result<ImageSignature, MatchError>;
}

#[async_trait]
impl<S> DocumentStore for std::sync::Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn search(
        &self,
        query: &StoreQuery,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<StoreHit>, StoreError> {
        (**self).search(query, limit, timeout).await
    }

    async fn index(&self, document: &Value, refresh: bool) -> Result<String, StoreError> {
        (**self).index(document, refresh).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn find_by_path(&self, path: &str) -> Result<Vec<StoreHit>, StoreError> {
        (**self).find_by_path(path).await
    }
}
