use crate::error::MatchError;
use crate::models::Record;
use crate::store::{encode_record, PATH_FIELD};
use crate::traits::DocumentStore;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

/// Stamps `record` with the current time and writes it, returning the store id.
pub async fn insert_record<S>(store: &S, record: &Record, refresh: bool) -> Result<String, MatchError>
where
    S: DocumentStore + ?Sized,
{
    let document = encode_record(record, Utc::now());
    let id = store
        .index(&document, refresh)
        .await
        .map_err(MatchError::Insertion)?;

    info!(id = %id, path = %record.path, "image record indexed");
    Ok(id)
}

/// Deletes every document stored under exactly `path` except one.
///
/// Best effort: the lookup and the deletes are separate store calls, so concurrent inserts can
/// leave extra copies behind, and the survivor is whichever the store listed first. On failure
/// the error carries the number of deletions that had already gone through.
pub async fn delete_duplicates<S>(store: &S, path: &str) -> Result<usize, MatchError>
where
    S: DocumentStore + ?Sized,
{
    let hits = store
        .find_by_path(path)
        .await
        .map_err(|source| MatchError::DuplicateCleanup {
            path: path.to_string(),
            deleted: 0,
            source,
        })?;

    let matching: Vec<String> = hits
        .into_iter()
        .filter(|hit| hit.source.get(PATH_FIELD).and_then(Value::as_str) == Some(path))
        .map(|hit| hit.id)
        .collect();

    let mut deleted = 0;
    for id in matching.iter().skip(1) {
        store
            .delete(id)
            .await
            .map_err(|source| MatchError::DuplicateCleanup {
                path: path.to_string(),
                deleted,
                source,
            })?;
        debug!(id = %id, path, "duplicate deleted");
        deleted += 1;
    }

    info!(path, found = matching.len(), deleted, "duplicate cleanup finished");
    Ok(deleted)
}
