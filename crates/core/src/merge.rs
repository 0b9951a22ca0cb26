use crate::models::{Candidate, SearchResult};
use std::collections::HashSet;

/// Pools reranked candidates from every orientation pass into one result list.
///
/// Batches are flattened in the order given and the first occurrence of an id wins, even when
/// a later pass reported the same id at a lower distance. The final list is stably sorted by
/// ascending distance, so ties keep their first-encountered order. Candidates that were never
/// reranked carry no distance and are dropped without claiming their id.
pub fn merge(batches: Vec<Vec<Candidate>>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for candidate in batches.into_iter().flatten() {
        let Some(dist) = candidate.dist else {
            continue;
        };
        if !seen.insert(candidate.id.clone()) {
            continue;
        }
        unique.push(SearchResult {
            id: candidate.id,
            path: candidate.path,
            dist,
            metadata: candidate.metadata,
            store_score: candidate.store_score,
        });
    }

    unique.sort_by(|left, right| left.dist.total_cmp(&right.dist));
    unique
}
