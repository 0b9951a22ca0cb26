use crate::error::{MatchError, StoreError};
use crate::models::Candidate;

/// `‖a − b‖ / (‖a‖ + ‖b‖)`, bounded in `[0, 1]` by the triangle inequality.
///
/// Two all-zero signatures are identical and score 0.
pub fn normalized_distance(left: &[i32], right: &[i32]) -> f64 {
    let difference = left
        .iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = f64::from(*a) - f64::from(*b);
            delta * delta
        })
        .sum::<f64>()
        .sqrt();

    let norms = norm(left) + norm(right);
    if norms == 0.0 {
        return 0.0;
    }

    (difference / norms).clamp(0.0, 1.0)
}

fn norm(values: &[i32]) -> f64 {
    values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
        .sqrt()
}

/// Attaches a distance to each candidate and drops those at or beyond `cutoff`.
///
/// Input order is kept. Candidates whose signature length differs from the query are treated
/// as a malformed store response.
pub fn rerank(
    query_signature: &[i32],
    candidates: Vec<Candidate>,
    cutoff: f64,
) -> Result<Vec<Candidate>, MatchError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut kept = Vec::with_capacity(candidates.len());
    for mut candidate in candidates {
        if candidate.signature.len() != query_signature.len() {
            return Err(MatchError::Retrieval(StoreError::MalformedHit(format!(
                "{}: signature length {} != {}",
                candidate.id,
                candidate.signature.len(),
                query_signature.len()
            ))));
        }

        let dist = normalized_distance(query_signature, &candidate.signature);
        if dist < cutoff {
            candidate.dist = Some(dist);
            kept.push(candidate);
        }
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, signature: Vec<i32>) -> Candidate {
        Candidate {
            id: id.to_string(),
            store_score: 1.0,
            signature,
            path: format!("{id}.png"),
            metadata: None,
            dist: None,
        }
    }

    #[test]
    fn distance_is_zero_only_for_identical_signatures() {
        assert_eq!(normalized_distance(&[1, -2, 0], &[1, -2, 0]), 0.0);
        assert_eq!(normalized_distance(&[0, 0], &[0, 0]), 0.0);
        assert!(normalized_distance(&[1, -2, 0], &[1, -2, 1]) > 0.0);
    }

    #[test]
    fn distance_is_symmetric_and_bounded() {
        let a = [2, -2, 1, 0, -1];
        let b = [-2, 2, -1, 0, 1];
        let forward = normalized_distance(&a, &b);
        assert_eq!(forward, normalized_distance(&b, &a));
        assert!((forward - 1.0).abs() < 1e-12);
        assert_eq!(normalized_distance(&[0, 0, 0], &[1, 2, 0]), 1.0);
    }

    #[test]
    fn distance_grows_with_difference() {
        let base = [1, 1, 1, 1];
        let near = normalized_distance(&base, &[1, 1, 1, 2]);
        let far = normalized_distance(&base, &[1, 1, 2, 2]);
        assert!(near < far);
    }

    #[test]
    fn rerank_filters_at_cutoff_and_keeps_order() -> Result<(), MatchError> {
        let query = vec![1, 1, 1, 1];
        let candidates = vec![
            candidate("far", vec![-1, -1, -1, -1]),
            candidate("same", vec![1, 1, 1, 1]),
            candidate("near", vec![1, 1, 1, 2]),
        ];

        let kept = rerank(&query, candidates.clone(), 0.5)?;
        let ids: Vec<_> = kept.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["same", "near"]);
        assert!(kept.iter().all(|item| item.dist.is_some_and(|dist| dist < 0.5)));

        assert!(rerank(&query, candidates.clone(), 0.0)?.is_empty());
        let all = rerank(&query, candidates, 1.0)?;
        assert_eq!(all.len(), 2);
        Ok(())
    }

    #[test]
    fn rerank_of_nothing_is_empty() -> Result<(), MatchError> {
        assert!(rerank(&[1, 2, 3], Vec::new(), 1.0)?.is_empty());
        assert!(rerank(&[], Vec::new(), 1.0)?.is_empty());
        Ok(())
    }

    #[test]
    fn mismatched_signature_length_is_a_retrieval_error() {
        let result = rerank(&[1, 2, 3], vec![candidate("short", vec![1, 2])], 1.0);
        assert!(matches!(result, Err(MatchError::Retrieval(_))));
    }
}
