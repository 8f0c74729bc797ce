//! Quota-based reranking of retrieved candidates.
//!
//! Retrieval alone tends to over-concentrate on one assessment family, so the
//! reranker reshapes the candidate list by intent: a technical query still
//! surfaces a few behavioral assessments and vice versa, while a mixed query
//! gets an even split. Within every quota bucket the original score order is
//! preserved, so reranking never inverts relevance inside a category.

use crate::model::types::{CategoryCode, Intent, RankedCandidate};

/// Quota split for single-intent queries: 7 from the dominant category,
/// 3 from the complementary one.
const DOMINANT_QUOTA: usize = 7;
const COMPLEMENT_QUOTA: usize = 3;

/// Quota split for mixed-intent queries: an even 5/5.
const MIXED_QUOTA: usize = 5;

/// Rerank score-ordered candidates into at most `final_k` results.
///
/// General intent passes the candidates through unchanged. The other intents
/// fill category quotas first (dominant category before complementary), then
/// top up from the remaining candidates in original order when the quotas
/// cannot be met.
pub fn rerank(
    candidates: Vec<RankedCandidate>,
    intent: Intent,
    final_k: usize,
) -> Vec<RankedCandidate> {
    if final_k == 0 || candidates.is_empty() {
        return Vec::new();
    }
    if intent == Intent::General {
        let mut results = candidates;
        results.truncate(final_k);
        return results;
    }

    let mut technical = Vec::new();
    let mut behavioral = Vec::new();
    for (index, candidate) in candidates.iter().enumerate() {
        match candidate.item.category_code {
            CategoryCode::Knowledge => technical.push(index),
            CategoryCode::PersonalityBehaviour => behavioral.push(index),
            _ => {}
        }
    }

    let (first_bucket, first_quota, second_bucket, second_quota) = match intent {
        Intent::Technical => (&technical, DOMINANT_QUOTA, &behavioral, COMPLEMENT_QUOTA),
        Intent::Behavioral => (&behavioral, DOMINANT_QUOTA, &technical, COMPLEMENT_QUOTA),
        Intent::Mixed => (&technical, MIXED_QUOTA, &behavioral, MIXED_QUOTA),
        Intent::General => unreachable!("handled above"),
    };

    let mut selected = vec![false; candidates.len()];
    let mut picked: Vec<usize> = Vec::with_capacity(final_k);
    for &index in first_bucket.iter().take(first_quota) {
        selected[index] = true;
        picked.push(index);
    }
    for &index in second_bucket.iter().take(second_quota) {
        selected[index] = true;
        picked.push(index);
    }

    // Top-up: quotas may undershoot when a category is sparse. Fill from the
    // remaining candidates in original score order, any category.
    if picked.len() < final_k {
        for index in 0..candidates.len() {
            if picked.len() >= final_k {
                break;
            }
            if !selected[index] {
                selected[index] = true;
                picked.push(index);
            }
        }
    }
    picked.truncate(final_k);

    let mut by_index: Vec<Option<RankedCandidate>> = candidates.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|index| by_index[index].take())
        .collect()
}
