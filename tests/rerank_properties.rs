//! Property tests for intent classification and quota reranking.

use assay::model::types::{CatalogItem, CategoryCode, Intent, RankedCandidate};
use assay::search::intent::classify;
use assay::search::rerank::rerank;
use proptest::prelude::*;

fn arb_category() -> impl Strategy<Value = CategoryCode> {
    prop_oneof![
        Just(CategoryCode::Knowledge),
        Just(CategoryCode::PersonalityBehaviour),
        Just(CategoryCode::Development),
        Just(CategoryCode::Unknown),
    ]
}

fn arb_intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        Just(Intent::Technical),
        Just(Intent::Behavioral),
        Just(Intent::Mixed),
        Just(Intent::General),
    ]
}

fn arb_candidates(max: usize) -> impl Strategy<Value = Vec<RankedCandidate>> {
    prop::collection::vec(arb_category(), 0..max).prop_map(|categories| {
        categories
            .into_iter()
            .enumerate()
            .map(|(i, category_code)| RankedCandidate {
                item: CatalogItem {
                    name: format!("item-{i}"),
                    category_code,
                    ..Default::default()
                },
                // Strictly decreasing scores model retrieval order.
                score: 1.0 - i as f32 * 0.001,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn rerank_never_exceeds_final_k(
        candidates in arb_candidates(40),
        intent in arb_intent(),
        final_k in 0usize..20,
    ) {
        let results = rerank(candidates, intent, final_k);
        prop_assert!(results.len() <= final_k);
    }

    #[test]
    fn rerank_returns_a_subset_without_duplicates(
        candidates in arb_candidates(40),
        intent in arb_intent(),
        final_k in 0usize..20,
    ) {
        let input_names: Vec<String> =
            candidates.iter().map(|c| c.item.name.clone()).collect();
        let results = rerank(candidates, intent, final_k);

        let mut seen = std::collections::HashSet::new();
        for candidate in &results {
            prop_assert!(input_names.contains(&candidate.item.name));
            prop_assert!(seen.insert(candidate.item.name.clone()));
        }
    }

    #[test]
    fn rerank_fills_to_final_k_when_enough_candidates(
        candidates in arb_candidates(40),
        intent in arb_intent(),
        final_k in 0usize..20,
    ) {
        let available = candidates.len();
        let results = rerank(candidates, intent, final_k);
        prop_assert_eq!(results.len(), final_k.min(available));
    }

    #[test]
    fn general_intent_is_a_prefix_of_input(
        candidates in arb_candidates(40),
        final_k in 0usize..20,
    ) {
        let expected: Vec<String> = candidates
            .iter()
            .take(final_k)
            .map(|c| c.item.name.clone())
            .collect();
        let results = rerank(candidates, Intent::General, final_k);
        let actual: Vec<String> =
            results.iter().map(|c| c.item.name.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn rerank_preserves_score_order_within_category(
        candidates in arb_candidates(40),
        intent in arb_intent(),
        final_k in 1usize..20,
    ) {
        let results = rerank(candidates, intent, final_k);
        for category in [CategoryCode::Knowledge, CategoryCode::PersonalityBehaviour] {
            let scores: Vec<f32> = results
                .iter()
                .filter(|c| c.item.category_code == category)
                .map(|c| c.score)
                .collect();
            for pair in scores.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }
    }

    #[test]
    fn classify_is_stable_under_case_changes(query in "[a-zA-Z ]{0,60}") {
        let lower = classify(&query.to_lowercase());
        let upper = classify(&query.to_uppercase());
        prop_assert_eq!(lower, upper);
        prop_assert_eq!(classify(&query), lower);
    }

    #[test]
    fn classify_never_panics(query in "\\PC*") {
        let _ = classify(&query);
    }
}
