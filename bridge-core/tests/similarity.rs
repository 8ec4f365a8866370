use bridge_core::{AnchorStore, SimilarityIndex};
use bridge_structs::{
    anchors::{AnchorCategory, AnchorDataset, TOTAL_ANCHORS},
    config::DimensionPolicy,
    BridgeError,
};
use std::sync::OnceLock;

fn store() -> &'static AnchorStore {
    static STORE: OnceLock<AnchorStore> = OnceLock::new();
    STORE.get_or_init(|| AnchorStore::build(&AnchorDataset::builtin(), 64, "similarity").unwrap())
}

#[test]
fn test_anchor_42_is_its_own_nearest() {
    let index = SimilarityIndex::new(store(), DimensionPolicy::Lenient);
    let query = store().get(42).unwrap().reference_vector().to_vec();
    let outcome = index.find_nearest(&query, 5).unwrap();
    let top = &outcome.neighbours[0];
    assert_eq!(top.anchor_id, 42);
    assert_eq!(top.category, AnchorCategory::FactualKnowledge);
    assert!((top.similarity - 1.0).abs() < 1e-9);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_results_sorted_descending() {
    let index = SimilarityIndex::new(store(), DimensionPolicy::Lenient);
    let query: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
    let outcome = index.find_nearest(&query, 50).unwrap();
    assert_eq!(outcome.neighbours.len(), 50);
    for pair in outcome.neighbours.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[test]
fn test_ties_broken_by_lowest_id() {
    let index = SimilarityIndex::new(store(), DimensionPolicy::Lenient);
    let outcome = index.find_nearest(&vec![0.0; 64], 3).unwrap();
    let ids: Vec<u32> = outcome.neighbours.iter().map(|n| n.anchor_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(outcome.neighbours.iter().all(|n| n.similarity == 0.0));
}

#[test]
fn test_k_bounds() {
    let index = SimilarityIndex::new(store(), DimensionPolicy::Lenient);
    let query = vec![1.0; 64];
    assert!(matches!(
        index.find_nearest(&query, 0),
        Err(BridgeError::InvalidK(0))
    ));
    let all = index.find_nearest(&query, 5000).unwrap();
    assert_eq!(all.neighbours.len(), TOTAL_ANCHORS);
    for n in all.neighbours.iter() {
        assert!(store().get(n.anchor_id).is_ok());
    }
}

#[test]
fn test_dimension_mismatch_lenient_truncates() {
    let index = SimilarityIndex::new(store(), DimensionPolicy::Lenient);
    let anchor = store().get(100).unwrap().reference_vector();
    // same first 8 coordinates as anchor 100
    let query = anchor[..8].to_vec();
    let outcome = index.find_nearest(&query, 1).unwrap();
    assert_eq!(outcome.neighbours[0].anchor_id, 100);
    assert!((outcome.neighbours[0].similarity - 1.0).abs() < 1e-9);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with("DimensionMismatch"));
}

#[test]
fn test_dimension_mismatch_strict_fails() {
    let index = SimilarityIndex::new(store(), DimensionPolicy::Strict);
    assert_eq!(
        index.find_nearest(&[1.0, 2.0, 3.0], 1).err(),
        Some(BridgeError::DimensionMismatch {
            context: "similarity search".to_string(),
            expected: 64,
            actual: 3,
        })
    );
}
