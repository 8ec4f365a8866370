use bridge_structs::{
    anchors::{AnchorCategory, AnchorDataset, ANCHORS_PER_CATEGORY, TOTAL_ANCHORS},
    config::{DimensionPolicy, EngineConfig, KlStatistics},
    core::{
        AlignmentMethod, AlignmentResult, KVCache, KvMetadata, NearestAnchor, QualityLevel,
        QualityMetrics, WMatrix,
    },
    BridgeError,
};
use bridge_utils::{dejsonify, jsonify};
use serde_json::json;

fn sample_kv_cache() -> KVCache {
    KVCache::new(
        "llama-3-8b".to_string(),
        vec![vec![vec![1.0, 2.0, 3.0]]],
        vec![vec![vec![1.0, 2.0, 3.0]]],
        None,
        KvMetadata::default(),
    )
    .unwrap()
}

#[test]
fn test_kv_cache_deserialize_camel_case() {
    let payload = json!({
        "sourceModel": "llama-3-8b",
        "keys": [[[1.0, 0.0], [0.0, 1.0]]],
        "values": [[[0.5, 0.5], [0.25, 0.75]]],
        "metadata": {
            "sequenceLength": 2,
            "contextDescription": "unit test",
            "tokenCount": 2,
            "generatedAt": "2026-01-01T00:00:00Z"
        }
    });
    let kv: KVCache = dejsonify(&payload.to_string()).unwrap();
    assert_eq!(kv.source_model(), "llama-3-8b");
    assert_eq!(kv.num_layers(), 1);
    assert_eq!(kv.num_heads(), 2);
    assert_eq!(kv.key_dim(), 2);
    assert_eq!(kv.metadata().token_count, 2);
    assert_eq!(kv.head_vectors().count(), 4);
}

#[test]
fn test_kv_cache_rejects_ragged_heads() {
    let payload = json!({
        "sourceModel": "m",
        "keys": [[[1.0, 0.0], [0.0]]],
        "values": [[[0.5, 0.5], [0.25, 0.75]]]
    });
    assert!(dejsonify::<KVCache>(&payload.to_string()).is_err());
}

#[test]
fn test_kv_cache_rejects_mismatched_keys_values() {
    let err = KVCache::new(
        "m".to_string(),
        vec![vec![vec![1.0]], vec![vec![1.0]]],
        vec![vec![vec![1.0]]],
        None,
        KvMetadata::default(),
    )
    .unwrap_err();
    assert!(matches!(err, BridgeError::MalformedKvCache(_)));
}

#[test]
fn test_kv_cache_rejects_empty() {
    let err = KVCache::new("m".to_string(), vec![], vec![], None, KvMetadata::default())
        .unwrap_err();
    assert!(matches!(err, BridgeError::MalformedKvCache(_)));
}

#[test]
fn test_w_matrix_deserialize_and_validate() {
    let payload = json!({
        "version": "1.0.0",
        "sourceModel": "a",
        "targetModel": "b",
        "matrix": [[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]],
        "unifiedDimension": 3,
        "method": "hybrid",
        "epsilon": 0.03,
        "orthogonalityScore": 0.9
    });
    let w: WMatrix = dejsonify(&payload.to_string()).unwrap();
    assert_eq!(w.rows(), 3);
    assert_eq!(w.cols(), 2);
    assert_eq!(w.method(), AlignmentMethod::Hybrid);

    let ragged = json!({
        "version": "1.0.0",
        "sourceModel": "a",
        "targetModel": "b",
        "matrix": [[1.0, 0.0], [0.0]],
        "unifiedDimension": 2,
        "method": "learned",
        "epsilon": 0.03
    });
    assert!(dejsonify::<WMatrix>(&ragged.to_string()).is_err());

    let empty = WMatrix::new(
        "1".to_string(),
        "a".to_string(),
        "b".to_string(),
        vec![],
        0,
        AlignmentMethod::Orthogonal,
        0.0,
        0.0,
    );
    assert!(matches!(empty, Err(BridgeError::EmptyMatrix(_))));

    let negative_epsilon = WMatrix::new(
        "1".to_string(),
        "a".to_string(),
        "b".to_string(),
        vec![vec![1.0]],
        1,
        AlignmentMethod::Orthogonal,
        -0.5,
        0.0,
    );
    assert!(matches!(negative_epsilon, Err(BridgeError::MalformedWMatrix(_))));

    let wrong_unified_dimension = json!({
        "version": "1.0.0",
        "sourceModel": "a",
        "targetModel": "b",
        "matrix": [[1.0, 0.0], [0.0, 1.0]],
        "unifiedDimension": 8192,
        "method": "orthogonal",
        "epsilon": 0.03
    });
    let err = dejsonify::<WMatrix>(&wrong_unified_dimension.to_string()).unwrap_err();
    assert!(err.to_string().contains("unifiedDimension is 8192 but the matrix has 2 rows"));
}

#[test]
fn test_quality_metrics_threshold_boundary() {
    assert!(!QualityMetrics::new(0.9499, 0.95, 0.9, 0.96, 0.03).passes_threshold);
    assert!(QualityMetrics::new(0.95, 0.95, 0.9, 0.96, 0.03).passes_threshold);

    let metrics = QualityMetrics::new(0.8, 0.95, 0.8, 0.93, 0.1);
    assert!((metrics.semantic_loss - 0.2).abs() < 1e-12);
    assert!((metrics.confidence - 0.72).abs() < 1e-12);
}

#[test]
fn test_ensure_passes_message() {
    let result = AlignmentResult {
        aligned_kv_cache: sample_kv_cache(),
        quality: QualityMetrics::new(0.9, 0.95, 0.9, 0.96, 0.03),
        nearest_anchors: vec![NearestAnchor {
            anchor_id: 42,
            category: AnchorCategory::FactualKnowledge,
            similarity: 0.9,
        }],
        validation_warnings: vec![],
    };
    let err = result.ensure_passes(0.95).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("does not meet 95% semantic fidelity threshold"));
    assert!(msg.contains("0.9000"));
    assert!(msg.contains("#42 (factual_knowledge"));
    assert!(result.ensure_passes(0.9).is_ok());
}

#[test]
fn test_alignment_result_serializes_camel_case() {
    let result = AlignmentResult {
        aligned_kv_cache: sample_kv_cache(),
        quality: QualityMetrics::new(1.0, 0.95, 1.0, 0.96, 0.03),
        nearest_anchors: vec![],
        validation_warnings: vec!["w".to_string()],
    };
    let json = jsonify(&result).unwrap();
    assert!(json.contains("\"alignedKvCache\""));
    assert!(json.contains("\"semanticQualityScore\":1.0"));
    assert!(json.contains("\"passesThreshold\":true"));
    assert!(json.contains("\"validationWarnings\":[\"w\"]"));
}

#[test]
fn test_quality_level_bands() {
    assert_eq!(QualityLevel::from_score(0.95, 0.95), QualityLevel::Excellent);
    assert_eq!(QualityLevel::from_score(0.9, 0.95), QualityLevel::Good);
    assert_eq!(QualityLevel::from_score(0.7, 0.95), QualityLevel::Fair);
    assert_eq!(QualityLevel::from_score(0.1, 0.95), QualityLevel::Poor);
}

#[test]
fn test_category_parse() {
    assert_eq!(
        "factual_knowledge".parse::<AnchorCategory>().unwrap(),
        AnchorCategory::FactualKnowledge
    );
    assert_eq!(
        "astrology".parse::<AnchorCategory>(),
        Err(BridgeError::InvalidCategory("astrology".to_string()))
    );
    for (i, c) in AnchorCategory::ALL.iter().enumerate() {
        assert_eq!(c.index(), i);
        assert_eq!(c.as_str().parse::<AnchorCategory>().unwrap(), *c);
    }
}

#[test]
fn test_builtin_dataset_is_valid() {
    let dataset = AnchorDataset::builtin();
    dataset.validate().unwrap();
    let total: usize = dataset.categories.iter().map(|c| c.anchors.len()).sum();
    assert_eq!(total, TOTAL_ANCHORS);
    let anchor_42 = &dataset.categories[0].anchors[42];
    assert_eq!(anchor_42.id, 42);
    assert_eq!(anchor_42.category, AnchorCategory::FactualKnowledge);
    let last = &dataset.categories[15].anchors[ANCHORS_PER_CATEGORY - 1];
    assert_eq!(last.id as usize, TOTAL_ANCHORS - 1);
}

#[test]
fn test_dataset_validation_failures() {
    let mut short = AnchorDataset::builtin();
    short.categories[3].anchors.pop();
    assert!(matches!(short.validate(), Err(BridgeError::InvalidDataset(_))));

    let mut missing = AnchorDataset::builtin();
    missing.categories.pop();
    assert!(matches!(missing.validate(), Err(BridgeError::InvalidDataset(_))));

    let mut duplicate = AnchorDataset::builtin();
    duplicate.categories[1].anchors[0].id = 0;
    assert!(matches!(duplicate.validate(), Err(BridgeError::InvalidDataset(_))));

    let mut misfiled = AnchorDataset::builtin();
    misfiled.categories[2].anchors[5].category = AnchorCategory::Summarization;
    assert!(matches!(misfiled.validate(), Err(BridgeError::InvalidDataset(_))));
}

#[test]
fn test_engine_config_defaults_and_partial_override() {
    let config: EngineConfig =
        dejsonify(r#"{"anchorDimension": 64, "klStatistics": "raw"}"#).unwrap();
    assert_eq!(config.anchor_dimension, 64);
    assert_eq!(config.kl_statistics, KlStatistics::Raw);
    assert_eq!(config.dimension_policy, DimensionPolicy::Lenient);
    assert_eq!(config.quality_threshold, 0.95);
    assert_eq!(config.temperature, 0.07);
    assert_eq!(config.validation_top_k, 10);
    assert_eq!(config.report_top_k, 5);
}

#[test]
fn test_engine_config_serializes_camel_case() {
    let json = jsonify(&EngineConfig::default()).unwrap();
    assert!(json.contains("\"qualityThreshold\":0.95"));
    assert!(json.contains("\"lossWeights\":{\"lambdaAlignment\":1.0,\"lambdaOrtho\":0.01}"));
    assert!(!json.contains("quality_threshold"));
}

#[test]
fn test_engine_config_validate() {
    assert!(EngineConfig::default().validate().is_ok());

    let invalid = [
        EngineConfig {
            anchor_dimension: 0,
            ..EngineConfig::default()
        },
        EngineConfig {
            temperature: 0.0,
            ..EngineConfig::default()
        },
        EngineConfig {
            temperature: f64::NAN,
            ..EngineConfig::default()
        },
        EngineConfig {
            quality_threshold: -0.1,
            ..EngineConfig::default()
        },
        EngineConfig {
            kl_threshold: -1.0,
            ..EngineConfig::default()
        },
        EngineConfig {
            kl_penalty: 2.0,
            ..EngineConfig::default()
        },
        EngineConfig {
            normalization_epsilon: 0.0,
            ..EngineConfig::default()
        },
        EngineConfig {
            validation_top_k: 0,
            ..EngineConfig::default()
        },
        EngineConfig {
            report_top_k: 0,
            ..EngineConfig::default()
        },
    ];
    for config in invalid.iter() {
        assert!(
            matches!(config.validate(), Err(BridgeError::InvalidConfig(_))),
            "{:?} should be rejected",
            config
        );
    }
}
