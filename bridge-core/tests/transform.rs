use bridge_core::TensorTransform;
use bridge_structs::{config::DimensionPolicy, BridgeError};
use proptest::prelude::*;

#[test]
fn test_identity_leaves_tensor_unchanged() {
    let transform = TensorTransform::identity(3, DimensionPolicy::Strict);
    let tensor = vec![vec![vec![1.0, 2.0, 3.0], vec![-4.0, 0.5, 9.0]]];
    let outcome = transform.apply("keys", &tensor).unwrap();
    assert_eq!(outcome.tensor, tensor);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_rectangular_projection() {
    let matrix = vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]];
    let transform = TensorTransform::new(&matrix, DimensionPolicy::Strict).unwrap();
    assert_eq!(transform.rows(), 2);
    assert_eq!(transform.cols(), 3);
    assert_eq!(transform.apply_vector(&[1.0, 2.0, 3.0]), vec![1.0, 3.0]);
}

#[test]
fn test_lenient_zero_pads_short_heads() {
    let matrix = vec![vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 2.0]];
    let transform = TensorTransform::new(&matrix, DimensionPolicy::Lenient).unwrap();
    let outcome = transform.apply("values", &vec![vec![vec![1.0, 2.0]]]).unwrap();
    assert_eq!(outcome.tensor, vec![vec![vec![3.0, 0.0]]]);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("values head vectors have dimension 2"));
}

#[test]
fn test_lenient_ignores_extra_coordinates() {
    let transform = TensorTransform::identity(2, DimensionPolicy::Lenient);
    let outcome = transform.apply("keys", &vec![vec![vec![1.0, 2.0, 3.0]]]).unwrap();
    assert_eq!(outcome.tensor, vec![vec![vec![1.0, 2.0]]]);
    assert_eq!(outcome.warnings.len(), 1);
}

#[test]
fn test_strict_rejects_mismatch() {
    let transform = TensorTransform::identity(3, DimensionPolicy::Strict);
    let err = transform
        .apply("keys", &vec![vec![vec![1.0, 2.0]]])
        .err()
        .unwrap();
    assert_eq!(
        err,
        BridgeError::DimensionMismatch {
            context: "keys transform".to_string(),
            expected: 3,
            actual: 2,
        }
    );
}

#[test]
fn test_rejects_empty_and_ragged_matrices() {
    assert!(matches!(
        TensorTransform::new(&[], DimensionPolicy::Lenient),
        Err(BridgeError::EmptyMatrix(_))
    ));
    assert!(matches!(
        TensorTransform::new(&[vec![1.0, 0.0], vec![1.0]], DimensionPolicy::Lenient),
        Err(BridgeError::RaggedMatrix { row: 1, .. })
    ));
}

fn tensor_strategy() -> impl Strategy<Value = (usize, Vec<Vec<Vec<f32>>>)> {
    (1usize..8).prop_flat_map(|dim| {
        let head = prop::collection::vec(-100.0f32..100.0, dim);
        let layer = prop::collection::vec(head, 1..4);
        (Just(dim), prop::collection::vec(layer, 1..4))
    })
}

proptest! {
    #[test]
    fn prop_identity_transform((dim, tensor) in tensor_strategy()) {
        let transform = TensorTransform::identity(dim, DimensionPolicy::Strict);
        let outcome = transform.apply("keys", &tensor).unwrap();
        for (layer_out, layer_in) in outcome.tensor.iter().zip(tensor.iter()) {
            for (head_out, head_in) in layer_out.iter().zip(layer_in.iter()) {
                for (a, b) in head_out.iter().zip(head_in.iter()) {
                    prop_assert!((a - b).abs() <= 1e-6);
                }
            }
        }
    }
}
