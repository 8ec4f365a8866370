use bridge_structs::{
    config::DimensionPolicy,
    core::{check_rectangular, Tensor3, WMatrix},
    BridgeError,
};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::warn;

pub struct TransformOutcome {
    pub tensor: Tensor3,
    pub warnings: Vec<String>,
}

/// Applies a dense `rows x cols` matrix to every head vector of a
/// `[layer][head][dim]` tensor: `out[i] = sum_j m[i][j] * in[j]`.
pub struct TensorTransform {
    matrix: Array2<f32>,
    policy: DimensionPolicy,
}

/// Copies a row-major matrix into an `Array2`, converting each entry with `f`.
pub(crate) fn to_array2<T: Copy>(
    name: &str,
    matrix: &[Vec<f32>],
    f: impl Fn(f32) -> T,
) -> Result<Array2<T>, BridgeError> {
    check_rectangular(name, matrix)?;
    let shape = (matrix.len(), matrix[0].len());
    let flat: Vec<T> = matrix.iter().flatten().map(|&x| f(x)).collect();
    Array2::from_shape_vec(shape, flat)
        .map_err(|e| BridgeError::MalformedWMatrix(format!("{}: {}", name, e)))
}

impl TensorTransform {
    pub fn new(matrix: &[Vec<f32>], policy: DimensionPolicy) -> Result<Self, BridgeError> {
        Ok(Self {
            matrix: to_array2("transform matrix", matrix, |x| x)?,
            policy,
        })
    }

    pub fn from_w_matrix(w_matrix: &WMatrix, policy: DimensionPolicy) -> Result<Self, BridgeError> {
        Self::new(w_matrix.matrix(), policy)
    }

    pub fn identity(n: usize, policy: DimensionPolicy) -> Self {
        Self {
            matrix: Array2::eye(n),
            policy,
        }
    }

    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Multiplies one vector. Input coordinates past `cols` are ignored and
    /// missing ones read as 0.
    pub fn apply_vector(&self, input: &[f32]) -> Vec<f32> {
        let mut padded = Array1::<f32>::zeros(self.cols());
        for (dst, &src) in padded.iter_mut().zip(input.iter()) {
            *dst = src;
        }
        self.matrix.dot(&padded).to_vec()
    }

    /// Transforms every head of `tensor`. `name` labels warnings and errors.
    /// Head widths that differ from `cols` are zero-padded or truncated under
    /// the lenient policy and rejected under the strict one.
    pub fn apply(&self, name: &str, tensor: &Tensor3) -> Result<TransformOutcome, BridgeError> {
        let cols = self.cols();
        let mismatched: BTreeSet<usize> = tensor
            .iter()
            .flatten()
            .map(|head| head.len())
            .filter(|&len| len != cols)
            .collect();

        let mut warnings = Vec::new();
        if let Some(&actual) = mismatched.iter().next() {
            if self.policy == DimensionPolicy::Strict {
                return Err(BridgeError::DimensionMismatch {
                    context: format!("{} transform", name),
                    expected: cols,
                    actual,
                });
            }
            let widths: Vec<String> = mismatched.iter().map(|w| w.to_string()).collect();
            warn!(
                tensor = name,
                matrix_cols = cols,
                head_dims = %widths.join(","),
                "zero-padding head vectors to W-Matrix width"
            );
            warnings.push(format!(
                "DimensionMismatch: {} head vectors have dimension {} but the W-Matrix expects {}; missing coordinates were treated as 0 and extra ones ignored",
                name,
                widths.join("/"),
                cols
            ));
        }

        let transformed: Tensor3 = tensor
            .par_iter()
            .map(|layer| {
                layer
                    .iter()
                    .map(|head| self.apply_vector(head))
                    .collect::<Vec<Vec<f32>>>()
            })
            .collect();

        Ok(TransformOutcome {
            tensor: transformed,
            warnings,
        })
    }
}
