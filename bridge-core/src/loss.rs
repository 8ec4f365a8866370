//! Training and certification signals for W-Matrices.
//!
//! The total objective is `L = L_contrastive + λ₁·ε + λ₂·L_ortho`, where the
//! alignment term ε is measured offline and arrives with the W-Matrix.

use crate::{anchors::AnchorStore, transform::to_array2};
use bridge_structs::{anchors::AnchorCategory, config::LossWeights, BridgeError};
use bridge_utils::cosine_similarity;
use ndarray::Array2;

pub struct LossEngine {
    temperature: f64,
}

impl LossEngine {
    /// `temperature` must be finite and positive; anything else turns the
    /// logits into `inf` or `NaN` or flips the ordering.
    pub fn new(temperature: f64) -> Result<Self, BridgeError> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(BridgeError::InvalidConfig(format!(
                "temperature must be a finite positive number, got {}",
                temperature
            )));
        }
        Ok(Self { temperature })
    }

    /// InfoNCE loss of `aligned` against one positive and any number of
    /// negative anchors.
    pub fn contrastive(
        &self,
        aligned: &[f32],
        positive: &[f32],
        negatives: &[&[f32]],
    ) -> Result<f64, BridgeError> {
        if aligned.is_empty() {
            return Err(BridgeError::EmptyVector("aligned vector".to_string()));
        }
        if positive.is_empty() {
            return Err(BridgeError::EmptyVector("positive anchor".to_string()));
        }
        let positive_sim = cosine_similarity(aligned, positive);
        let negative_sims: Vec<f64> = negatives
            .iter()
            .map(|negative| cosine_similarity(aligned, negative))
            .collect();
        self.contrastive_from_similarities(positive_sim, &negative_sims)
    }

    /// `-log(exp(s+/τ) / (exp(s+/τ) + Σ exp(s-/τ)))`, evaluated as
    /// log-sum-exp minus the positive logit so large logits cannot overflow.
    /// A non-finite result is an error, never a loss.
    pub fn contrastive_from_similarities(
        &self,
        positive_sim: f64,
        negative_sims: &[f64],
    ) -> Result<f64, BridgeError> {
        let positive_logit = positive_sim / self.temperature;
        let negative_logits = negative_sims.iter().map(|s| s / self.temperature);
        let max_logit = negative_logits.clone().fold(positive_logit, f64::max);
        let sum_exp: f64 = (positive_logit - max_logit).exp()
            + negative_logits
                .map(|l| (l - max_logit).exp())
                .sum::<f64>();
        let loss = max_logit + sum_exp.ln() - positive_logit;
        if !loss.is_finite() {
            return Err(BridgeError::NumericalInstability(format!(
                "contrastive loss evaluated to {}",
                loss
            )));
        }
        // rounding can leave a tiny negative value
        Ok(loss.max(0.0))
    }

    /// Contrastive loss using the anchor set: the positive is the closest
    /// anchor of `category`, the negatives are the closest anchor of every
    /// other category.
    pub fn contrastive_for_category(
        &self,
        store: &AnchorStore,
        aligned: &[f32],
        category: AnchorCategory,
    ) -> Result<f64, BridgeError> {
        if aligned.is_empty() {
            return Err(BridgeError::EmptyVector("aligned vector".to_string()));
        }
        let best_in = |c: AnchorCategory| {
            store
                .by_category(c)
                .iter()
                .map(|anchor| cosine_similarity(aligned, anchor.reference_vector()))
                .fold(f64::NEG_INFINITY, f64::max)
        };
        let positive_sim = best_in(category);
        let negative_sims: Vec<f64> = AnchorCategory::ALL
            .iter()
            .filter(|&&c| c != category)
            .map(|&c| best_in(c))
            .collect();
        self.contrastive_from_similarities(positive_sim, &negative_sims)
    }

    /// `‖WᵀW − I‖²_F`: zero exactly when the columns of `matrix` are orthonormal.
    pub fn orthogonality(&self, matrix: &[Vec<f32>]) -> Result<f64, BridgeError> {
        let w = to_array2("orthogonality matrix", matrix, |x| x as f64)?;
        let gram = w.t().dot(&w);
        let deviation = gram - Array2::<f64>::eye(w.ncols());
        Ok(deviation.mapv(|x| x * x).sum())
    }

    pub fn total_loss(
        &self,
        contrastive: f64,
        epsilon: f64,
        orthogonality: f64,
        weights: &LossWeights,
    ) -> f64 {
        contrastive + weights.lambda_alignment * epsilon + weights.lambda_ortho * orthogonality
    }
}
