use crate::{anchors::AnchorStore, similarity::SimilarityIndex};
use bridge_structs::{
    config::{EngineConfig, KlStatistics},
    core::NearestAnchor,
    BridgeError,
};
use bridge_utils::is_finite;
use statrs::statistics::Statistics;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct QualityAssessment {
    /// Semantic quality in `[0, 1]`.
    pub score: f64,
    pub max_anchor_similarity: f64,
    /// `None` when the distribution check was skipped (non-finite or empty input).
    pub kl_divergence: Option<f64>,
    pub numerically_stable: bool,
    pub distribution_penalized: bool,
    pub nearest: Vec<NearestAnchor>,
    pub warnings: Vec<String>,
}

/// Inference-free quality scoring against the anchor set.
pub struct FastValidator<'a> {
    index: SimilarityIndex<'a>,
    config: &'a EngineConfig,
}

impl<'a> FastValidator<'a> {
    pub fn new(store: &'a AnchorStore, config: &'a EngineConfig) -> Self {
        Self {
            index: SimilarityIndex::new(store, config.dimension_policy),
            config,
        }
    }

    pub fn score(&self, vector: &[f32]) -> Result<f64, BridgeError> {
        Ok(self.assess(vector)?.score)
    }

    /// Scores `vector` in a fixed order: nearest anchors first, then the
    /// finiteness gate, then the distribution check on the z-normalised vector.
    pub fn assess(&self, vector: &[f32]) -> Result<QualityAssessment, BridgeError> {
        let search = self
            .index
            .find_nearest(vector, self.config.validation_top_k)?;
        let max_anchor_similarity = search
            .neighbours
            .first()
            .map(|n| n.similarity)
            .unwrap_or(0.0);
        let mut assessment = QualityAssessment {
            score: 0.0,
            max_anchor_similarity,
            kl_divergence: None,
            numerically_stable: true,
            distribution_penalized: false,
            nearest: search.neighbours,
            warnings: search.warnings,
        };

        if !is_finite(vector) {
            warn!(dim = vector.len(), "vector has non-finite coordinates");
            assessment.numerically_stable = false;
            assessment
                .warnings
                .push("NumericalInstability: vector contains NaN or infinite values".to_string());
            return Ok(assessment);
        }
        if vector.is_empty() {
            assessment.warnings.push("EmptyVector: nothing to score".to_string());
            return Ok(assessment);
        }

        let kl = self.kl_divergence(vector);
        let base = if kl.abs() > self.config.kl_threshold {
            assessment.distribution_penalized = true;
            (max_anchor_similarity - self.config.kl_penalty).max(0.0)
        } else {
            max_anchor_similarity
        };
        assessment.kl_divergence = Some(kl);
        assessment.score = base.clamp(0.0, 1.0);

        debug!(
            score = assessment.score,
            max_anchor_similarity,
            kl,
            "fast validation"
        );
        Ok(assessment)
    }

    /// `0.5 * (var + mean^2 - 1 - ln var)`, the KL divergence of a Gaussian
    /// with the given moments from N(0, 1).
    fn kl_divergence(&self, vector: &[f32]) -> f64 {
        let eps = self.config.normalization_epsilon;
        let raw: Vec<f64> = vector.iter().map(|&x| x as f64).collect();
        let mean = raw.iter().mean();
        let variance = raw.iter().population_variance();

        let (mean, variance) = match self.config.kl_statistics {
            KlStatistics::Raw => (mean, variance),
            KlStatistics::Normalized => {
                let std_dev = variance.sqrt();
                let normalized: Vec<f64> =
                    raw.iter().map(|x| (x - mean) / (std_dev + eps)).collect();
                (
                    normalized.iter().mean(),
                    normalized.iter().population_variance(),
                )
            }
        };

        0.5 * (variance + mean * mean - 1.0 - variance.max(eps).ln())
    }
}
