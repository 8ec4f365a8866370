use crate::{
    anchors::{AnchorStore, SharedAnchors},
    loss::LossEngine,
    similarity::{SearchOutcome, SimilarityIndex},
    transform::TensorTransform,
    validator::{FastValidator, QualityAssessment},
};
use bridge_structs::{
    anchors::{AnchorCategory, NUM_CATEGORIES},
    config::EngineConfig,
    core::{
        AlignmentResult, KVCache, NearestAnchor, QualityLevel, QualityMetrics, ValidationReport,
        WMatrix, WMatrixReport,
    },
    BridgeError,
};
use bridge_utils::element_wise_mean;
use rayon::prelude::*;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, warn};

/// Baseline alignment loss against which the fidelity boost is measured.
pub const BASELINE_EPSILON: f64 = 0.1;

const LOW_COVERAGE: f64 = 0.25;

/// Step estimate of how much information survives a W-Matrix with the given
/// alignment loss.
pub fn estimate_information_retention(epsilon: f64) -> f64 {
    if epsilon < 0.05 {
        0.96
    } else if epsilon < 0.10 {
        0.93
    } else if epsilon < 0.15 {
        0.88
    } else {
        (1.0 - epsilon).max(0.70)
    }
}

/// Percentage improvement of `epsilon` over `baseline_epsilon`, in `[0, 100]`.
pub fn estimate_fidelity_boost(epsilon: f64, baseline_epsilon: f64) -> f64 {
    if epsilon >= baseline_epsilon {
        return 0.0;
    }
    ((baseline_epsilon - epsilon) / baseline_epsilon * 100.0).clamp(0.0, 100.0)
}

/// Entry point for the marketplace. Aligns KV-caches and validates vectors
/// against one immutable anchor snapshot.
///
/// Every call is a pure function of its arguments, the configuration and the
/// anchor snapshot, so one engine can serve many threads at once.
#[derive(Debug, Clone)]
pub struct BridgeEngine {
    anchors: Arc<AnchorStore>,
    config: EngineConfig,
}

impl BridgeEngine {
    /// Fails with `InvalidConfig` when `config` does not validate.
    pub fn new(anchors: Arc<AnchorStore>, config: EngineConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        Ok(Self { anchors, config })
    }

    pub fn from_shared(
        anchors: &SharedAnchors,
        config: EngineConfig,
    ) -> Result<Self, BridgeError> {
        Self::new(anchors.snapshot(), config)
    }

    pub fn with_builtin_anchors(config: EngineConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let anchors = AnchorStore::builtin(&config)?;
        Self::new(Arc::new(anchors), config)
    }

    pub fn anchors(&self) -> &AnchorStore {
        &self.anchors
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn find_nearest(&self, vector: &[f32], k: usize) -> Result<SearchOutcome, BridgeError> {
        SimilarityIndex::new(&self.anchors, self.config.dimension_policy).find_nearest(vector, k)
    }

    pub fn loss_engine(&self) -> Result<LossEngine, BridgeError> {
        LossEngine::new(self.config.temperature)
    }

    /// Maps `kv_cache` into the target model's space with `w_matrix` and
    /// scores the result. Model mismatches and lenient shape fixes are
    /// reported as warnings; only malformed input is an error.
    pub fn align_kv_cache(
        &self,
        kv_cache: &KVCache,
        w_matrix: &WMatrix,
        target_model: &str,
    ) -> Result<AlignmentResult, BridgeError> {
        let mut warnings = Vec::new();
        if kv_cache.source_model() != w_matrix.source_model() {
            warn!(
                kv_source = kv_cache.source_model(),
                w_source = w_matrix.source_model(),
                "source model mismatch"
            );
            warnings.push(format!(
                "ModelMismatch: KV-cache source model '{}' differs from W-Matrix source model '{}'",
                kv_cache.source_model(),
                w_matrix.source_model()
            ));
        }
        if target_model != w_matrix.target_model() {
            warn!(
                requested = target_model,
                w_target = w_matrix.target_model(),
                "target model mismatch"
            );
            warnings.push(format!(
                "ModelMismatch: requested target model '{}' differs from W-Matrix target model '{}'",
                target_model,
                w_matrix.target_model()
            ));
        }

        let transform = TensorTransform::from_w_matrix(w_matrix, self.config.dimension_policy)?;
        let keys = transform.apply("keys", kv_cache.keys())?;
        let values = transform.apply("values", kv_cache.values())?;
        warnings.extend(keys.warnings);
        warnings.extend(values.warnings);

        let aligned_kv_cache = KVCache::new(
            target_model.to_string(),
            keys.tensor,
            values.tensor,
            kv_cache.attention_mask().cloned(),
            kv_cache.metadata().clone(),
        )?;

        let representative = element_wise_mean(aligned_kv_cache.head_vectors());
        let assessment = FastValidator::new(&self.anchors, &self.config).assess(&representative)?;
        let nearest_anchors = self.report_neighbours(&representative, &assessment)?;
        push_unique(&mut warnings, assessment.warnings);

        let cosine_similarity = nearest_anchors
            .first()
            .map(|n| n.similarity)
            .unwrap_or(0.0);
        let quality = QualityMetrics::new(
            assessment.score,
            self.config.quality_threshold,
            cosine_similarity,
            estimate_information_retention(w_matrix.epsilon()),
            w_matrix.epsilon(),
        );

        debug!(
            source_model = kv_cache.source_model(),
            target_model,
            w_version = w_matrix.version(),
            score = quality.semantic_quality_score,
            passes = quality.passes_threshold,
            num_warnings = warnings.len(),
            "aligned kv-cache"
        );

        Ok(AlignmentResult {
            aligned_kv_cache,
            quality,
            nearest_anchors,
            validation_warnings: warnings,
        })
    }

    /// Pre-screens a vector before it is packaged: the fast validation path
    /// without a transform step.
    pub fn validate_vector(
        &self,
        vector: &[f32],
        source_model: Option<&str>,
    ) -> Result<ValidationReport, BridgeError> {
        let assessment = FastValidator::new(&self.anchors, &self.config).assess(vector)?;
        let nearest_anchors = self.report_neighbours(vector, &assessment)?;

        let categories: HashSet<AnchorCategory> =
            assessment.nearest.iter().map(|n| n.category).collect();
        let coverage = categories.len() as f64 / NUM_CATEGORIES as f64;
        let recommendations = self.recommendations(vector, &assessment, categories.len());

        let mut warnings = Vec::new();
        push_unique(&mut warnings, assessment.warnings);

        Ok(ValidationReport {
            calibration_score: assessment.score,
            semantic_loss: 1.0 - assessment.score,
            quality_level: QualityLevel::from_score(
                assessment.score,
                self.config.quality_threshold,
            ),
            coverage,
            nearest_anchors,
            recommendations,
            warnings,
            source_model: source_model.map(|m| m.to_string()),
        })
    }

    /// [`validate_vector`](Self::validate_vector) over many vectors in
    /// parallel. Results keep input order.
    pub fn validate_batch(
        &self,
        vectors: &[Vec<f32>],
    ) -> Result<Vec<ValidationReport>, BridgeError> {
        vectors
            .par_iter()
            .map(|vector| self.validate_vector(vector, None))
            .collect()
    }

    /// Contrastive loss of `vector` with `category` as the positive class.
    pub fn contrastive_loss(&self, vector: &[f32], category: &str) -> Result<f64, BridgeError> {
        let category = category.parse::<AnchorCategory>()?;
        self.loss_engine()?
            .contrastive_for_category(&self.anchors, vector, category)
    }

    /// Full training objective for `vector` aligned by `w_matrix`, weighted by
    /// the configured loss weights.
    pub fn total_loss(
        &self,
        vector: &[f32],
        category: &str,
        w_matrix: &WMatrix,
    ) -> Result<f64, BridgeError> {
        let engine = self.loss_engine()?;
        let contrastive = self.contrastive_loss(vector, category)?;
        let orthogonality = engine.orthogonality(w_matrix.matrix())?;
        Ok(engine.total_loss(
            contrastive,
            w_matrix.epsilon(),
            orthogonality,
            &self.config.loss_weights,
        ))
    }

    pub fn inspect_w_matrix(&self, w_matrix: &WMatrix) -> Result<WMatrixReport, BridgeError> {
        let orthogonality_loss = self.loss_engine()?.orthogonality(w_matrix.matrix())?;
        Ok(WMatrixReport {
            version: w_matrix.version().to_string(),
            source_model: w_matrix.source_model().to_string(),
            target_model: w_matrix.target_model().to_string(),
            rows: w_matrix.rows(),
            cols: w_matrix.cols(),
            orthogonality_loss,
            information_retention: estimate_information_retention(w_matrix.epsilon()),
            fidelity_boost: estimate_fidelity_boost(w_matrix.epsilon(), BASELINE_EPSILON),
        })
    }

    /// The top `report_top_k` anchors. Reuses the validator's search when it
    /// already ranked at least that many.
    fn report_neighbours(
        &self,
        vector: &[f32],
        assessment: &QualityAssessment,
    ) -> Result<Vec<NearestAnchor>, BridgeError> {
        if self.config.report_top_k <= self.config.validation_top_k {
            let k = self.config.report_top_k.min(assessment.nearest.len());
            return Ok(assessment.nearest[..k].to_vec());
        }
        Ok(self.find_nearest(vector, self.config.report_top_k)?.neighbours)
    }

    fn recommendations(
        &self,
        vector: &[f32],
        assessment: &QualityAssessment,
        num_categories: usize,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();
        if !assessment.numerically_stable {
            recommendations.push(
                "Vector contains NaN or infinite values; re-export it from a numerically stable checkpoint"
                    .to_string(),
            );
            return recommendations;
        }
        if vector.is_empty() {
            recommendations.push("Vector is empty; nothing can be packaged".to_string());
            return recommendations;
        }
        if vector.len() != self.anchors.dimension() {
            recommendations.push(format!(
                "Vector has {} dimensions but anchors have {}; project it with a W-Matrix before listing",
                vector.len(),
                self.anchors.dimension()
            ));
        }
        if let Some(kl) = assessment
            .kl_divergence
            .filter(|_| assessment.distribution_penalized)
        {
            recommendations.push(format!(
                "Value distribution diverges from N(0,1) (KL {:.4}); normalise activations before export",
                kl
            ));
        }
        if assessment.score < self.config.quality_threshold {
            recommendations.push(format!(
                "Calibration score {:.4} is below the {:.2} threshold; retrain or re-align the W-Matrix before listing",
                assessment.score, self.config.quality_threshold
            ));
        }
        let coverage = num_categories as f64 / NUM_CATEGORIES as f64;
        if coverage < LOW_COVERAGE {
            recommendations.push(format!(
                "Nearest anchors span only {} of {} categories; the vector may be over-specialised",
                num_categories, NUM_CATEGORIES
            ));
        }
        if recommendations.is_empty() {
            recommendations.push(
                "Vector meets the semantic fidelity threshold and is ready to package".to_string(),
            );
        }
        recommendations
    }
}

fn push_unique(warnings: &mut Vec<String>, incoming: Vec<String>) {
    for warning in incoming {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
}
