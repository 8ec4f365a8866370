use crate::BridgeError;
use serde::{Deserialize, Serialize};

/// How shape disagreements between vectors, matrices and anchors are handled.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DimensionPolicy {
    /// Truncate or zero-pad, and record a warning.
    #[default]
    Lenient,
    /// Fail with `BridgeError::DimensionMismatch`.
    Strict,
}

/// Which mean/variance feed the KL-from-N(0,1) estimate in fast validation.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum KlStatistics {
    /// Statistics of the z-normalised vector (near 0 / 1 by construction).
    #[default]
    Normalized,
    /// Statistics of the vector before normalisation.
    Raw,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LossWeights {
    pub lambda_alignment: f64,
    pub lambda_ortho: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            lambda_alignment: 1.0,
            lambda_ortho: 0.01,
        }
    }
}

/// Every tunable of the engine. Fields absent from JSON keep their defaults;
/// call [`validate`](Self::validate) before use.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub anchor_dimension: usize,
    pub anchor_seed: String,
    pub quality_threshold: f64,
    pub temperature: f64,
    pub kl_threshold: f64,
    pub kl_penalty: f64,
    pub normalization_epsilon: f64,
    pub validation_top_k: usize,
    pub report_top_k: usize,
    pub dimension_policy: DimensionPolicy,
    pub kl_statistics: KlStatistics,
    pub loss_weights: LossWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            anchor_dimension: 4096,
            anchor_seed: "neural-bridge-anchors-v1".to_string(),
            quality_threshold: 0.95,
            temperature: 0.07,
            kl_threshold: 0.1,
            kl_penalty: 0.1,
            normalization_epsilon: 1e-8,
            validation_top_k: 10,
            report_top_k: 5,
            dimension_policy: DimensionPolicy::Lenient,
            kl_statistics: KlStatistics::Normalized,
            loss_weights: LossWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.anchor_dimension == 0 {
            return Err(invalid("anchorDimension must be at least 1".to_string()));
        }
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(invalid(format!(
                "temperature must be a finite positive number, got {}",
                self.temperature
            )));
        }
        check_unit_interval("qualityThreshold", self.quality_threshold)?;
        check_unit_interval("klPenalty", self.kl_penalty)?;
        check_non_negative("klThreshold", self.kl_threshold)?;
        if !(self.normalization_epsilon.is_finite() && self.normalization_epsilon > 0.0) {
            return Err(invalid(format!(
                "normalizationEpsilon must be a finite positive number, got {}",
                self.normalization_epsilon
            )));
        }
        if self.validation_top_k == 0 {
            return Err(invalid("validationTopK must be at least 1".to_string()));
        }
        if self.report_top_k == 0 {
            return Err(invalid("reportTopK must be at least 1".to_string()));
        }
        check_non_negative("lossWeights.lambdaAlignment", self.loss_weights.lambda_alignment)?;
        check_non_negative("lossWeights.lambdaOrtho", self.loss_weights.lambda_ortho)?;
        Ok(())
    }
}

fn invalid(message: String) -> BridgeError {
    BridgeError::InvalidConfig(message)
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), BridgeError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{} must be in [0, 1], got {}", name, value)));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), BridgeError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(invalid(format!(
            "{} must be a finite non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}
