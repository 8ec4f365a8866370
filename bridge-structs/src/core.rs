use crate::{anchors::AnchorCategory, serializable_struct, BridgeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `[layer][head][dim]`
pub type Tensor3 = Vec<Vec<Vec<f32>>>;

serializable_struct! {
    KvMetadata {
        #[serde(default)]
        sequence_length: usize,
        #[serde(default)]
        context_description: String,
        #[serde(default)]
        token_count: usize,
        #[serde(default)]
        generated_at: String,
    }
}

/// Per-layer, per-head attention keys and values captured from one model.
///
/// Shape is checked on construction and on deserialization: at least one
/// layer, the same head count in every layer of `keys` and `values`, and one
/// non-zero head width per tensor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "KvCacheData")]
pub struct KVCache {
    source_model: String,
    keys: Tensor3,
    values: Tensor3,
    #[serde(skip_serializing_if = "Option::is_none")]
    attention_mask: Option<Vec<Vec<i32>>>,
    metadata: KvMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KvCacheData {
    source_model: String,
    keys: Tensor3,
    values: Tensor3,
    #[serde(default)]
    attention_mask: Option<Vec<Vec<i32>>>,
    #[serde(default)]
    metadata: KvMetadata,
}

impl Default for KvMetadata {
    fn default() -> Self {
        Self {
            sequence_length: 0,
            context_description: String::new(),
            token_count: 0,
            generated_at: String::new(),
        }
    }
}

impl TryFrom<KvCacheData> for KVCache {
    type Error = BridgeError;

    fn try_from(data: KvCacheData) -> Result<Self, Self::Error> {
        KVCache::new(
            data.source_model,
            data.keys,
            data.values,
            data.attention_mask,
            data.metadata,
        )
    }
}

impl KVCache {
    pub fn new(
        source_model: String,
        keys: Tensor3,
        values: Tensor3,
        attention_mask: Option<Vec<Vec<i32>>>,
        metadata: KvMetadata,
    ) -> Result<Self, BridgeError> {
        let (key_layers, key_heads, _) = tensor_shape("keys", &keys)?;
        let (value_layers, value_heads, _) = tensor_shape("values", &values)?;
        if key_layers != value_layers || key_heads != value_heads {
            return Err(BridgeError::MalformedKvCache(format!(
                "keys are [{}][{}] but values are [{}][{}]",
                key_layers, key_heads, value_layers, value_heads
            )));
        }
        Ok(Self {
            source_model,
            keys,
            values,
            attention_mask,
            metadata,
        })
    }

    pub fn source_model(&self) -> &str {
        &self.source_model
    }

    pub fn keys(&self) -> &Tensor3 {
        &self.keys
    }

    pub fn values(&self) -> &Tensor3 {
        &self.values
    }

    pub fn attention_mask(&self) -> Option<&Vec<Vec<i32>>> {
        self.attention_mask.as_ref()
    }

    pub fn metadata(&self) -> &KvMetadata {
        &self.metadata
    }

    pub fn num_layers(&self) -> usize {
        self.keys.len()
    }

    pub fn num_heads(&self) -> usize {
        self.keys[0].len()
    }

    pub fn key_dim(&self) -> usize {
        self.keys[0][0].len()
    }

    pub fn value_dim(&self) -> usize {
        self.values[0][0].len()
    }

    /// Every key head vector followed by every value head vector.
    pub fn head_vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.keys
            .iter()
            .chain(self.values.iter())
            .flat_map(|layer| layer.iter().map(|head| head.as_slice()))
    }
}

fn tensor_shape(name: &str, tensor: &Tensor3) -> Result<(usize, usize, usize), BridgeError> {
    let num_layers = tensor.len();
    if num_layers == 0 {
        return Err(BridgeError::MalformedKvCache(format!("{} has no layers", name)));
    }
    let num_heads = tensor[0].len();
    if num_heads == 0 {
        return Err(BridgeError::MalformedKvCache(format!("{} layer 0 has no heads", name)));
    }
    let head_dim = tensor[0][0].len();
    if head_dim == 0 {
        return Err(BridgeError::MalformedKvCache(format!("{} head vectors are empty", name)));
    }
    for (l, layer) in tensor.iter().enumerate() {
        if layer.len() != num_heads {
            return Err(BridgeError::MalformedKvCache(format!(
                "{} layer {} has {} heads, expected {}",
                name,
                l,
                layer.len(),
                num_heads
            )));
        }
        for (h, head) in layer.iter().enumerate() {
            if head.len() != head_dim {
                return Err(BridgeError::MalformedKvCache(format!(
                    "{} layer {} head {} has dimension {}, expected {}",
                    name,
                    l,
                    h,
                    head.len(),
                    head_dim
                )));
            }
        }
    }
    Ok((num_layers, num_heads, head_dim))
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMethod {
    Orthogonal,
    Learned,
    Hybrid,
}

/// A versioned linear map from a source model's hidden space (`cols`) onto a
/// target model's (`rows`). The matrix is non-empty and rectangular, and
/// `unifiedDimension` equals its row count.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "WMatrixData")]
pub struct WMatrix {
    version: String,
    source_model: String,
    target_model: String,
    matrix: Vec<Vec<f32>>,
    unified_dimension: usize,
    method: AlignmentMethod,
    epsilon: f64,
    orthogonality_score: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WMatrixData {
    version: String,
    source_model: String,
    target_model: String,
    matrix: Vec<Vec<f32>>,
    unified_dimension: usize,
    method: AlignmentMethod,
    epsilon: f64,
    #[serde(default)]
    orthogonality_score: f64,
}

impl TryFrom<WMatrixData> for WMatrix {
    type Error = BridgeError;

    fn try_from(data: WMatrixData) -> Result<Self, Self::Error> {
        WMatrix::new(
            data.version,
            data.source_model,
            data.target_model,
            data.matrix,
            data.unified_dimension,
            data.method,
            data.epsilon,
            data.orthogonality_score,
        )
    }
}

impl WMatrix {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: String,
        source_model: String,
        target_model: String,
        matrix: Vec<Vec<f32>>,
        unified_dimension: usize,
        method: AlignmentMethod,
        epsilon: f64,
        orthogonality_score: f64,
    ) -> Result<Self, BridgeError> {
        check_rectangular("W-Matrix", &matrix)?;
        if unified_dimension != matrix.len() {
            return Err(BridgeError::MalformedWMatrix(format!(
                "unifiedDimension is {} but the matrix has {} rows",
                unified_dimension,
                matrix.len()
            )));
        }
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(BridgeError::MalformedWMatrix(format!(
                "epsilon must be a finite non-negative number, got {}",
                epsilon
            )));
        }
        Ok(Self {
            version,
            source_model,
            target_model,
            matrix,
            unified_dimension,
            method,
            epsilon,
            orthogonality_score,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source_model(&self) -> &str {
        &self.source_model
    }

    pub fn target_model(&self) -> &str {
        &self.target_model
    }

    pub fn matrix(&self) -> &Vec<Vec<f32>> {
        &self.matrix
    }

    pub fn unified_dimension(&self) -> usize {
        self.unified_dimension
    }

    pub fn method(&self) -> AlignmentMethod {
        self.method
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn rows(&self) -> usize {
        self.matrix.len()
    }

    pub fn cols(&self) -> usize {
        self.matrix[0].len()
    }
}

/// Rejects empty matrices, empty rows and rows of differing width.
pub fn check_rectangular(name: &str, matrix: &[Vec<f32>]) -> Result<(), BridgeError> {
    if matrix.is_empty() || matrix[0].is_empty() {
        return Err(BridgeError::EmptyMatrix(name.to_string()));
    }
    let expected = matrix[0].len();
    for (row, values) in matrix.iter().enumerate() {
        if values.len() != expected {
            return Err(BridgeError::RaggedMatrix {
                row,
                expected,
                actual: values.len(),
            });
        }
    }
    Ok(())
}

serializable_struct! {
    NearestAnchor {
        anchor_id: u32,
        category: AnchorCategory,
        similarity: f64,
    }
}

impl fmt::Display for NearestAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} ({}, similarity {:.4})",
            self.anchor_id, self.category, self.similarity
        )
    }
}

serializable_struct! {
    QualityMetrics {
        semantic_quality_score: f64,
        semantic_loss: f64,
        passes_threshold: bool,
        cosine_similarity: f64,
        information_retention: f64,
        confidence: f64,
    }
}

impl QualityMetrics {
    /// Derives loss, gate and confidence from the score. The gate is inclusive:
    /// `score >= threshold` passes.
    pub fn new(
        semantic_quality_score: f64,
        threshold: f64,
        cosine_similarity: f64,
        information_retention: f64,
        epsilon: f64,
    ) -> Self {
        Self {
            semantic_quality_score,
            semantic_loss: 1.0 - semantic_quality_score,
            passes_threshold: semantic_quality_score >= threshold,
            cosine_similarity,
            information_retention,
            confidence: semantic_quality_score * (1.0 - epsilon),
        }
    }
}

serializable_struct! {
    AlignmentResult {
        aligned_kv_cache: KVCache,
        quality: QualityMetrics,
        nearest_anchors: Vec<NearestAnchor>,
        validation_warnings: Vec<String>,
    }
}

impl AlignmentResult {
    /// Turns a failed quality gate into a `BelowThreshold` error carrying the
    /// score and the closest anchor.
    pub fn ensure_passes(&self, threshold: f64) -> Result<(), BridgeError> {
        if self.quality.semantic_quality_score >= threshold {
            return Ok(());
        }
        Err(BridgeError::BelowThreshold {
            score: self.quality.semantic_quality_score,
            threshold_pct: (threshold * 100.0).round() as u32,
            nearest: self
                .nearest_anchors
                .first()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string()),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            QualityLevel::Excellent
        } else if score >= 0.85 {
            QualityLevel::Good
        } else if score >= 0.70 {
            QualityLevel::Fair
        } else {
            QualityLevel::Poor
        }
    }
}

serializable_struct! {
    ValidationReport {
        calibration_score: f64,
        semantic_loss: f64,
        quality_level: QualityLevel,
        coverage: f64,
        nearest_anchors: Vec<NearestAnchor>,
        recommendations: Vec<String>,
        warnings: Vec<String>,
        source_model: Option<String>,
    }
}

serializable_struct! {
    WMatrixReport {
        version: String,
        source_model: String,
        target_model: String,
        rows: usize,
        cols: usize,
        orthogonality_loss: f64,
        information_retention: f64,
        fidelity_boost: f64,
    }
}
