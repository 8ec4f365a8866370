//! Cross-model latent alignment and validation.
//!
//! An [`AnchorStore`] of categorized reference vectors is built once and
//! shared read-only. [`BridgeEngine`] runs alignment and validation on top of
//! it.

pub mod anchors;
pub mod loss;
pub mod orchestrator;
pub mod similarity;
pub mod transform;
pub mod validator;

pub use anchors::{AnchorStore, SharedAnchors};
pub use loss::LossEngine;
pub use orchestrator::{
    estimate_fidelity_boost, estimate_information_retention, BridgeEngine, BASELINE_EPSILON,
};
pub use similarity::{SearchOutcome, SimilarityIndex};
pub use transform::{TensorTransform, TransformOutcome};
pub use validator::{FastValidator, QualityAssessment};
