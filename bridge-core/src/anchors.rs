use bridge_structs::{
    anchors::{AnchorCategory, AnchorDataset, AnchorTemplate, SemanticAnchor, NUM_CATEGORIES},
    config::EngineConfig,
    BridgeError,
};
use bridge_utils::{normalize, seed_from_parts};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use tracing::debug;

/// The golden reference vectors. Built once, never mutated; share it behind
/// an `Arc` and swap whole stores through [`SharedAnchors`].
#[derive(Debug, Clone)]
pub struct AnchorStore {
    version: String,
    dimension: usize,
    anchors: Vec<SemanticAnchor>,
    index_by_id: HashMap<u32, usize>,
    by_category: Vec<Vec<usize>>,
}

impl AnchorStore {
    /// Validates `dataset` and generates a unit-norm reference vector of
    /// `dimension` coordinates for every template. Identical inputs always
    /// yield identical vectors.
    pub fn build(
        dataset: &AnchorDataset,
        dimension: usize,
        seed: &str,
    ) -> Result<Self, BridgeError> {
        dataset.validate()?;
        if dimension == 0 {
            return Err(BridgeError::InvalidDataset(
                "anchor dimension must be at least 1".to_string(),
            ));
        }

        let mut anchors = Vec::with_capacity(dataset.categories.len() * 64);
        let mut index_by_id = HashMap::new();
        let mut by_category = vec![Vec::new(); NUM_CATEGORIES];
        for group in dataset.categories.iter() {
            for template in group.anchors.iter() {
                let idx = anchors.len();
                let reference_vector = generate_reference_vector(seed, template, dimension);
                anchors.push(SemanticAnchor::new(template, reference_vector));
                index_by_id.insert(template.id, idx);
                by_category[template.category.index()].push(idx);
            }
        }
        debug!(
            version = %dataset.version,
            dimension,
            num_anchors = anchors.len(),
            "built anchor store"
        );
        Ok(Self {
            version: dataset.version.clone(),
            dimension,
            anchors,
            index_by_id,
            by_category,
        })
    }

    pub fn builtin(config: &EngineConfig) -> Result<Self, BridgeError> {
        Self::build(
            &AnchorDataset::builtin(),
            config.anchor_dimension,
            &config.anchor_seed,
        )
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn all(&self) -> &[SemanticAnchor] {
        &self.anchors
    }

    pub fn get(&self, id: u32) -> Result<&SemanticAnchor, BridgeError> {
        self.index_by_id
            .get(&id)
            .map(|&idx| &self.anchors[idx])
            .ok_or(BridgeError::AnchorNotFound(id))
    }

    pub fn by_category(&self, category: AnchorCategory) -> Vec<&SemanticAnchor> {
        self.by_category[category.index()]
            .iter()
            .map(|&idx| &self.anchors[idx])
            .collect()
    }

    pub fn by_category_name(&self, name: &str) -> Result<Vec<&SemanticAnchor>, BridgeError> {
        Ok(self.by_category(name.parse::<AnchorCategory>()?))
    }
}

/// Draws `dimension` standard-normal values from an RNG seeded by the anchor's
/// identity, then scales the result to unit length.
pub fn generate_reference_vector(
    seed: &str,
    template: &AnchorTemplate,
    dimension: usize,
) -> Vec<f32> {
    let id = template.id.to_string();
    let mut rng = StdRng::from_seed(seed_from_parts(&[
        seed,
        template.category.as_str(),
        &id,
        &template.prompt,
    ]));
    let raw: Vec<f32> = (0..dimension)
        .map(|_| {
            let x: f64 = StandardNormal.sample(&mut rng);
            x as f32
        })
        .collect();
    normalize(&raw)
}

/// Write-once, read-many handle over the active anchor set. Readers take an
/// `Arc` snapshot; `replace` swaps the whole store in one step.
#[derive(Debug)]
pub struct SharedAnchors {
    current: RwLock<Arc<AnchorStore>>,
}

impl SharedAnchors {
    pub fn new(store: AnchorStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
        }
    }

    pub fn snapshot(&self) -> Arc<AnchorStore> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Installs `store` and returns the one it replaced.
    pub fn replace(&self, store: AnchorStore) -> Arc<AnchorStore> {
        let next = Arc::new(store);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(
            version = %next.version(),
            dimension = next.dimension(),
            "replacing anchor store"
        );
        std::mem::replace(&mut *guard, next)
    }
}
