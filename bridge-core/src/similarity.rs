use crate::anchors::AnchorStore;
use bridge_structs::{config::DimensionPolicy, core::NearestAnchor, BridgeError};
use bridge_utils::cosine_similarity;
use tracing::warn;

pub struct SearchOutcome {
    pub neighbours: Vec<NearestAnchor>,
    pub warnings: Vec<String>,
}

/// Exhaustive cosine search over an [`AnchorStore`].
pub struct SimilarityIndex<'a> {
    store: &'a AnchorStore,
    policy: DimensionPolicy,
}

impl<'a> SimilarityIndex<'a> {
    pub fn new(store: &'a AnchorStore, policy: DimensionPolicy) -> Self {
        Self { store, policy }
    }

    /// Top `k` anchors by cosine similarity, descending, ties broken by the
    /// lowest anchor id. A query whose length differs from the anchors is
    /// compared on the shared prefix (lenient) or rejected (strict).
    pub fn find_nearest(&self, vector: &[f32], k: usize) -> Result<SearchOutcome, BridgeError> {
        if k < 1 {
            return Err(BridgeError::InvalidK(k));
        }

        let mut warnings = Vec::new();
        let dimension = self.store.dimension();
        if vector.len() != dimension {
            if self.policy == DimensionPolicy::Strict {
                return Err(BridgeError::DimensionMismatch {
                    context: "similarity search".to_string(),
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let compared = vector.len().min(dimension);
            warn!(
                query_dim = vector.len(),
                anchor_dim = dimension,
                compared,
                "similarity search on truncated vectors"
            );
            warnings.push(format!(
                "DimensionMismatch: query vector has {} dimensions but anchors have {}; compared the first {} only",
                vector.len(),
                dimension,
                compared
            ));
        }

        let mut neighbours: Vec<NearestAnchor> = self
            .store
            .all()
            .iter()
            .map(|anchor| NearestAnchor {
                anchor_id: anchor.id(),
                category: anchor.category(),
                similarity: cosine_similarity(vector, anchor.reference_vector()),
            })
            .collect();
        neighbours.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.anchor_id.cmp(&b.anchor_id))
        });
        neighbours.truncate(k);

        Ok(SearchOutcome {
            neighbours,
            warnings,
        })
    }
}
