// Tool-trigger evaluation
//
// Decides, per user message, whether tool definitions should be attached
// to the outbound backend call. A message that fails to vectorize fails
// open to plain conversation: the chat stays usable when the embedding
// table lacks coverage.

use std::sync::Arc;

use crate::embedding::{cosine_similarity, EmbeddingTable, ExemplarSet, PrototypeStore};

/// Default cosine-similarity threshold for tool activation.
pub const DEFAULT_TRIGGER_THRESHOLD: f32 = 0.75;

/// Compare a vectorized message against one tool prototype.
/// `None` (vectorization miss) never triggers.
pub fn should_trigger(message: Option<&[f32]>, prototype: &[f32], threshold: f32) -> bool {
    match message {
        Some(vector) => cosine_similarity(vector, prototype) >= threshold,
        None => false,
    }
}

/// Semantic trigger classifier over all known tool prototypes.
pub struct TriggerEngine {
    table: Arc<EmbeddingTable>,
    prototypes: PrototypeStore,
    threshold: f32,
}

impl TriggerEngine {
    pub fn new(table: Arc<EmbeddingTable>, exemplars: ExemplarSet, threshold: f32) -> Self {
        let prototypes = PrototypeStore::new(Arc::clone(&table), exemplars);
        Self {
            table,
            prototypes,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Does this message fall inside one specific tool's intent region?
    pub fn matches_tool(&self, message: &str, tool_id: &str) -> bool {
        let prototype = match self.prototypes.get(tool_id) {
            Some(p) => p,
            None => return false,
        };
        let vector = self.table.vector(message);
        should_trigger(vector.as_deref(), &prototype, self.threshold)
    }

    /// OR of `should_trigger` across every known tool prototype. The turn
    /// setup uses this to decide whether to attach any tool definitions.
    pub fn should_attach_tools(&self, message: &str) -> bool {
        let vector = match self.table.vector(message) {
            Some(v) => v,
            None => {
                tracing::debug!("message did not vectorize; no tools attached");
                return false;
            }
        };

        for tool_id in self.prototypes.tool_ids() {
            if let Some(prototype) = self.prototypes.get(&tool_id) {
                let similarity = cosine_similarity(&vector, &prototype);
                if similarity >= self.threshold {
                    tracing::info!(tool = %tool_id, similarity, "tool trigger matched");
                    return true;
                }
            }
        }

        false
    }
}
