//! Model module wrapping the generative model behind a single trait seam

mod runtime;
mod loader;
mod tokenizer;

pub use runtime::{ModelRuntime, RuntimeStats, SamplingSettings};
pub use loader::ModelLoader;
pub use tokenizer::ChatTokenizer;

use crate::error::Result;
use crate::types::GenerationParams;

/// The external text-generation capability.
///
/// Implementors are owned by a single generation worker, so calls never
/// overlap and `&mut self` is available for caches and statistics.
pub trait TextGenerator: Send {
    /// Generate from `prompt`, returning the full output sequence: the
    /// (possibly truncated) prompt tokens followed by the generated ones.
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<Vec<u32>>;

    /// Decode a token sequence to text, special tokens skipped.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Whether the model lives on an accelerator.
    fn uses_gpu(&self) -> bool {
        false
    }
}
