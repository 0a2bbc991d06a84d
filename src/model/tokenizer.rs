// Location: src/model/tokenizer.rs

use std::path::Path;
use tokenizers::{Tokenizer as HfTokenizer, TruncationParams};

use crate::error::{Result, ServiceError};

/// Token strings that end a generation for the model families we load
const EOS_CANDIDATES: &[&str] = &["<|endoftext|>", "</s>", "<|end_of_text|>", "<|eot_id|>"];

pub struct ChatTokenizer {
    /// HuggingFace tokenizer with truncation applied
    tokenizer: HfTokenizer,
    /// End-of-sequence token IDs present in the vocabulary
    eos_token_ids: Vec<u32>,
    /// Prompts are cut to this many tokens
    max_length: usize,
}

impl ChatTokenizer {
    /// Load a tokenizer.json and truncate every encoding to `max_length` tokens
    pub fn from_file(path: impl AsRef<Path>, max_length: usize) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = HfTokenizer::from_file(path)
            .map_err(|e| ServiceError::InitializationError {
                message: format!("Failed to load tokenizer from {}: {}", path.display(), e),
                source: None,
            })?;

        Self::new(tokenizer, max_length)
    }

    pub fn new(mut tokenizer: HfTokenizer, max_length: usize) -> Result<Self> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| ServiceError::InitializationError {
                message: format!("Failed to configure truncation: {}", e),
                source: None,
            })?;

        let eos_token_ids = EOS_CANDIDATES
            .iter()
            .filter_map(|token| tokenizer.token_to_id(token))
            .collect();

        Ok(Self {
            tokenizer,
            eos_token_ids,
            max_length,
        })
    }

    /// Encode text to token IDs
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ServiceError::processing(format!("Tokenization failed: {}", e)))?;

        Ok(encoding.get_ids().to_vec())
    }

    /// Decode token IDs back to text, dropping special tokens
    pub fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| ServiceError::processing(format!("Decoding failed: {}", e)))
    }

    pub fn eos_token_ids(&self) -> &[u32] {
        &self.eos_token_ids
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    pub(crate) const WORDS: &[&str] = &[
        "<|endoftext|>", "[UNK]", "###", "Instruction", "Response", ":", "I", "feel",
        "anxious", "Try", "slow", "breathing", ".",
    ];

    /// Word-level tokenizer small enough to reason about in tests
    pub(crate) fn tokenizer_json() -> String {
        let vocab = WORDS
            .iter()
            .enumerate()
            .map(|(id, word)| format!("{:?}: {}", word, id))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"{{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [
    {{"id": 0, "content": "<|endoftext|>", "single_word": false, "lstrip": false,
      "rstrip": false, "normalized": false, "special": true}}
  ],
  "normalizer": null,
  "pre_tokenizer": {{"type": "Whitespace"}},
  "post_processor": null,
  "decoder": null,
  "model": {{"type": "WordLevel", "vocab": {{{}}}, "unk_token": "[UNK]"}}
}}"#,
            vocab
        )
    }

    pub(crate) fn write_tokenizer(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, tokenizer_json()).unwrap();
        path
    }

    #[test]
    fn test_basic_tokenization() -> Result<()> {
        let dir = TempDir::new()?;
        let tokenizer = ChatTokenizer::from_file(write_tokenizer(&dir), 2048)?;

        let tokens = tokenizer.encode("I feel anxious")?;
        assert_eq!(tokens, vec![6, 7, 8]);

        let decoded = tokenizer.decode(&tokens)?;
        assert_eq!(decoded, "I feel anxious");
        assert_eq!(tokenizer.vocab_size(), WORDS.len());

        Ok(())
    }

    #[test]
    fn test_truncation() -> Result<()> {
        let dir = TempDir::new()?;
        let tokenizer = ChatTokenizer::from_file(write_tokenizer(&dir), 2)?;

        let tokens = tokenizer.encode("I feel anxious")?;
        assert_eq!(tokens, vec![6, 7]);
        assert_eq!(tokenizer.max_length(), 2);

        Ok(())
    }

    #[test]
    fn test_special_tokens() -> Result<()> {
        let dir = TempDir::new()?;
        let tokenizer = ChatTokenizer::from_file(write_tokenizer(&dir), 2048)?;

        assert_eq!(tokenizer.eos_token_ids(), &[0]);
        assert_eq!(tokenizer.decode(&[9, 10, 11, 0])?, "Try slow breathing");

        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = ChatTokenizer::from_file("/nonexistent/tokenizer.json", 2048);
        assert!(matches!(result, Err(ServiceError::InitializationError { .. })));
    }
}
