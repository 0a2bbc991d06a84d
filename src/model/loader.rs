use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{Llama, LlamaConfig};
use serde::Deserialize;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};

use super::{ChatTokenizer, ModelRuntime, SamplingSettings};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SINGLE_WEIGHTS_FILE: &str = "model.safetensors";
const SHARDED_INDEX_FILE: &str = "model.safetensors.index.json";

#[derive(Debug, Deserialize)]
struct ShardIndex {
    weight_map: HashMap<String, String>,
}

/// Loads the fine-tuned model directory into a ready-to-run runtime
pub struct ModelLoader {
    config: Arc<ServiceConfig>,
}

impl ModelLoader {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }

    /// Load weights, model config and tokenizer. Blocking; run it off the async runtime.
    pub fn load(&self) -> Result<ModelRuntime> {
        let model_path = &self.config.model.model_path;
        if !model_path.is_dir() {
            return Err(ServiceError::InitializationError {
                message: format!("Model directory not found: {}", model_path.display()),
                source: None,
            });
        }

        let device = select_device()?;
        let dtype = if device.is_cuda() { DType::BF16 } else { DType::F32 };

        let llama_config = read_llama_config(&model_path.join(CONFIG_FILE))?
            .into_config(use_flash_attention());
        let weight_files = resolve_weight_files(model_path)?;

        info!(
            path = %model_path.display(),
            shards = weight_files.len(),
            cuda = device.is_cuda(),
            "Loading model weights"
        );

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weight_files, dtype, &device) }
            .map_err(|e| ServiceError::model("Failed to map model weights", e))?;

        let model = Llama::load(vb, &llama_config)
            .map_err(|e| ServiceError::model("Failed to build model from weights", e))?;

        let tokenizer = ChatTokenizer::from_file(
            model_path.join(TOKENIZER_FILE),
            self.config.model.max_sequence_length,
        )?;

        Ok(ModelRuntime::new(
            model,
            llama_config,
            tokenizer,
            device,
            dtype,
            SamplingSettings::from(&self.config.generation),
        ))
    }
}

/// Flash attention kernels exist only in `flash-attn` builds
fn use_flash_attention() -> bool {
    cfg!(feature = "flash-attn")
}

fn select_device() -> Result<Device> {
    #[cfg(feature = "cuda")]
    {
        Device::cuda_if_available(0)
            .map_err(|e| ServiceError::model("Failed to initialise CUDA device", e))
    }

    #[cfg(not(feature = "cuda"))]
    {
        Ok(Device::Cpu)
    }
}

fn read_llama_config(path: &Path) -> Result<LlamaConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| ServiceError::InitializationError {
        message: format!("Failed to read model config {}", path.display()),
        source: Some(Box::new(e)),
    })?;

    serde_json::from_str(&raw).map_err(|e| ServiceError::InitializationError {
        message: format!("Invalid model config {}", path.display()),
        source: Some(Box::new(e)),
    })
}

/// Weight files for a model directory: a single safetensors file, or every
/// shard named in the sharded index.
fn resolve_weight_files(model_path: &Path) -> Result<Vec<PathBuf>> {
    let index_path = model_path.join(SHARDED_INDEX_FILE);
    if index_path.is_file() {
        let raw = std::fs::read_to_string(&index_path)?;
        let index: ShardIndex =
            serde_json::from_str(&raw).map_err(|e| ServiceError::InitializationError {
                message: format!("Invalid shard index {}", index_path.display()),
                source: Some(Box::new(e)),
            })?;

        let shards: BTreeSet<&String> = index.weight_map.values().collect();
        if shards.is_empty() {
            return Err(ServiceError::InitializationError {
                message: format!("Shard index {} lists no files", index_path.display()),
                source: None,
            });
        }
        return Ok(shards.into_iter().map(|name| model_path.join(name)).collect());
    }

    let single = model_path.join(SINGLE_WEIGHTS_FILE);
    if single.is_file() {
        return Ok(vec![single]);
    }

    Err(ServiceError::InitializationError {
        message: format!("No safetensors weights found in {}", model_path.display()),
        source: None,
    })
}
