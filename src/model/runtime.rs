// Location: src/model/runtime.rs

use std::time::{Duration, Instant};

use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::llama::{Cache, Config, Llama, LlamaEosToks};
use tracing::debug;

use crate::{
    config::GenerationConfig,
    error::{Result, ServiceError},
    model::{ChatTokenizer, TextGenerator},
    types::GenerationParams,
};

/// Sampling settings fixed by the service rather than the caller
#[derive(Debug, Clone)]
pub struct SamplingSettings {
    pub top_p: f64,
    pub repetition_penalty: f32,
    /// First seed of the sampling sequence; random when unset
    pub seed: Option<u64>,
}

impl From<&GenerationConfig> for SamplingSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            top_p: config.top_p,
            repetition_penalty: config.repetition_penalty,
            seed: config.seed,
        }
    }
}

pub struct ModelRuntime {
    model: Llama,
    config: Config,
    tokenizer: ChatTokenizer,
    device: Device,
    dtype: DType,
    sampling: SamplingSettings,
    eos_token_ids: Vec<u32>,
    next_seed: u64,
    stats: RuntimeStats,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    pub total_processed: usize,
    pub total_tokens_generated: usize,
    pub last_processing_time: Option<Duration>,
}

impl ModelRuntime {
    pub fn new(
        model: Llama,
        config: Config,
        tokenizer: ChatTokenizer,
        device: Device,
        dtype: DType,
        sampling: SamplingSettings,
    ) -> Self {
        let mut eos_token_ids = tokenizer.eos_token_ids().to_vec();
        if let Some(eos) = &config.eos_token_id {
            match eos {
                LlamaEosToks::Single(id) => eos_token_ids.push(*id),
                LlamaEosToks::Multiple(ids) => eos_token_ids.extend(ids.iter().copied()),
            }
        }
        eos_token_ids.sort_unstable();
        eos_token_ids.dedup();
        let next_seed = sampling.seed.unwrap_or_else(rand::random);

        Self {
            model,
            config,
            tokenizer,
            device,
            dtype,
            sampling,
            eos_token_ids,
            next_seed,
            stats: RuntimeStats::default(),
        }
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// A processor for one request. Each call consumes a fresh seed, so repeated
    /// prompts do not replay the same sample.
    fn logits_processor(&mut self, temperature: f64) -> Result<LogitsProcessor> {
        if !temperature.is_finite() || temperature <= 0.0 {
            return Err(ServiceError::processing(format!(
                "`temperature` has to be a strictly positive float, but is {}",
                temperature
            )));
        }

        let seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(1);

        Ok(LogitsProcessor::from_sampling(
            seed,
            Sampling::TopP {
                p: self.sampling.top_p,
                temperature,
            },
        ))
    }

    /// Penalize every token already in the sequence, prompt included.
    fn penalize_repeats(&self, logits: Tensor, tokens: &[u32]) -> Result<Tensor> {
        if self.sampling.repetition_penalty == 1.0 {
            return Ok(logits);
        }
        Ok(candle_transformers::utils::apply_repeat_penalty(
            &logits,
            self.sampling.repetition_penalty,
            tokens,
        )?)
    }

    fn is_eos(&self, token: u32) -> bool {
        self.eos_token_ids.contains(&token)
    }
}

impl TextGenerator for ModelRuntime {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<Vec<u32>> {
        let start_time = Instant::now();
        let mut logits_processor = self.logits_processor(params.temperature)?;

        let mut tokens = self.tokenizer.encode(prompt)?;
        if tokens.is_empty() {
            return Err(ServiceError::processing("Prompt is empty after tokenization"));
        }
        let prompt_len = tokens.len();

        // Fresh KV cache per request; nothing carries over between conversations
        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)?;
        let mut index_pos = 0;

        for index in 0..params.max_new_tokens {
            let context_size = if index > 0 { 1 } else { tokens.len() };
            let context = &tokens[tokens.len() - context_size..];
            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;

            let logits = self.model.forward(&input, index_pos, &mut cache)?;
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            index_pos += context.len();

            let logits = self.penalize_repeats(logits, &tokens)?;

            let next_token = logits_processor.sample(&logits)?;
            tokens.push(next_token);

            if self.is_eos(next_token) {
                break;
            }
        }

        let generated = tokens.len() - prompt_len;
        let processing_time = start_time.elapsed();
        self.stats.total_processed += 1;
        self.stats.total_tokens_generated += generated;
        self.stats.last_processing_time = Some(processing_time);

        debug!(
            prompt_tokens = prompt_len,
            generated_tokens = generated,
            elapsed_ms = processing_time.as_millis() as u64,
            total_processed = self.stats.total_processed,
            total_generated = self.stats.total_tokens_generated,
            "Generation finished"
        );

        Ok(tokens)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer.decode(tokens)
    }

    fn uses_gpu(&self) -> bool {
        self.device.is_cuda()
    }
}
