// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use async_trait::async_trait;
use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel, Special},
    sampling::LlamaSampler,
    send_logs_to_tracing, LogOptions,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sanitize prompt text for tokenization
///
/// Removes characters that break C string handling in llama.cpp:
/// - Null bytes (\0), the C string terminator
/// - Other C0 control characters except tab, newline and carriage return
///
/// Document text can carry these when files were converted from binary
/// formats.
fn sanitize_prompt_for_tokenizer(prompt: &str) -> String {
    prompt
        .chars()
        .filter(|c| *c != '\0' && (*c >= ' ' || *c == '\t' || *c == '\n' || *c == '\r'))
        .collect()
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Failed to initialize llama.cpp backend: {0}")]
    BackendInit(String),
    #[error("Failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Prompt is empty after sanitizing")]
    EmptyPrompt,
    #[error("Prompt needs {prompt_tokens} tokens but the context holds {context_size}")]
    ContextOverflow {
        prompt_tokens: usize,
        context_size: usize,
    },
    #[error("Failed to tokenize prompt: {0}")]
    Tokenize(String),
    #[error("Failed to create context: {0}")]
    Context(String),
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Sampling settings for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    /// 0 selects greedy decoding
    pub temperature: f32,
    pub top_p: f32,
    /// 0 keeps every candidate
    pub top_k: i32,
    pub min_p: f32,
    /// 1.0 disables the penalty
    pub repeat_penalty: f32,
    /// How many recent tokens the repeat penalty looks at
    pub repeat_last_n: i32,
    /// Fixed RNG seed; a fresh random seed per call when `None`
    pub seed: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            min_p: 0.05,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            seed: None,
        }
    }
}

/// Tokens left for the answer once the prompt is in the context
///
/// The answer is cut short rather than refused when `max_tokens` does not
/// fit; only a prompt that fills the whole context is an error.
pub fn answer_budget(
    prompt_tokens: usize,
    max_tokens: usize,
    context_size: usize,
) -> Result<usize, InferenceError> {
    if prompt_tokens >= context_size {
        return Err(InferenceError::ContextOverflow {
            prompt_tokens,
            context_size,
        });
    }
    Ok(max_tokens.min(context_size - prompt_tokens))
}

fn build_sampler(params: &GenerationParams) -> LlamaSampler {
    let penalties = LlamaSampler::penalties(params.repeat_last_n, params.repeat_penalty, 0.0, 0.0);
    if params.temperature <= 0.0 {
        return LlamaSampler::chain_simple([penalties, LlamaSampler::greedy()]);
    }
    LlamaSampler::chain_simple([
        penalties,
        LlamaSampler::top_k(params.top_k),
        LlamaSampler::top_p(params.top_p, 1),
        LlamaSampler::min_p(params.min_p, 1),
        LlamaSampler::temp(params.temperature),
        LlamaSampler::dist(params.seed.unwrap_or_else(rand::random)),
    ])
}

/// Anything that turns a prompt into text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub context_size: usize,
    pub gpu_layers: u32,
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf"),
            context_size: 1024,
            gpu_layers: 0,
            batch_size: std::env::var("LLAMA_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model emitted its end-of-sequence token
    Eos,
    /// `max_tokens` was reached
    Length,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub prompt_tokens: usize,
    pub tokens_generated: usize,
    pub finish_reason: FinishReason,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    pub total_inferences: usize,
    pub total_tokens_generated: usize,
    pub total_inference_time: Duration,
}

impl EngineMetrics {
    pub fn average_tokens_per_second(&self) -> f32 {
        let secs = self.total_inference_time.as_secs_f32();
        if secs > 0.0 {
            self.total_tokens_generated as f32 / secs
        } else {
            0.0
        }
    }
}

/// A single GGUF model held in memory
///
/// `LlamaBackend` can only be initialised once per process, so only one
/// engine may exist at a time.
pub struct LlmEngine {
    config: EngineConfig,
    backend: LlamaBackend,
    model: LlamaModel,
    metrics: Mutex<EngineMetrics>,
}

impl std::fmt::Debug for LlmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LlmEngine {
    pub fn load(config: EngineConfig) -> Result<Self, InferenceError> {
        if !config.model_path.is_file() {
            return Err(InferenceError::ModelLoad {
                path: config.model_path.clone(),
                reason: "file not found".to_string(),
            });
        }

        // llama.cpp prints its load report through the tracing filter
        send_logs_to_tracing(LogOptions::default());
        let backend =
            LlamaBackend::init().map_err(|e| InferenceError::BackendInit(e.to_string()))?;

        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);
        let model = LlamaModel::load_from_file(&backend, &config.model_path, &model_params)
            .map_err(|e| InferenceError::ModelLoad {
                path: config.model_path.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "Loaded {} (context {} tokens, {} GPU layers)",
            config.model_path.display(),
            config.context_size,
            config.gpu_layers
        );

        Ok(Self {
            config,
            backend,
            model,
            metrics: Mutex::new(EngineMetrics::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> EngineMetrics {
        self.metrics
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Number of tokens the model sees for `text`, BOS included
    pub fn count_tokens(&self, text: &str) -> Result<usize, InferenceError> {
        self.model
            .str_to_token(&sanitize_prompt_for_tokenizer(text), AddBos::Always)
            .map(|tokens| tokens.len())
            .map_err(|e| InferenceError::Tokenize(e.to_string()))
    }

    /// Run a full generation on the calling thread
    pub fn generate_blocking(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, InferenceError> {
        let start_time = Instant::now();

        let sanitized = sanitize_prompt_for_tokenizer(prompt);
        if sanitized.len() != prompt.len() {
            warn!(
                "Sanitized prompt: removed {} problematic bytes",
                prompt.len() - sanitized.len()
            );
        }

        let prompt_tokens = self
            .model
            .str_to_token(&sanitized, AddBos::Always)
            .map_err(|e| InferenceError::Tokenize(e.to_string()))?;
        if prompt_tokens.is_empty() {
            return Err(InferenceError::EmptyPrompt);
        }

        let context_size = self.config.context_size;
        let max_tokens = answer_budget(prompt_tokens.len(), params.max_tokens, context_size)?;
        if max_tokens < params.max_tokens {
            debug!(
                "Prompt has {} tokens; answer limited to {} tokens",
                prompt_tokens.len(),
                max_tokens
            );
        }

        // The whole prompt is decoded in one batch
        let n_batch = self.config.batch_size.max(prompt_tokens.len());
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(context_size as u32))
            .with_n_batch(n_batch as u32);
        let mut context = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| InferenceError::Context(e.to_string()))?;

        let mut batch = LlamaBatch::new(n_batch, 1);
        let last_index = prompt_tokens.len() - 1;
        for (i, &token) in prompt_tokens.iter().enumerate() {
            batch
                .add(token, i as i32, &[0], i == last_index)
                .map_err(|e| InferenceError::Decode(e.to_string()))?;
        }
        context
            .decode(&mut batch)
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        let mut sampler = build_sampler(params);

        let eos_token = self.model.token_eos();
        // Bytes, not strings: one character can span several tokens
        let mut output_bytes: Vec<u8> = Vec::new();
        let mut n_cur = prompt_tokens.len();
        let mut tokens_generated = 0usize;

        let finish_reason = loop {
            if tokens_generated >= max_tokens {
                break FinishReason::Length;
            }

            // Sampling also records the token for the repeat penalty
            let token = sampler.sample(&context, -1);
            if token == eos_token {
                break FinishReason::Eos;
            }

            match self.model.token_to_bytes(token, Special::Plaintext) {
                Ok(bytes) => output_bytes.extend_from_slice(&bytes),
                Err(e) => debug!("Skipping undecodable token {}: {}", token, e),
            }

            // Always advance model state, even for tokens we could not render
            batch.clear();
            batch
                .add(token, n_cur as i32, &[0], true)
                .map_err(|e| InferenceError::Decode(e.to_string()))?;
            context
                .decode(&mut batch)
                .map_err(|e| InferenceError::Decode(e.to_string()))?;

            n_cur += 1;
            tokens_generated += 1;
        };

        let elapsed = start_time.elapsed();
        let text = String::from_utf8_lossy(&output_bytes).into_owned();

        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.total_inferences += 1;
            metrics.total_tokens_generated += tokens_generated;
            metrics.total_inference_time += elapsed;
        }

        debug!(
            prompt_tokens = prompt_tokens.len(),
            tokens_generated,
            ?finish_reason,
            elapsed_ms = elapsed.as_millis() as u64,
            "Generation finished"
        );

        Ok(Generation {
            text,
            prompt_tokens: prompt_tokens.len(),
            tokens_generated,
            finish_reason,
            elapsed,
        })
    }
}

#[async_trait]
impl TextGenerator for LlmEngine {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        // llama.cpp contexts are not Send; generation stays on this thread
        Ok(self.generate_blocking(prompt, params)?.text)
    }
}
