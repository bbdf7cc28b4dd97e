// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Local text generation with llama.cpp
pub mod engine;

pub use engine::{
    answer_budget, EngineConfig, EngineMetrics, FinishReason, Generation, GenerationParams, InferenceError,
    LlmEngine, TextGenerator,
};

#[cfg(test)]
pub use engine::MockTextGenerator;
