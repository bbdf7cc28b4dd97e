// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Model artifact management: locate the GGUF on disk or fetch it once

pub mod downloading;

pub use downloading::{
    ensure_model, part_path, DownloadConfig, DownloadError, DownloadResult, EnsureOutcome,
    ModelDownloader, ModelSource, RetryPolicy,
};
