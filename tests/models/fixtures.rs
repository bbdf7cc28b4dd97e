// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Local HTTP server standing in for the model hub

use axum::{extract::State, http::StatusCode, routing::get, Router};
use local_rag_chat::models::{DownloadConfig, ModelDownloader, ModelSource, RetryPolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MODEL_BYTES: &[u8] = b"GGUF\x03\x00\x00\x00 fake quantised weights";

#[derive(Clone, Default)]
pub struct Hits {
    pub model: Arc<AtomicUsize>,
    pub flaky: Arc<AtomicUsize>,
    pub broken: Arc<AtomicUsize>,
    pub missing: Arc<AtomicUsize>,
}

impl Hits {
    pub fn total(&self) -> usize {
        self.model.load(Ordering::SeqCst)
            + self.flaky.load(Ordering::SeqCst)
            + self.broken.load(Ordering::SeqCst)
            + self.missing.load(Ordering::SeqCst)
    }
}

async fn model(State(hits): State<Hits>) -> &'static [u8] {
    hits.model.fetch_add(1, Ordering::SeqCst);
    MODEL_BYTES
}

/// 503 twice, then the model
async fn flaky(State(hits): State<Hits>) -> Result<&'static [u8], StatusCode> {
    if hits.flaky.fetch_add(1, Ordering::SeqCst) < 2 {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(MODEL_BYTES)
    }
}

async fn broken(State(hits): State<Hits>) -> StatusCode {
    hits.broken.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn missing(State(hits): State<Hits>) -> StatusCode {
    hits.missing.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

pub struct TestServer {
    pub base_url: String,
    pub hits: Hits,
}

impl TestServer {
    pub async fn start() -> Self {
        let hits = Hits::default();
        let app = Router::new()
            .route("/model.gguf", get(model))
            .route("/flaky.gguf", get(flaky))
            .route("/broken.gguf", get(broken))
            .route("/missing.gguf", get(missing))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
        }
    }

    pub fn source(&self, path: &str) -> ModelSource {
        ModelSource::Http {
            url: format!("{}/{}", self.base_url, path),
        }
    }
}

/// Downloader with millisecond backoff and no progress bar
pub fn fast_downloader() -> ModelDownloader {
    ModelDownloader::new(DownloadConfig {
        connect_timeout_secs: 5,
        retry_policy: RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            exponential_base: 2.0,
        },
        show_progress: false,
    })
    .unwrap()
}
