// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Plain-text document loading from a local folder

pub mod loader;

pub use loader::{load_documents, Document, LoadError};
