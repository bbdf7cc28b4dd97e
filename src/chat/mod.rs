// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Interactive question loop

pub mod repl;

pub use repl::{is_exit_command, ChatLoop, ChatSummary, ExitReason, QuestionAnswerer, EXIT_COMMANDS};

#[cfg(test)]
pub use repl::MockQuestionAnswerer;
