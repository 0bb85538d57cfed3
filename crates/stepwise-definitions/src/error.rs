// Copyright (c) 2025 Stepwise Orchestrator Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the Workflow Definition Service (§4.1, §7).

use thiserror::Error;

/// Errors surfaced by a [`crate::DefinitionService`] implementation.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// The named workflow directory, its `index.md`, or a referenced step
    /// file does not exist.
    #[error("workflow definition not found: {0}")]
    NotFound(String),

    /// The index step list is malformed (no list, no links, duplicate IDs),
    /// a step file is missing a mandatory header, or an include failed.
    #[error("workflow definition parsing error: {0}")]
    ParsingError(String),

    /// An `{{file:...}}` include chain exceeded the maximum recursion depth.
    #[error("include depth exceeded (max {max}); chain: {chain}")]
    IncludeDepthExceeded { max: u32, chain: String },

    /// An `{{file:...}}` include chain referenced a path already on the stack.
    #[error("circular include detected; chain: {chain}")]
    CircularInclude { chain: String },

    /// An `{{file:...}}` include target could not be read.
    #[error("include not found: '{target}' requested from '{from}'")]
    IncludeNotFound { from: String, target: String },

    /// An I/O failure unrelated to a missing file (permissions, etc.).
    #[error("io error reading workflow definitions: {0}")]
    Io(String),
}

/// Result type for Definition Service operations.
pub type DefinitionResult<T> = Result<T, DefinitionError>;
