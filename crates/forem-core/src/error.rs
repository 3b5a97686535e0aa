// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for the Forem bridge.

use thiserror::Error;

/// Top-level error type for all bridge operations.
///
/// None of these are fatal to the host: every failure degrades to an idle,
/// logged-out or no-op state and is reported through logs or host callbacks.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Hosted page queries --
    #[error("script evaluation failed: {0}")]
    ScriptEvaluation(String),

    #[error("instance metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("session fetch failed: {0}")]
    SessionFetch(String),

    #[error("no CSRF token or instance domain available")]
    MissingSession,

    // -- Bridge protocol --
    #[error("malformed bridge message: {0}")]
    Decode(String),

    // -- Media --
    #[error("stream load failed: {0}")]
    StreamLoad(String),

    #[error("artwork unavailable: {0}")]
    Artwork(String),

    // -- Images / uploads --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("upload failed: {0}")]
    Upload(String),

    // -- Push registration --
    #[error("device registration failed: {0}")]
    Registration(String),

    // -- Conversions --
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // -- Platform --
    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
