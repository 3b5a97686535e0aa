// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error text injected back into the hosted page.
//
// The web layer shows these strings next to the element that triggered the
// request, so they stay short and never leak internal detail beyond the
// server's own message.

use crate::error::BridgeError;

/// Fallback text when nothing better is known.
pub const UNEXPECTED_ERROR: &str = "Unexpected error";

/// Diagnostic text for a failed image upload.
pub fn upload_error_message(err: &BridgeError) -> String {
    match err {
        // Server-side rejection: pass its message through verbatim.
        BridgeError::Upload(detail) if !detail.trim().is_empty() => detail.clone(),
        BridgeError::ImageError(_) => "The selected image could not be processed".into(),
        BridgeError::PlatformUnavailable => {
            "Image uploads are not available on this device".into()
        }
        BridgeError::MissingSession
        | BridgeError::Upload(_)
        | BridgeError::ScriptEvaluation(_)
        | BridgeError::MetadataUnavailable(_)
        | BridgeError::SessionFetch(_)
        | BridgeError::Decode(_)
        | BridgeError::StreamLoad(_)
        | BridgeError::Artwork(_)
        | BridgeError::Registration(_)
        | BridgeError::Serialization(_)
        | BridgeError::InvalidUrl(_) => UNEXPECTED_ERROR.into(),
    }
}
