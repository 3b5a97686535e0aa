// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Podcast artwork validation.

use forem_core::error::{BridgeError, Result};
use forem_image::ImageProcessor;
use tracing::{debug, warn};
use url::Url;

use crate::traits::{Artwork, FetchedArtwork};

/// Resolve a possibly relative artwork URL against the instance root.
pub fn artwork_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base.and_then(|base| base.join(raw).ok()),
        Err(_) => None,
    }
}

/// Validate a fetched image: the MIME type must be `image/*` and the bytes
/// must decode.
pub fn decode_artwork(fetched: FetchedArtwork) -> Result<Artwork> {
    let mime = fetched.mime_type.as_deref().unwrap_or_default();
    if !mime.starts_with("image/") {
        return Err(BridgeError::Artwork(format!("not an image: '{mime}'")));
    }
    let (width, height) = ImageProcessor::from_bytes(&fetched.bytes)?.dimensions();
    debug!(width, height, mime, "podcast artwork decoded");
    Ok(Artwork::Image {
        bytes: fetched.bytes,
        width,
        height,
    })
}

/// The artwork to show for a fetch result; the bundled icon on any failure.
pub fn artwork_or_default(fetched: Result<FetchedArtwork>) -> Artwork {
    match fetched.and_then(decode_artwork) {
        Ok(artwork) => artwork,
        Err(e) => {
            warn!(error = %e, "podcast artwork unavailable, using default icon");
            Artwork::DefaultIcon
        }
    }
}
