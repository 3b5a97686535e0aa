// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// forem-image: image handling for the Forem bridge.
//
// Decodes picked photos and fetched artwork, crops to an aspect-ratio hint,
// downsizes to the upload side limit and re-encodes as JPEG.

pub mod processor;

pub use processor::{ImageProcessor, limited_size};
