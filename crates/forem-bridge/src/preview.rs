// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cached page state for instant resume.

use url::Url;

use crate::traits::SnapshotHandle;

/// Feed pages always resume at the top.
const TOP_RESUMING_PATHS: [&str; 5] = ["/", "/latest", "/top/week", "/top/month", "/top/infinity"];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

/// What the presentation layer needs to show a page before it has loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedState {
    pub url: Url,
    pub snapshot: Option<SnapshotHandle>,
    pub scroll_offset: ScrollOffset,
}

/// Capture the state of `url` with the given scroll position.
pub fn cached_preview(
    url: Url,
    snapshot: Option<SnapshotHandle>,
    scroll_offset: ScrollOffset,
) -> CachedState {
    let scroll_offset = if TOP_RESUMING_PATHS.contains(&url.path()) {
        ScrollOffset::default()
    } else {
        scroll_offset
    };
    CachedState {
        url,
        snapshot,
        scroll_offset,
    }
}
