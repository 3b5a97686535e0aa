// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// forem-bridge: message bridge between a hosted Forem page and the native host.
//
// Inbound page messages are decoded once into typed commands and dispatched to
// the media controllers, the image upload coordinator or haptics. Navigations
// are gated by `NavigationPolicy`, and `<body>` mutations drive login/logout
// detection in `InstanceSession`. Everything runs on the single loop in
// `bridge::ForemBridge`.

pub mod auth;
pub mod bridge;
pub mod codec;
pub mod logging;
pub mod media;
pub mod navigation;
pub mod preview;
pub mod push;
pub mod retry;
pub mod scripts;
pub mod session;
pub mod stub;
pub mod traits;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

pub use auth::{AuthProvider, AuthUrlClassifier};
pub use bridge::{BridgeHandle, ForemBridge, HostEvent};
pub use codec::{InboundMessage, OutboundMessage};
pub use media::{MediaBridge, RemoteCommand, VideoPresentation};
pub use navigation::{NavigationEvent, NavigationPolicy};
pub use preview::{CachedState, ScrollOffset};
pub use session::{InstanceSession, SessionTransition};
pub use traits::{BridgeHost, NativePlatform, NetworkTransport, RenderingSurface};
pub use upload::ImageUploadCoordinator;

/// Native capabilities available on this build.
///
/// Mobile hosts inject their own `NativePlatform`; desktop and CI builds get
/// the stub, which reports `PlatformUnavailable` for everything that returns
/// data.
pub fn platform_bridge() -> Arc<dyn NativePlatform> {
    Arc::new(stub::StubPlatform)
}
