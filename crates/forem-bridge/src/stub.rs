// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub platform for desktop/CI builds where native mobile APIs are unavailable.
//
// Capabilities that return data report `PlatformUnavailable`; fire-and-forget
// capabilities log and do nothing.

use async_trait::async_trait;
use forem_core::error::{BridgeError, Result};
use forem_core::types::{DeviceRegistration, HapticStyle, MediaKind};
use url::Url;

use crate::traits::*;

/// No-op platform returned on non-mobile targets.
pub struct StubPlatform;

impl NativePlatform for StubPlatform {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl NativeMedia for StubPlatform {
    fn supports_native_video(&self) -> bool {
        false
    }

    fn activate_audio_session(&self) -> Result<()> {
        Err(BridgeError::PlatformUnavailable)
    }

    fn open_player(&self, _kind: MediaKind, _url: &Url) -> Result<Box<dyn MediaPlayer>> {
        tracing::warn!("NativeMedia::open_player called on stub platform");
        Err(BridgeError::PlatformUnavailable)
    }
}

impl NativeRemoteControl for StubPlatform {
    fn enable_remote_commands(&self, _skip_interval_secs: f64) {
        tracing::debug!("NativeRemoteControl::enable_remote_commands ignored on stub platform");
    }

    fn disable_remote_commands(&self) {}

    fn update_now_playing(&self, _info: &NowPlayingInfo) {}

    fn set_artwork(&self, _artwork: Artwork) {}
}

impl NativeHaptics for StubPlatform {
    fn impact(&self, style: HapticStyle) {
        tracing::debug!(?style, "NativeHaptics::impact ignored on stub platform");
    }
}

#[async_trait]
impl NativeImagePicker for StubPlatform {
    async fn pick_image(&self, _aspect_ratio: Option<f64>) -> Result<Option<Vec<u8>>> {
        tracing::warn!("NativeImagePicker::pick_image called on stub platform");
        Err(BridgeError::PlatformUnavailable)
    }
}

/// Transport that refuses every request.
pub struct StubTransport;

#[async_trait]
impl NetworkTransport for StubTransport {
    async fn upload_image(&self, _request: UploadRequest) -> Result<UploadOutcome> {
        tracing::warn!("NetworkTransport::upload_image called on stub transport");
        Err(BridgeError::PlatformUnavailable)
    }

    async fn fetch_artwork(&self, _url: &Url) -> Result<FetchedArtwork> {
        Err(BridgeError::PlatformUnavailable)
    }

    async fn register_device(
        &self,
        _endpoint: &Url,
        _csrf_token: &str,
        _registration: &DeviceRegistration,
    ) -> Result<()> {
        Err(BridgeError::PlatformUnavailable)
    }

    async fn unregister_device(
        &self,
        _endpoint: &Url,
        _registration: &DeviceRegistration,
    ) -> Result<()> {
        Err(BridgeError::PlatformUnavailable)
    }
}
