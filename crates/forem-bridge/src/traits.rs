// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the collaborators around the bridge.
//
// The bridge never touches a browser engine, UIKit or the network directly:
// the rendering surface, the host UI, native capabilities and the network
// transport are injected through these traits.

use async_trait::async_trait;
use forem_core::error::Result;
use forem_core::types::{DeviceRegistration, HapticStyle, MediaKind, UserSession};
use serde_json::Value;
use url::Url;

use crate::media::VideoPresentation;
use crate::preview::CachedState;

/// The browser surface rendering the hosted Forem page.
#[async_trait]
pub trait RenderingSurface: Send + Sync {
    /// Evaluate `script` in the page and return its JSON result (`None` for
    /// `undefined`/`null`).
    async fn evaluate_script(&self, script: String) -> Result<Option<Value>>;

    /// Evaluate `script` without waiting for a result. Errors are the
    /// surface's to log.
    fn run_script(&self, script: String);

    /// Start loading `url` in the surface.
    fn load(&self, url: &Url);

    /// Capture an opaque snapshot of the current rendering.
    fn snapshot(&self) -> Option<SnapshotHandle>;
}

/// Receiver of bridge events, typically the view controller hosting the
/// surface. Injected at construction.
pub trait BridgeHost: Send + Sync {
    /// A user logged in, or the logged-in user switched accounts.
    fn on_login(&self, user: &UserSession);

    /// The previously logged-in user logged out.
    fn on_logout(&self, user: &UserSession);

    /// A user-activated link left the instance.
    fn on_external_site(&self, url: &Url);

    /// A `mailto:` link was activated.
    fn on_mailto(&self, url: &Url);

    fn on_navigation_start(&self);

    /// Navigation finished. `resume` carries the cached state handed to
    /// `load_cached`, once, so the presentation layer can restore scroll and
    /// fade out the snapshot.
    fn on_navigation_finish(&self, resume: Option<&CachedState>);

    fn on_navigation_fail(&self);

    /// A native video player is about to be presented.
    fn will_start_native_video(&self, presentation: &VideoPresentation);
}

/// Unified bridge that groups all native device capabilities.
pub trait NativePlatform:
    NativeMedia + NativeRemoteControl + NativeHaptics + NativeImagePicker + Send + Sync
{
    /// Human-readable platform name (e.g. "iOS 17").
    fn platform_name(&self) -> &str;
}

/// Audio/video playback.
pub trait NativeMedia {
    /// Whether videos are played natively (picture-in-picture capable) rather
    /// than by the web player.
    fn supports_native_video(&self) -> bool;

    /// Make sure the shared audio session is active before podcast playback.
    fn activate_audio_session(&self) -> Result<()>;

    /// Create a new player for `url`. Fails with `StreamLoad` when the stream
    /// cannot be opened.
    fn open_player(&self, kind: MediaKind, url: &Url) -> Result<Box<dyn MediaPlayer>>;
}

/// One player instance, exclusively owned by the media bridge.
///
/// `rate()` is 0.0 while paused; `set_rate` only changes the speed used while
/// playing.
pub trait MediaPlayer: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_rate(&mut self, rate: f32);
    fn rate(&self) -> f32;
    fn set_muted(&mut self, muted: bool);
    fn set_volume(&mut self, volume: f32);
    fn current_time(&self) -> f64;
    /// `None` until the stream's duration is known.
    fn duration(&self) -> Option<f64>;
    fn error(&self) -> Option<String>;
}

/// Lock-screen / media-key integration.
pub trait NativeRemoteControl {
    /// Register play/pause and skip commands. Commands come back to the
    /// bridge as `HostEvent::Remote`.
    fn enable_remote_commands(&self, skip_interval_secs: f64);

    fn disable_remote_commands(&self);

    fn update_now_playing(&self, info: &NowPlayingInfo);

    fn set_artwork(&self, artwork: Artwork);
}

/// Haptic feedback.
pub trait NativeHaptics {
    fn impact(&self, style: HapticStyle);
}

/// Native photo picker.
#[async_trait]
pub trait NativeImagePicker: Send + Sync {
    /// Present the picker (optionally cropping to `aspect_ratio`, width /
    /// height) and return the encoded image, or `None` if the user cancelled.
    async fn pick_image(&self, aspect_ratio: Option<f64>) -> Result<Option<Vec<u8>>>;
}

/// Network operations performed on behalf of the bridge.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Multipart upload of an image to the instance.
    async fn upload_image(&self, request: UploadRequest) -> Result<UploadOutcome>;

    /// Download podcast artwork.
    async fn fetch_artwork(&self, url: &Url) -> Result<FetchedArtwork>;

    /// POST a push device registration with the CSRF header.
    async fn register_device(
        &self,
        endpoint: &Url,
        csrf_token: &str,
        registration: &DeviceRegistration,
    ) -> Result<()>;

    /// DELETE a push device registration.
    async fn unregister_device(
        &self,
        endpoint: &Url,
        registration: &DeviceRegistration,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Data exchanged with collaborators
// ---------------------------------------------------------------------------

/// Opaque handle to a rendered snapshot owned by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHandle(pub u64);

/// Now-playing metadata published to the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub duration: f64,
    pub elapsed: f64,
}

/// Artwork shown on the now-playing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artwork {
    Image {
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    },
    /// The bundled application icon.
    DefaultIcon,
}

/// Raw artwork response.
#[derive(Debug, Clone)]
pub struct FetchedArtwork {
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Multipart image upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: Url,
    pub csrf_token: String,
    pub file_name: String,
    pub jpeg: Vec<u8>,
}

/// Result of an upload that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// First link returned by the server, possibly relative.
    Link(String),
    /// Server rejected the upload, with its error message if any.
    Rejected(Option<String>),
}
