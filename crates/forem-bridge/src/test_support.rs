// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use forem_core::error::{BridgeError, Result};
use forem_core::types::{DeviceRegistration, HapticStyle, MediaKind, UserSession};
use serde_json::Value;
use url::Url;

use crate::media::VideoPresentation;
use crate::preview::CachedState;
use crate::scripts;
use crate::traits::*;

// ---------------------------------------------------------------------------
// Rendering surface
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSurface {
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashSet<String>>,
    evaluations: Mutex<Vec<String>>,
    scripts: Mutex<Vec<String>>,
    loads: Mutex<Vec<Url>>,
    snapshots: AtomicU64,
}

impl FakeSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer evaluations of `script` (as wrapped by the bridge) with `value`.
    pub fn respond(&self, script: &str, value: Value) {
        let key = scripts::wrapped(script);
        self.failures.lock().unwrap().remove(&key);
        self.responses.lock().unwrap().insert(key, value);
    }

    pub fn fail(&self, script: &str) {
        self.failures.lock().unwrap().insert(scripts::wrapped(script));
    }

    pub fn evaluation_count(&self, script: &str) -> usize {
        let key = scripts::wrapped(script);
        self.evaluations
            .lock()
            .unwrap()
            .iter()
            .filter(|evaluated| **evaluated == key)
            .count()
    }

    /// Fire-and-forget scripts run so far.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<Url> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderingSurface for FakeSurface {
    async fn evaluate_script(&self, script: String) -> Result<Option<Value>> {
        self.evaluations.lock().unwrap().push(script.clone());
        if self.failures.lock().unwrap().contains(&script) {
            return Err(BridgeError::ScriptEvaluation("ReferenceError".into()));
        }
        Ok(self.responses.lock().unwrap().get(&script).cloned())
    }

    fn run_script(&self, script: String) {
        self.scripts.lock().unwrap().push(script);
    }

    fn load(&self, url: &Url) {
        self.loads.lock().unwrap().push(url.clone());
    }

    fn snapshot(&self) -> Option<SnapshotHandle> {
        Some(SnapshotHandle(self.snapshots.fetch_add(1, Ordering::SeqCst)))
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Login(i64),
    Logout(i64),
    ExternalSite(String),
    Mailto(String),
    NavigationStart,
    NavigationFinish(Option<CachedState>),
    NavigationFail,
    NativeVideo(String),
}

#[derive(Default)]
pub struct FakeHost {
    calls: Mutex<Vec<HostCall>>,
    presentations: Mutex<Vec<VideoPresentation>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn presentations(&self) -> Vec<VideoPresentation> {
        self.presentations.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl BridgeHost for FakeHost {
    fn on_login(&self, user: &UserSession) {
        self.record(HostCall::Login(user.user_id));
    }

    fn on_logout(&self, user: &UserSession) {
        self.record(HostCall::Logout(user.user_id));
    }

    fn on_external_site(&self, url: &Url) {
        self.record(HostCall::ExternalSite(url.to_string()));
    }

    fn on_mailto(&self, url: &Url) {
        self.record(HostCall::Mailto(url.to_string()));
    }

    fn on_navigation_start(&self) {
        self.record(HostCall::NavigationStart);
    }

    fn on_navigation_finish(&self, resume: Option<&CachedState>) {
        self.record(HostCall::NavigationFinish(resume.cloned()));
    }

    fn on_navigation_fail(&self) {
        self.record(HostCall::NavigationFail);
    }

    fn will_start_native_video(&self, presentation: &VideoPresentation) {
        self.record(HostCall::NativeVideo(presentation.url().to_string()));
        self.presentations.lock().unwrap().push(presentation.clone());
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Observable state of one fake player.
#[derive(Debug)]
pub struct PlayerState {
    pub kind: MediaKind,
    pub url: Url,
    pub playing: bool,
    pub speed: f32,
    pub position: f64,
    pub duration: Option<f64>,
    pub muted: bool,
    pub volume: f32,
    pub error: Option<String>,
    pub calls: Vec<String>,
}

struct FakePlayer(Arc<Mutex<PlayerState>>);

impl FakePlayer {
    fn with<R>(&self, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

impl MediaPlayer for FakePlayer {
    fn play(&mut self) {
        self.with(|p| {
            p.playing = true;
            p.calls.push("play".into());
        });
    }

    fn pause(&mut self) {
        self.with(|p| {
            p.playing = false;
            p.calls.push("pause".into());
        });
    }

    fn seek(&mut self, seconds: f64) {
        self.with(|p| {
            p.position = seconds;
            p.calls.push(format!("seek {seconds}"));
        });
    }

    fn set_rate(&mut self, rate: f32) {
        self.with(|p| {
            p.speed = rate;
            p.calls.push(format!("rate {rate}"));
        });
    }

    fn rate(&self) -> f32 {
        self.with(|p| if p.playing { p.speed } else { 0.0 })
    }

    fn set_muted(&mut self, muted: bool) {
        self.with(|p| {
            p.muted = muted;
            p.calls.push(format!("muted {muted}"));
        });
    }

    fn set_volume(&mut self, volume: f32) {
        self.with(|p| {
            p.volume = volume;
            p.calls.push(format!("volume {volume}"));
        });
    }

    fn current_time(&self) -> f64 {
        self.with(|p| p.position)
    }

    fn duration(&self) -> Option<f64> {
        self.with(|p| p.duration)
    }

    fn error(&self) -> Option<String> {
        self.with(|p| p.error.clone())
    }
}

pub struct FakePlatform {
    native_video: bool,
    players: Mutex<Vec<Arc<Mutex<PlayerState>>>>,
    failing_streams: Mutex<HashSet<String>>,
    remote_enabled: AtomicBool,
    remote_enables: AtomicUsize,
    now_playing: Mutex<Vec<NowPlayingInfo>>,
    artwork: Mutex<Vec<Artwork>>,
    haptics: Mutex<Vec<HapticStyle>>,
    picked: Mutex<Option<Vec<u8>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            native_video: true,
            players: Mutex::new(Vec::new()),
            failing_streams: Mutex::new(HashSet::new()),
            remote_enabled: AtomicBool::new(false),
            remote_enables: AtomicUsize::new(0),
            now_playing: Mutex::new(Vec::new()),
            artwork: Mutex::new(Vec::new()),
            haptics: Mutex::new(Vec::new()),
            picked: Mutex::new(None),
        }
    }

    pub fn without_native_video() -> Self {
        Self {
            native_video: false,
            ..Self::new()
        }
    }

    /// The `index`-th player opened.
    pub fn player(&self, index: usize) -> Arc<Mutex<PlayerState>> {
        Arc::clone(&self.players.lock().unwrap()[index])
    }

    pub fn player_count(&self) -> usize {
        self.players.lock().unwrap().len()
    }

    pub fn fail_stream(&self, url: &str) {
        self.failing_streams.lock().unwrap().insert(url.to_string());
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote_enabled.load(Ordering::SeqCst)
    }

    pub fn remote_enable_count(&self) -> usize {
        self.remote_enables.load(Ordering::SeqCst)
    }

    pub fn now_playing(&self) -> Vec<NowPlayingInfo> {
        self.now_playing.lock().unwrap().clone()
    }

    pub fn artwork(&self) -> Vec<Artwork> {
        self.artwork.lock().unwrap().clone()
    }

    pub fn haptics(&self) -> Vec<HapticStyle> {
        self.haptics.lock().unwrap().clone()
    }

    /// Next picker result; `None` simulates a cancelled picker.
    pub fn set_picked(&self, bytes: Option<Vec<u8>>) {
        *self.picked.lock().unwrap() = bytes;
    }
}

impl NativePlatform for FakePlatform {
    fn platform_name(&self) -> &str {
        "fake"
    }
}

impl NativeMedia for FakePlatform {
    fn supports_native_video(&self) -> bool {
        self.native_video
    }

    fn activate_audio_session(&self) -> Result<()> {
        Ok(())
    }

    fn open_player(&self, kind: MediaKind, url: &Url) -> Result<Box<dyn MediaPlayer>> {
        if self.failing_streams.lock().unwrap().contains(url.as_str()) {
            return Err(BridgeError::StreamLoad(url.to_string()));
        }
        let state = Arc::new(Mutex::new(PlayerState {
            kind,
            url: url.clone(),
            playing: false,
            speed: 1.0,
            position: 0.0,
            duration: None,
            muted: false,
            volume: 1.0,
            error: None,
            calls: Vec::new(),
        }));
        self.players.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(FakePlayer(state)))
    }
}

impl NativeRemoteControl for FakePlatform {
    fn enable_remote_commands(&self, _skip_interval_secs: f64) {
        self.remote_enabled.store(true, Ordering::SeqCst);
        self.remote_enables.fetch_add(1, Ordering::SeqCst);
    }

    fn disable_remote_commands(&self) {
        self.remote_enabled.store(false, Ordering::SeqCst);
    }

    fn update_now_playing(&self, info: &NowPlayingInfo) {
        self.now_playing.lock().unwrap().push(info.clone());
    }

    fn set_artwork(&self, artwork: Artwork) {
        self.artwork.lock().unwrap().push(artwork);
    }
}

impl NativeHaptics for FakePlatform {
    fn impact(&self, style: HapticStyle) {
        self.haptics.lock().unwrap().push(style);
    }
}

#[async_trait]
impl NativeImagePicker for FakePlatform {
    async fn pick_image(&self, _aspect_ratio: Option<f64>) -> Result<Option<Vec<u8>>> {
        Ok(self.picked.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTransport {
    upload_results: Mutex<VecDeque<Result<UploadOutcome>>>,
    uploads: Mutex<Vec<UploadRequest>>,
    artwork: Mutex<Option<FetchedArtwork>>,
    artwork_fetches: Mutex<Vec<Url>>,
    registration_failures: AtomicUsize,
    registrations: Mutex<Vec<(Url, String, DeviceRegistration)>>,
    unregistrations: Mutex<Vec<Url>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_upload(&self, result: Result<UploadOutcome>) {
        self.upload_results.lock().unwrap().push_back(result);
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn set_artwork(&self, artwork: FetchedArtwork) {
        *self.artwork.lock().unwrap() = Some(artwork);
    }

    pub fn artwork_fetches(&self) -> Vec<Url> {
        self.artwork_fetches.lock().unwrap().clone()
    }

    /// Fail the next `count` registration attempts.
    pub fn fail_registrations(&self, count: usize) {
        self.registration_failures.store(count, Ordering::SeqCst);
    }

    pub fn registrations(&self) -> Vec<(Url, String, DeviceRegistration)> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn unregistrations(&self) -> Vec<Url> {
        self.unregistrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkTransport for FakeTransport {
    async fn upload_image(&self, request: UploadRequest) -> Result<UploadOutcome> {
        self.uploads.lock().unwrap().push(request);
        self.upload_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(UploadOutcome::Link("/i/uploaded.jpeg".into())))
    }

    async fn fetch_artwork(&self, url: &Url) -> Result<FetchedArtwork> {
        self.artwork_fetches.lock().unwrap().push(url.clone());
        self.artwork
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BridgeError::Artwork("404".into()))
    }

    async fn register_device(
        &self,
        endpoint: &Url,
        csrf_token: &str,
        registration: &DeviceRegistration,
    ) -> Result<()> {
        self.registrations.lock().unwrap().push((
            endpoint.clone(),
            csrf_token.to_string(),
            registration.clone(),
        ));
        let remaining = self.registration_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.registration_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BridgeError::Registration("422 invalid authenticity".into()));
        }
        Ok(())
    }

    async fn unregister_device(
        &self,
        endpoint: &Url,
        _registration: &DeviceRegistration,
    ) -> Result<()> {
        self.unregistrations.lock().unwrap().push(endpoint.clone());
        Ok(())
    }
}
