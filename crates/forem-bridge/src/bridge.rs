// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The bridge event loop.
//
// All state (session, media, registration) is owned by `ForemBridge` and only
// touched from its loop. Suspending work runs in spawned tasks that report
// back with a `Completion`; they never touch bridge state themselves.

use std::sync::Arc;
use std::time::Duration;

use forem_core::config::BridgeConfig;
use forem_core::error::{BridgeError, Result};
use forem_core::types::{
    BridgeChannel, InstanceMetadata, NavigationDecision, NavigationRequest, UserSession,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::codec::{ImagePickRequest, InboundMessage, OutboundMessage};
use crate::media::artwork::{artwork_or_default, artwork_url};
use crate::media::{MediaBridge, MediaEffect, MediaSettings, RemoteCommand};
use crate::navigation::{NavigationEvent, NavigationPolicy};
use crate::preview::{CachedState, ScrollOffset, cached_preview};
use crate::push::DeviceRegistrar;
use crate::scripts;
use crate::session::{InstanceSession, SessionSnapshot, SessionTransition};
use crate::traits::{Artwork, BridgeHost, NativePlatform, NetworkTransport, RenderingSurface};
use crate::upload::{ImageUploadCoordinator, UploadContext};

/// Capacity of the host event queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Events delivered by the host application and the rendering surface.
#[derive(Debug)]
pub enum HostEvent {
    /// A raw `{name, body}` message posted by the page.
    ScriptMessage { name: String, body: Value },
    NavigationStarted,
    NavigationFinished,
    NavigationFailed,
    /// The surface asks whether a navigation may proceed.
    DecidePolicy {
        request: NavigationRequest,
        reply: oneshot::Sender<NavigationDecision>,
    },
    /// Load a URL in the surface.
    Load(Url),
    /// Load a previously captured page and resume it on finish.
    LoadCached(CachedState),
    /// Lock-screen / media-key command.
    Remote(RemoteCommand),
    /// Register the device's push token with the instance.
    RegisterDevice { token: String },
    /// Withdraw the push registration of the logged-in user.
    UnregisterDevice,
    Shutdown,
}

/// Results of out-of-line work, applied on the loop.
#[derive(Debug)]
enum Completion {
    Metadata {
        generation: u64,
        result: Result<InstanceMetadata>,
    },
    Session(Result<SessionSnapshot>),
    Inject(OutboundMessage),
    Artwork { generation: u64, artwork: Artwork },
    Registration { job: u64, result: Result<()> },
    Unregistration(Result<()>),
}

/// Sending side used by the host.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    events: mpsc::Sender<HostEvent>,
}

impl BridgeHandle {
    /// Queue an event. Fails once the bridge loop has stopped.
    pub async fn send(&self, event: HostEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| BridgeError::PlatformUnavailable)
    }

    /// Forward a message posted by the page.
    pub async fn post_message(&self, name: impl Into<String>, body: Value) -> Result<()> {
        self.send(HostEvent::ScriptMessage {
            name: name.into(),
            body,
        })
        .await
    }

    /// Ask the bridge for a navigation decision.
    pub async fn decide_policy(&self, request: NavigationRequest) -> Result<NavigationDecision> {
        let (reply, answer) = oneshot::channel();
        self.send(HostEvent::DecidePolicy { request, reply }).await?;
        answer.await.map_err(|_| BridgeError::PlatformUnavailable)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(HostEvent::Shutdown).await
    }
}

pub struct ForemBridge {
    config: BridgeConfig,
    surface: Arc<dyn RenderingSurface>,
    host: Arc<dyn BridgeHost>,
    platform: Arc<dyn NativePlatform>,
    transport: Arc<dyn NetworkTransport>,
    policy: NavigationPolicy,
    session: InstanceSession,
    media: MediaBridge,
    uploads: Arc<ImageUploadCoordinator>,
    registrar: DeviceRegistrar,
    /// Device token waiting for the instance metadata.
    pending_device_token: Option<String>,
    /// Cached state handed to the next navigation finish.
    pending_resume: Option<CachedState>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    stop: CancellationToken,
}

impl ForemBridge {
    pub fn new(
        config: BridgeConfig,
        surface: Arc<dyn RenderingSurface>,
        host: Arc<dyn BridgeHost>,
        platform: Arc<dyn NativePlatform>,
        transport: Arc<dyn NetworkTransport>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            policy: NavigationPolicy::from_config(&config),
            session: InstanceSession::new(),
            media: MediaBridge::new(MediaSettings::from_config(&config)),
            uploads: Arc::new(ImageUploadCoordinator::new(
                Arc::clone(&platform),
                Arc::clone(&transport),
                config.clone(),
            )),
            registrar: DeviceRegistrar::new(&config),
            pending_device_token: None,
            pending_resume: None,
            completions_tx,
            completions_rx,
            stop: CancellationToken::new(),
            config,
            surface,
            host,
            platform,
            transport,
        }
    }

    /// Names the surface must register message handlers for.
    pub fn channel_names() -> impl Iterator<Item = &'static str> {
        BridgeChannel::ALL.into_iter().map(|channel| channel.name())
    }

    /// Application name the surface appends to its user agent.
    pub fn user_agent_application_name(&self) -> String {
        self.config.user_agent_application_name()
    }

    pub fn session(&self) -> &InstanceSession {
        &self.session
    }

    pub fn media(&self) -> &MediaBridge {
        &self.media
    }

    /// Spawn the loop on the current runtime.
    pub fn spawn(self) -> (BridgeHandle, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let task = tokio::spawn(self.run(events_rx));
        (BridgeHandle { events: events_tx }, task)
    }

    /// Process events until `Shutdown` or until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>) {
        let mut scheduler = tokio::time::interval(self.poll_period());
        scheduler.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut session_poll = self.config.session_poll_interval().map(|period| {
            let mut poll = tokio::time::interval_at(Instant::now() + period, period);
            poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
            poll
        });

        info!(channels = BridgeChannel::ALL.len(), "bridge loop started");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(HostEvent::Shutdown) | None => {
                        self.shutdown();
                        break;
                    }
                    Some(event) => self.handle_event(event, Instant::now()),
                },
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
                now = scheduler.tick() => self.poll_media(now),
                _ = next_tick(&mut session_poll) => self.refresh_session(),
                _ = self.stop.cancelled() => break,
            }
        }
        info!("bridge loop stopped");
    }

    /// Scheduler resolution: a fraction of the shortest tick interval.
    fn poll_period(&self) -> Duration {
        let shortest = self
            .config
            .podcast_tick_interval()
            .min(self.config.video_tick_interval());
        (shortest / 5).max(Duration::from_millis(10))
    }

    pub fn handle_event(&mut self, event: HostEvent, now: Instant) {
        match event {
            HostEvent::ScriptMessage { name, body } => self.handle_script_message(&name, &body, now),
            HostEvent::NavigationStarted => self.host.on_navigation_start(),
            HostEvent::NavigationFinished => self.on_navigation_finished(),
            HostEvent::NavigationFailed => {
                debug!("navigation failed");
                self.host.on_navigation_fail();
            }
            HostEvent::DecidePolicy { request, reply } => {
                let decision = self.decide_policy(&request);
                // The surface may have given up waiting.
                let _ = reply.send(decision);
            }
            HostEvent::Load(url) => self.load(url),
            HostEvent::LoadCached(state) => self.load_cached(state),
            HostEvent::Remote(command) => self.media.handle_remote(command, self.platform.as_ref()),
            HostEvent::RegisterDevice { token } => self.register_device(token),
            HostEvent::UnregisterDevice => {
                if let Some(user) = self.session.user().cloned() {
                    self.unregister_device(&user);
                }
            }
            HostEvent::Shutdown => self.shutdown(),
        }
    }

    fn handle_script_message(&mut self, name: &str, body: &Value, now: Instant) {
        let message = match InboundMessage::from_wire(name, body) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                debug!(channel = name, error = %e, "dropping bridge message");
                return;
            }
        };
        self.dispatch(message, now);
    }

    fn dispatch(&mut self, message: InboundMessage, now: Instant) {
        match message {
            InboundMessage::Haptic(style) => self.platform.impact(style),
            InboundMessage::Podcast(command) => {
                let effects = self
                    .media
                    .handle_podcast(command, self.platform.as_ref(), now);
                self.apply_effects(effects);
            }
            InboundMessage::Video(command) => {
                let effects = self.media.handle_video(command, self.platform.as_ref(), now);
                self.apply_effects(effects);
            }
            InboundMessage::ImagePick(request) => self.start_upload(request),
            InboundMessage::BodyMutated => self.refresh_session(),
        }
    }

    fn apply_effects(&mut self, effects: Vec<MediaEffect>) {
        for effect in effects {
            match effect {
                MediaEffect::Inject(message) => self.inject(&message),
                MediaEffect::RunScript(javascript) => {
                    self.surface.run_script(scripts::wrapped(javascript));
                }
                MediaEffect::FetchArtwork { url, generation } => {
                    self.fetch_artwork(&url, generation);
                }
                MediaEffect::PresentVideo(presentation) => {
                    self.host.will_start_native_video(&presentation);
                }
            }
        }
    }

    fn inject(&self, message: &OutboundMessage) {
        match message.to_script() {
            Ok(javascript) => self.surface.run_script(javascript),
            Err(e) => warn!(error = %e, "could not encode bridge message"),
        }
    }

    /// Run due tick observers.
    pub fn poll_media(&mut self, now: Instant) {
        let effects = self.media.poll(now, self.platform.as_ref());
        self.apply_effects(effects);
    }

    fn fetch_artwork(&mut self, raw: &str, generation: u64) {
        let base = self
            .session
            .metadata()
            .and_then(|instance| self.config.instance_base_url(instance).ok());
        let Some(url) = artwork_url(raw, base.as_ref()) else {
            warn!(url = raw, "unresolvable artwork URL");
            self.media
                .artwork_ready(generation, Artwork::DefaultIcon, self.platform.as_ref());
            return;
        };

        let transport = Arc::clone(&self.transport);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let fetched = transport.fetch_artwork(&url).await;
            let artwork = tokio::task::spawn_blocking(move || artwork_or_default(fetched))
                .await
                .unwrap_or(Artwork::DefaultIcon);
            let _ = completions.send(Completion::Artwork {
                generation,
                artwork,
            });
        });
    }

    fn start_upload(&mut self, request: ImagePickRequest) {
        let context = UploadContext {
            csrf_token: self.session.csrf_token().map(str::to_string),
            instance: self.session.metadata().cloned(),
        };
        let uploads = Arc::clone(&self.uploads);
        let completions = self.completions_tx.clone();
        let element_id = request.element_id.clone();
        tokio::spawn(async move {
            uploads
                .pick_and_upload(request, context, |event| {
                    let _ = completions.send(Completion::Inject(OutboundMessage::Upload {
                        element_id: element_id.clone(),
                        event,
                    }));
                })
                .await;
        });
    }

    fn on_navigation_finished(&mut self) {
        self.surface
            .run_script(scripts::wrapped(scripts::BODY_MUTATION_OBSERVER));
        self.ensure_instance_metadata();
        self.refresh_session();
        let resume = self.pending_resume.take();
        self.host.on_navigation_finish(resume.as_ref());
    }

    pub fn ensure_instance_metadata(&mut self) {
        if let Some(pending) = self.session.ensure_instance_metadata(&self.surface) {
            let completions = self.completions_tx.clone();
            tokio::spawn(async move {
                let result = pending.fetch.await;
                let _ = completions.send(Completion::Metadata {
                    generation: pending.generation,
                    result,
                });
            });
        }
    }

    pub fn refresh_session(&mut self) {
        if let Some(fetch) = self.session.refresh_session(&self.surface) {
            let completions = self.completions_tx.clone();
            tokio::spawn(async move {
                let _ = completions.send(Completion::Session(fetch.await));
            });
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Metadata { generation, result } => {
                self.session.finish_metadata_fetch(generation, result);
                if self.session.metadata().is_some() {
                    if let Some(token) = self.pending_device_token.take() {
                        self.register_device(token);
                    }
                }
            }
            Completion::Session(result) => {
                let outcome = self.session.finish_refresh(result);
                match outcome.transition {
                    Some(SessionTransition::Login(user)) => {
                        info!(user_id = user.user_id, "user logged in");
                        self.host.on_login(&user);
                    }
                    Some(SessionTransition::Logout(user)) => {
                        info!(user_id = user.user_id, "user logged out");
                        self.host.on_logout(&user);
                        self.unregister_device(&user);
                    }
                    None => {}
                }
                if outcome.follow_up {
                    self.refresh_session();
                }
            }
            Completion::Inject(message) => self.inject(&message),
            Completion::Artwork {
                generation,
                artwork,
            } => self
                .media
                .artwork_ready(generation, artwork, self.platform.as_ref()),
            Completion::Registration { job, result } => {
                self.registrar.finish_registration(job, result)
            }
            Completion::Unregistration(result) => {
                if let Err(e) = result {
                    warn!(error = %e, "device unregistration failed");
                }
            }
        }
    }

    /// Gate a navigation; reloads in place when the decision asks for it.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub fn decide_policy(&mut self, request: &NavigationRequest) -> NavigationDecision {
        let outcome = self.policy.evaluate(request, self.session.metadata());
        match &outcome.event {
            Some(NavigationEvent::ExternalSite(url)) => self.host.on_external_site(url),
            Some(NavigationEvent::Mailto(url)) => self.host.on_mailto(url),
            None => {}
        }
        if let NavigationDecision::CancelAndReload(url) = &outcome.decision {
            self.surface.load(url);
        }
        outcome.decision
    }

    /// Load `url`. Another origin invalidates the instance metadata, and so
    /// does any load while the identity is still being fetched.
    pub fn load(&mut self, url: Url) {
        let stale = match self.session.metadata() {
            Some(instance) => !instance.owns(&url),
            None => self.session.is_metadata_pending(),
        };
        if stale {
            debug!(%url, "loading another origin, clearing instance metadata");
            self.session.clear_metadata();
        }
        self.surface.load(&url);
    }

    /// Load a cached page; its state is handed to the next navigation finish.
    pub fn load_cached(&mut self, state: CachedState) {
        self.load(state.url.clone());
        self.pending_resume = Some(state);
    }

    /// Capture the current page for instant resume.
    pub fn cached_preview(&self, url: Url, scroll_offset: ScrollOffset) -> CachedState {
        cached_preview(url, self.surface.snapshot(), scroll_offset)
    }

    fn register_device(&mut self, token: String) {
        if self.session.metadata().is_none() {
            debug!("deferring device registration until the instance is known");
            self.pending_device_token = Some(token);
            return;
        }
        match self.registrar.register(token, self.session.metadata()) {
            Ok(Some(job)) => {
                let surface = Arc::clone(&self.surface);
                let transport = Arc::clone(&self.transport);
                let completions = self.completions_tx.clone();
                tokio::spawn(async move {
                    let id = job.id;
                    let result = job.run(surface, transport).await;
                    let _ = completions.send(Completion::Registration { job: id, result });
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "device registration not started"),
        }
    }

    fn unregister_device(&mut self, user: &UserSession) {
        match self.registrar.unregister(user, self.session.metadata()) {
            Ok(Some(job)) => {
                let transport = Arc::clone(&self.transport);
                let completions = self.completions_tx.clone();
                tokio::spawn(async move {
                    let _ = completions.send(Completion::Unregistration(job.run(transport).await));
                });
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "device unregistration not started"),
        }
    }

    /// Release players and observers and stop background retries.
    pub fn shutdown(&mut self) {
        let effects = self.media.terminate_all(self.platform.as_ref());
        self.apply_effects(effects);
        self.registrar.cancel();
        self.pending_resume = None;
        self.pending_device_token = None;
        self.stop.cancel();
        info!("bridge shut down");
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
