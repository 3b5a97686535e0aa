// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native video playback controller.

use forem_core::types::{MediaKind, PlaybackState};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::observer::{ObserverPoll, TickObserver};
use super::{MediaEffect, MediaSettings};
use crate::codec::{OutboundMessage, VideoCommand, VideoEvent};
use crate::scripts;
use crate::traits::{MediaPlayer, NativePlatform};

/// Handle given to the presentation layer for one native video.
///
/// Dismissing it stops the tick observer and releases the player on the next
/// poll; no bridge call is needed.
#[derive(Debug, Clone)]
pub struct VideoPresentation {
    url: Url,
    token: CancellationToken,
}

impl VideoPresentation {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: CancellationToken::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Called by the presentation layer when the player view goes away.
    pub fn dismiss(&self) {
        self.token.cancel();
    }

    pub fn is_dismissed(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

pub struct VideoController {
    settings: MediaSettings,
    player: Option<Box<dyn MediaPlayer>>,
    url: Option<String>,
    state: PlaybackState,
    observer: Option<TickObserver>,
    presentation: Option<VideoPresentation>,
    /// Last rate seen by the play/pause watch.
    last_rate: f32,
}

impl VideoController {
    pub fn new(settings: MediaSettings) -> Self {
        Self {
            settings,
            player: None,
            url: None,
            state: PlaybackState::Idle,
            observer: None,
            presentation: None,
            last_rate: 0.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    pub fn handle(
        &mut self,
        command: VideoCommand,
        platform: &dyn NativePlatform,
        now: Instant,
    ) -> Vec<MediaEffect> {
        let VideoCommand::Play { url, seconds } = command;
        if !platform.supports_native_video() {
            debug!("native video unsupported, leaving playback to the page");
            return Vec::new();
        }

        let presented = self
            .presentation
            .as_ref()
            .is_some_and(|presentation| !presentation.is_dismissed());
        if presented && self.url.as_deref() == Some(url.as_str()) {
            // The user is interacting with the open player: resume a paused
            // stream, keep the current position.
            if let Some(player) = self.player.as_mut() {
                if player.rate() == 0.0 {
                    player.play();
                    self.state = PlaybackState::Playing;
                }
            }
            return Vec::new();
        }

        let mut effects = vec![MediaEffect::RunScript(scripts::CLOSE_PODCAST_UI)];

        effects.extend(self.teardown());

        let parsed = match Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, %url, "invalid video URL");
                return effects;
            }
        };
        let mut player = match platform.open_player(MediaKind::Video, &parsed) {
            Ok(player) => player,
            Err(e) => {
                warn!(error = %e, %url, "video stream could not be loaded");
                return effects;
            }
        };

        if let Some(seconds) = seconds {
            player.seek(seconds.max(0.0));
        }
        player.play();

        let presentation = VideoPresentation::new(parsed);
        self.observer = Some(TickObserver::with_token(
            self.settings.video_tick,
            now,
            presentation.token(),
        ));
        self.player = Some(player);
        self.url = Some(url);
        self.state = PlaybackState::Playing;
        self.presentation = Some(presentation.clone());
        info!("native video started");

        effects.push(MediaEffect::PresentVideo(presentation));
        effects
    }

    pub fn poll(&mut self, now: Instant) -> Vec<MediaEffect> {
        let mut effects = Vec::new();

        // Play/pause reflection, whatever changed the rate.
        if let Some(player) = self.player.as_ref() {
            let rate = player.rate();
            let playing = rate > 0.0;
            if playing != (self.last_rate > 0.0) {
                let event = if playing {
                    VideoEvent::Play
                } else {
                    VideoEvent::Pause
                };
                effects.push(MediaEffect::Inject(OutboundMessage::Video(event)));
                self.state = if playing {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
            }
            self.last_rate = rate;
        }

        let Some(observer) = self.observer.as_mut() else {
            return effects;
        };
        match observer.poll(now) {
            ObserverPoll::Idle => {}
            ObserverPoll::Released => {
                info!("video presentation dismissed, releasing player");
                effects.extend(self.teardown());
            }
            ObserverPoll::Fire => {
                if let (PlaybackState::Playing, Some(player)) = (self.state, self.player.as_ref()) {
                    effects.push(MediaEffect::Inject(OutboundMessage::Video(VideoEvent::Tick {
                        current_time: player.current_time(),
                    })));
                }
            }
        }
        effects
    }

    /// Release the observer, the rate watch and the player.
    pub fn teardown(&mut self) -> Vec<MediaEffect> {
        self.observer = None;
        if let Some(presentation) = self.presentation.take() {
            presentation.dismiss();
        }
        let mut effects = Vec::new();
        if let Some(mut player) = self.player.take() {
            player.pause();
            if self.last_rate > 0.0 {
                effects.push(MediaEffect::Inject(OutboundMessage::Video(VideoEvent::Pause)));
            }
        }
        self.last_rate = 0.0;
        self.url = None;
        self.state = PlaybackState::Idle;
        effects
    }
}
