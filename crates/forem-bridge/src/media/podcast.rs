// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Podcast playback controller.
//
// At most one stream is loaded. A different URL tears the current player,
// its observer and its remote-control registration down before the new player
// is created.

use forem_core::types::{MediaKind, PlaybackState};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::observer::{ObserverPoll, TickObserver};
use super::{MediaEffect, MediaSettings, RemoteCommand};
use crate::codec::{OutboundMessage, PodcastCommand, PodcastEvent, PodcastMetadata};
use crate::traits::{Artwork, MediaPlayer, NativePlatform, NowPlayingInfo};

const DEFAULT_TITLE: &str = "Podcast";

pub struct PodcastController {
    settings: MediaSettings,
    player: Option<Box<dyn MediaPlayer>>,
    url: Option<String>,
    state: PlaybackState,
    observer: Option<TickObserver>,
    rate: f32,
    volume: f32,
    muted: bool,
    metadata: PodcastMetadata,
    artwork_fetched: bool,
    artwork_generation: u64,
    remote_enabled: bool,
}

impl PodcastController {
    pub fn new(settings: MediaSettings) -> Self {
        Self {
            settings,
            player: None,
            url: None,
            state: PlaybackState::Idle,
            observer: None,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            metadata: PodcastMetadata::default(),
            artwork_fetched: false,
            artwork_generation: 0,
            remote_enabled: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// URL of the loaded stream.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    pub fn metadata(&self) -> &PodcastMetadata {
        &self.metadata
    }

    pub fn artwork_generation(&self) -> u64 {
        self.artwork_generation
    }

    pub fn handle(
        &mut self,
        command: PodcastCommand,
        platform: &dyn NativePlatform,
        now: Instant,
    ) -> Vec<MediaEffect> {
        if let Err(e) = platform.activate_audio_session() {
            debug!(error = %e, "audio session not activated");
        }

        match command {
            PodcastCommand::Play { url, seconds } => self.play(url, seconds, platform, now),
            PodcastCommand::Load { url } => self.load(&url, platform, now),
            PodcastCommand::Seek { seconds } => {
                if let Some(player) = self.player.as_mut() {
                    player.seek(seconds.max(0.0));
                }
                Vec::new()
            }
            PodcastCommand::Rate { rate } => {
                self.rate = rate;
                if let Some(player) = self.player.as_mut() {
                    player.set_rate(rate);
                }
                Vec::new()
            }
            PodcastCommand::Muted { muted } => {
                self.muted = muted;
                if let Some(player) = self.player.as_mut() {
                    player.set_muted(muted);
                }
                Vec::new()
            }
            PodcastCommand::Volume { volume } => {
                self.volume = volume;
                if let Some(player) = self.player.as_mut() {
                    player.set_volume(volume);
                }
                Vec::new()
            }
            PodcastCommand::Pause => {
                self.pause();
                Vec::new()
            }
            PodcastCommand::Terminate => {
                self.teardown(platform);
                Vec::new()
            }
            PodcastCommand::Metadata(metadata) => self.update_metadata(metadata, platform),
        }
    }

    /// Load `url` unless it is already the current stream.
    #[instrument(skip(self, platform, now))]
    fn load(&mut self, url: &str, platform: &dyn NativePlatform, now: Instant) -> Vec<MediaEffect> {
        if self.player.is_some() && self.url.as_deref() == Some(url) {
            debug!("podcast already loaded");
            return Vec::new();
        }
        self.teardown(platform);

        let opened = Url::parse(url)
            .map_err(Into::into)
            .and_then(|parsed| platform.open_player(MediaKind::Podcast, &parsed));
        let mut player = match opened {
            Ok(player) => player,
            Err(e) => {
                warn!(error = %e, "podcast stream could not be loaded");
                return vec![MediaEffect::Inject(OutboundMessage::Podcast(PodcastEvent::Init))];
            }
        };

        player.set_rate(self.rate);
        player.set_volume(self.volume);
        player.set_muted(self.muted);
        self.player = Some(player);
        self.url = Some(url.to_string());
        self.state = PlaybackState::Loading;
        self.observer = Some(TickObserver::new(self.settings.podcast_tick, now));
        info!("podcast stream loaded");
        Vec::new()
    }

    fn play(
        &mut self,
        url: Option<String>,
        seconds: Option<f64>,
        platform: &dyn NativePlatform,
        now: Instant,
    ) -> Vec<MediaEffect> {
        let mut effects = Vec::new();
        let mut swapped = false;
        if let Some(url) = url {
            if self.player.is_none() || self.url.as_deref() != Some(url.as_str()) {
                effects.extend(self.load(&url, platform, now));
                swapped = true;
            }
        }

        let Some(player) = self.player.as_mut() else {
            debug!("podcast play without a loaded stream");
            return effects;
        };
        // A new stream always starts from the beginning.
        if swapped {
            player.seek(0.0);
        } else if let Some(seconds) = seconds {
            player.seek(seconds.max(0.0));
        }
        player.set_rate(self.rate);
        player.play();
        self.state = PlaybackState::Playing;

        if !self.remote_enabled {
            platform.enable_remote_commands(self.settings.skip_interval_secs);
            self.remote_enabled = true;
        }
        self.publish_now_playing(platform);
        effects
    }

    fn pause(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.pause();
            self.state = PlaybackState::Paused;
        }
    }

    /// Release the observer, the remote registration and the player.
    pub fn teardown(&mut self, platform: &dyn NativePlatform) {
        self.observer = None;
        if self.remote_enabled {
            platform.disable_remote_commands();
            self.remote_enabled = false;
        }
        if let Some(mut player) = self.player.take() {
            player.pause();
            debug!(url = ?self.url, "podcast player released");
        }
        self.url = None;
        self.state = PlaybackState::Idle;
    }

    pub fn remote(&mut self, command: RemoteCommand, platform: &dyn NativePlatform) {
        let skip = self.settings.skip_interval_secs;
        let Some(player) = self.player.as_mut() else {
            debug!(?command, "remote command without a podcast");
            return;
        };
        match command {
            RemoteCommand::Play => {
                player.set_rate(self.rate);
                player.play();
                self.state = PlaybackState::Playing;
            }
            RemoteCommand::Pause => {
                player.pause();
                self.state = PlaybackState::Paused;
            }
            RemoteCommand::SkipForward | RemoteCommand::SkipBackward => {
                let delta = if command == RemoteCommand::SkipForward {
                    skip
                } else {
                    -skip
                };
                let current = player.current_time();
                let target = skip_target(current, delta, player.duration(), skip);
                if target != current {
                    player.seek(target);
                }
            }
        }
        self.publish_now_playing(platform);
    }

    pub fn poll(&mut self, now: Instant, platform: &dyn NativePlatform) -> Vec<MediaEffect> {
        let Some(observer) = self.observer.as_mut() else {
            return Vec::new();
        };
        match observer.poll(now) {
            ObserverPoll::Idle => Vec::new(),
            ObserverPoll::Released => {
                self.observer = None;
                Vec::new()
            }
            ObserverPoll::Fire => {
                let event = self.tick_event();
                if self.state == PlaybackState::Playing {
                    self.publish_now_playing(platform);
                }
                vec![MediaEffect::Inject(OutboundMessage::Podcast(event))]
            }
        }
    }

    fn tick_event(&self) -> PodcastEvent {
        let Some(player) = self.player.as_ref() else {
            return PodcastEvent::Init;
        };
        if let Some(error) = player.error() {
            debug!(%error, "podcast player failed");
            return PodcastEvent::Init;
        }
        let current_time = player.current_time();
        match player.duration() {
            Some(duration) if duration > 0.0 && current_time > 0.0 && current_time.is_finite() => {
                PodcastEvent::Tick {
                    duration,
                    current_time,
                }
            }
            _ => PodcastEvent::Init,
        }
    }

    fn update_metadata(
        &mut self,
        metadata: PodcastMetadata,
        platform: &dyn NativePlatform,
    ) -> Vec<MediaEffect> {
        let mut effects = Vec::new();
        if metadata.image_url != self.metadata.image_url {
            self.artwork_fetched = false;
        }
        self.metadata = metadata;

        if !self.artwork_fetched {
            self.artwork_fetched = true;
            self.artwork_generation += 1;
            match &self.metadata.image_url {
                Some(url) => effects.push(MediaEffect::FetchArtwork {
                    url: url.clone(),
                    generation: self.artwork_generation,
                }),
                None => platform.set_artwork(Artwork::DefaultIcon),
            }
        }
        if self.player.is_some() {
            self.publish_now_playing(platform);
        }
        effects
    }

    /// Apply fetched artwork unless newer metadata superseded it.
    pub fn artwork_ready(&mut self, generation: u64, artwork: Artwork, platform: &dyn NativePlatform) {
        if generation != self.artwork_generation {
            debug!(generation, current = self.artwork_generation, "dropping stale artwork");
            return;
        }
        platform.set_artwork(artwork);
    }

    fn publish_now_playing(&self, platform: &dyn NativePlatform) {
        let Some(player) = self.player.as_ref() else {
            return;
        };
        let title = self
            .metadata
            .episode_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let artist = self
            .metadata
            .podcast_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.settings.default_artist.clone());
        platform.update_now_playing(&NowPlayingInfo {
            title,
            artist,
            duration: player.duration().unwrap_or(0.0),
            elapsed: player.current_time(),
        });
    }
}

/// Seek target for a skip, clamped to `[0, duration - skip]`.
///
/// Without a finite duration there is no upper bound to check a forward skip
/// against, so the position stays where it is.
pub fn skip_target(current: f64, delta: f64, duration: Option<f64>, skip: f64) -> f64 {
    if delta <= 0.0 {
        return (current + delta).max(0.0);
    }
    match duration.filter(|d| d.is_finite()) {
        Some(duration) => (current + delta).min((duration - skip).max(0.0)).max(0.0),
        None => current,
    }
}
