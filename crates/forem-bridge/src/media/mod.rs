// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Media bridge: one podcast and one video controller.
//
// The controllers own their players and tick observers exclusively. They hold
// no reference to the bridge; anything that touches the page or the host is
// returned as a `MediaEffect` for the bridge to apply.

pub mod artwork;
pub mod observer;
pub mod podcast;
pub mod video;

use std::time::Duration;

use forem_core::config::BridgeConfig;
use forem_core::types::PlaybackState;
use tokio::time::Instant;

use crate::codec::{OutboundMessage, PodcastCommand, VideoCommand};
use crate::traits::{Artwork, NativePlatform};

pub use observer::{ObserverPoll, TickObserver};
pub use podcast::PodcastController;
pub use video::{VideoController, VideoPresentation};

/// Work the bridge performs on behalf of a controller.
#[derive(Debug, Clone)]
pub enum MediaEffect {
    /// Write a message into the page.
    Inject(OutboundMessage),
    /// Evaluate a fixed script in the page.
    RunScript(&'static str),
    /// Fetch artwork for the podcast; the result is tagged with `generation`.
    FetchArtwork { url: String, generation: u64 },
    /// Present a native video player.
    PresentVideo(VideoPresentation),
}

/// Commands from the OS now-playing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Play,
    Pause,
    SkipForward,
    SkipBackward,
}

/// Timing and display settings shared by the controllers.
#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub podcast_tick: Duration,
    pub video_tick: Duration,
    pub skip_interval_secs: f64,
    pub default_artist: String,
}

impl MediaSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            podcast_tick: config.podcast_tick_interval(),
            video_tick: config.video_tick_interval(),
            skip_interval_secs: config.skip_interval_secs,
            default_artist: config.default_podcast_artist.clone(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

pub struct MediaBridge {
    podcast: PodcastController,
    video: VideoController,
}

impl MediaBridge {
    pub fn new(settings: MediaSettings) -> Self {
        Self {
            podcast: PodcastController::new(settings.clone()),
            video: VideoController::new(settings),
        }
    }

    pub fn handle_podcast(
        &mut self,
        command: PodcastCommand,
        platform: &dyn NativePlatform,
        now: Instant,
    ) -> Vec<MediaEffect> {
        self.podcast.handle(command, platform, now)
    }

    pub fn handle_video(
        &mut self,
        command: VideoCommand,
        platform: &dyn NativePlatform,
        now: Instant,
    ) -> Vec<MediaEffect> {
        self.video.handle(command, platform, now)
    }

    /// Lock-screen commands only drive the podcast.
    pub fn handle_remote(&mut self, command: RemoteCommand, platform: &dyn NativePlatform) {
        self.podcast.remote(command, platform);
    }

    /// Run every observer that is due at `now`.
    pub fn poll(&mut self, now: Instant, platform: &dyn NativePlatform) -> Vec<MediaEffect> {
        let mut effects = self.podcast.poll(now, platform);
        effects.extend(self.video.poll(now));
        effects
    }

    pub fn artwork_ready(&mut self, generation: u64, artwork: Artwork, platform: &dyn NativePlatform) {
        self.podcast.artwork_ready(generation, artwork, platform);
    }

    /// Stop and release both players.
    pub fn terminate_all(&mut self, platform: &dyn NativePlatform) -> Vec<MediaEffect> {
        self.podcast.teardown(platform);
        self.video.teardown()
    }

    /// Live tick observers across both kinds.
    pub fn active_observers(&self) -> usize {
        usize::from(self.podcast.has_observer()) + usize::from(self.video.has_observer())
    }

    pub fn podcast_state(&self) -> PlaybackState {
        self.podcast.state()
    }

    pub fn video_state(&self) -> PlaybackState {
        self.video.state()
    }

    pub fn podcast(&self) -> &PodcastController {
        &self.podcast
    }

    pub fn video(&self) -> &VideoController {
        &self.video
    }
}
