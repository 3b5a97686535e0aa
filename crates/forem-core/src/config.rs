// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::types::InstanceMetadata;

/// Settings supplied by the embedding host.
///
/// Every field has a default, so a partial JSON document is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Hosts treated as part of the app in addition to the instance domain
    /// (simulator / local development servers). Uploads to these use `http`.
    pub development_hosts: Vec<String>,
    /// Prefix of the first-party passport OAuth endpoint.
    pub passport_oauth_prefix: String,
    /// Podcast tick interval in milliseconds.
    pub podcast_tick_ms: u64,
    /// Video tick interval in milliseconds.
    pub video_tick_ms: u64,
    /// Remote-control skip interval in seconds (both directions).
    pub skip_interval_secs: f64,
    /// Fallback session polling interval in milliseconds (0 disables).
    pub session_poll_ms: u64,
    /// Maximum side (pixels) of uploaded images.
    pub image_side_limit: u32,
    /// JPEG quality (1-100) for uploaded images.
    pub image_jpeg_quality: u8,
    /// Path of the image upload endpoint on the instance.
    pub upload_path: String,
    /// Path of the push device registration resource on the instance.
    pub devices_path: String,
    /// Platform string sent with push registrations.
    pub push_platform: String,
    /// Application bundle identifier sent with push registrations.
    pub app_bundle: String,
    /// Base delay of the device registration backoff (milliseconds).
    pub registration_base_delay_ms: u64,
    /// Cap of the device registration backoff (milliseconds).
    pub registration_max_delay_ms: u64,
    /// Now-playing artist shown when the podcast has no name.
    pub default_podcast_artist: String,
    /// Version advertised in the user agent application name.
    pub app_version: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            development_hosts: vec!["localhost".into(), "127.0.0.1".into()],
            passport_oauth_prefix: "https://passport.forem.com/oauth".into(),
            podcast_tick_ms: 500,
            video_tick_ms: 1000,
            skip_interval_secs: 15.0,
            session_poll_ms: 5000,
            image_side_limit: 1000,
            image_jpeg_quality: 90,
            upload_path: "/image_uploads".into(),
            devices_path: "/users/devices".into(),
            push_platform: "iOS".into(),
            app_bundle: "com.forem.app".into(),
            registration_base_delay_ms: 600,
            registration_max_delay_ms: 15_000,
            default_podcast_artist: "DEV Community".into(),
            app_version: "0.0".into(),
        }
    }
}

impl BridgeConfig {
    /// Parse a (possibly partial) JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn podcast_tick_interval(&self) -> Duration {
        Duration::from_millis(self.podcast_tick_ms.max(1))
    }

    pub fn video_tick_interval(&self) -> Duration {
        Duration::from_millis(self.video_tick_ms.max(1))
    }

    pub fn session_poll_interval(&self) -> Option<Duration> {
        (self.session_poll_ms > 0).then(|| Duration::from_millis(self.session_poll_ms))
    }

    /// Whether `host` is one of the configured development hosts.
    pub fn is_development_host(&self, host: &str) -> bool {
        self.development_hosts.iter().any(|dev| dev == host)
    }

    /// Root URL of the instance: `http` for development hosts, `https` otherwise.
    pub fn instance_base_url(&self, instance: &InstanceMetadata) -> Result<Url> {
        let scheme = if self.is_development_host(instance.host()) {
            "http"
        } else {
            "https"
        };
        Ok(Url::parse(&format!("{scheme}://{}/", instance.domain))?)
    }

    /// Application name appended to the surface's user agent.
    pub fn user_agent_application_name(&self) -> String {
        format!("ForemWebView/{}", self.app_version)
    }
}
