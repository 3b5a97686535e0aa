// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Forem bridge.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{BridgeError, Result};

/// Named channels registered on the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeChannel {
    Haptic,
    Podcast,
    Video,
    ImageUpload,
    CoverUpload,
    /// DOM body attribute mutations (session may have changed).
    Body,
}

impl BridgeChannel {
    /// Every channel the bridge listens on.
    pub const ALL: [BridgeChannel; 6] = [
        Self::Haptic,
        Self::Podcast,
        Self::Video,
        Self::ImageUpload,
        Self::CoverUpload,
        Self::Body,
    ];

    /// Channel name as used by `window.webkit.messageHandlers.<name>`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Haptic => "haptic",
            Self::Podcast => "podcast",
            Self::Video => "video",
            Self::ImageUpload => "imageUpload",
            Self::CoverUpload => "coverUpload",
            Self::Body => "body",
        }
    }

    /// Look up a channel by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.name() == name)
    }
}

impl std::fmt::Display for BridgeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A flattened message received from the web layer.
///
/// The payload is a small fixed vocabulary per channel (`action`, `url`,
/// `seconds`, `rate`, `muted`, `volume`, `episodeName`, `podcastName`,
/// `podcastImageUrl`, `id`, `ratio`). Key order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMessage {
    pub channel: BridgeChannel,
    pub payload: BTreeMap<String, String>,
}

impl BridgeMessage {
    pub fn new(channel: BridgeChannel) -> Self {
        Self {
            channel,
            payload: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }

    /// The `action` field, if present.
    pub fn action(&self) -> Option<&str> {
        self.get("action")
    }

    /// Flatten a raw `{name, body}` message.
    ///
    /// Scalar values are stringified, `null` values dropped, a bare string body
    /// becomes the `action`. Nested objects or arrays are malformed.
    pub fn from_wire(name: &str, body: &Value) -> Result<Self> {
        let channel = BridgeChannel::from_name(name)
            .ok_or_else(|| BridgeError::Decode(format!("unknown channel '{name}'")))?;
        let mut message = BridgeMessage::new(channel);

        match body {
            Value::Null => {}
            Value::String(action) => {
                message.payload.insert("action".into(), action.clone());
            }
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::Null => {}
                        Value::String(s) => {
                            message.payload.insert(key.clone(), s.clone());
                        }
                        Value::Bool(b) => {
                            message.payload.insert(key.clone(), b.to_string());
                        }
                        Value::Number(n) => {
                            message.payload.insert(key.clone(), n.to_string());
                        }
                        Value::Array(_) | Value::Object(_) => {
                            return Err(BridgeError::Decode(format!(
                                "nested value for '{key}' on channel '{name}'"
                            )));
                        }
                    }
                }
            }
            other => {
                return Err(BridgeError::Decode(format!(
                    "unexpected body {other} on channel '{name}'"
                )));
            }
        }
        Ok(message)
    }
}

/// Haptic feedback styles understood by the `haptic` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticStyle {
    Heavy,
    Medium,
    Light,
    /// Notification-style success feedback (the fallback for unknown styles).
    Success,
}

impl HapticStyle {
    pub fn from_name(name: &str) -> Self {
        match name {
            "heavy" => Self::Heavy,
            "medium" => Self::Medium,
            "light" => Self::Light,
            _ => Self::Success,
        }
    }
}

/// Media kinds owned by the media bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Podcast,
    Video,
}

/// Per-kind playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A player exists but playback has not been requested (or not started yet).
    Loading,
    Playing,
    Paused,
}

/// Identity metadata of the hosted Forem instance.
///
/// Fetched once per loaded page; the first successful fetch wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    /// Host (optionally `host:port`) of the instance, e.g. `dev.to`.
    pub domain: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "logo")]
    pub logo_url: Option<String>,
}

impl InstanceMetadata {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: None,
            logo_url: None,
        }
    }

    /// Host part of `domain` without any port suffix.
    pub fn host(&self) -> &str {
        self.domain
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map(|(host, _)| host)
            .unwrap_or(&self.domain)
    }

    /// Whether `url` points at this instance (by host or `host:port`).
    pub fn owns(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if host == self.domain {
            return true;
        }
        match url.port() {
            Some(port) => format!("{host}:{port}") == self.domain,
            None => false,
        }
    }
}

/// UX themes a logged-in user may have selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Theme {
    Base,
    Night,
    Minimal,
    Pink,
    Hacker,
    /// Any other `<name>-theme` class token.
    Custom(String),
}

impl Theme {
    fn from_token(token: &str) -> Self {
        match token {
            "night-theme" => Self::Night,
            "minimal-light-theme" => Self::Minimal,
            "pink-theme" => Self::Pink,
            "ten-x-hacker-theme" => Self::Hacker,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Base => "base",
            Self::Night => "night-theme",
            Self::Minimal => "minimal-light-theme",
            Self::Pink => "pink-theme",
            Self::Hacker => "ten-x-hacker-theme",
            Self::Custom(name) => name,
        }
    }
}

/// The logged-in user as exposed by the hosted page's `<body data-user>`.
///
/// Equality is structural over both fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    #[serde(rename = "id")]
    pub user_id: i64,
    #[serde(rename = "config_body_class", default)]
    pub body_class_list: String,
}

impl UserSession {
    pub fn new(user_id: i64, body_class_list: impl Into<String>) -> Self {
        Self {
            user_id,
            body_class_list: body_class_list.into(),
        }
    }

    /// Theme derived from the body class list; `Base` when no `*-theme` token
    /// is present. The last matching token wins.
    pub fn theme(&self) -> Theme {
        const SUFFIX: &str = "-theme";
        self.body_class_list
            .split_whitespace()
            .rev()
            .find(|token| token.len() > SUFFIX.len() && token.ends_with(SUFFIX))
            .map(Theme::from_token)
            .unwrap_or(Theme::Base)
    }
}

/// One navigation attempt reported by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: Url,
    /// Link click (as opposed to a programmatic redirect).
    pub is_user_activated: bool,
    /// False when the load would open a new top-level browsing context.
    pub has_target_frame: bool,
}

impl NavigationRequest {
    /// A user-activated link click in the current frame.
    pub fn link(url: Url) -> Self {
        Self {
            url,
            is_user_activated: true,
            has_target_frame: true,
        }
    }

    /// A programmatic (non user-activated) load in the current frame.
    pub fn redirect(url: Url) -> Self {
        Self {
            url,
            is_user_activated: false,
            has_target_frame: true,
        }
    }
}

/// Answer handed back to the rendering surface for a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Cancel,
    /// Cancel, then load the URL in the same surface (no multi-window model).
    CancelAndReload(Url),
}

/// Retry classification for failed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network blip, stale token, page still loading. Retried automatically.
    Transient,
    /// Retrying cannot help.
    Permanent,
}

/// Body of the push device registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub token: String,
    pub platform: String,
    pub app_bundle: String,
}
