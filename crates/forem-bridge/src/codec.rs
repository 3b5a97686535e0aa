// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge message codec.
//
// Inbound: `{name, body}` posted by the page is flattened into a
// `BridgeMessage` and then decoded once into the closed `InboundMessage` enum.
// Outbound: typed events are serialized to JSON and written into the DOM by a
// small script.

use std::collections::BTreeMap;

use forem_core::error::{BridgeError, Result};
use forem_core::types::{BridgeChannel, BridgeMessage, HapticStyle};
use serde_json::Value;
use tracing::debug;

use crate::scripts;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Podcast metadata update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodcastMetadata {
    pub episode_name: Option<String>,
    pub podcast_name: Option<String>,
    pub image_url: Option<String>,
}

/// Commands on the `podcast` channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PodcastCommand {
    /// Start or resume. A different `url` swaps the stream first.
    Play {
        url: Option<String>,
        seconds: Option<f64>,
    },
    Load {
        url: String,
    },
    Seek {
        seconds: f64,
    },
    Rate {
        rate: f32,
    },
    Muted {
        muted: bool,
    },
    Pause,
    Terminate,
    Volume {
        volume: f32,
    },
    Metadata(PodcastMetadata),
}

/// Commands on the `video` channel.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoCommand {
    Play { url: String, seconds: Option<f64> },
}

/// Request to pick and upload an image for a DOM element.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePickRequest {
    pub channel: BridgeChannel,
    /// Id of the element that receives the outcome messages.
    pub element_id: String,
    /// Crop hint, width / height.
    pub ratio: Option<f64>,
}

/// Every message the bridge acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Haptic(HapticStyle),
    Podcast(PodcastCommand),
    Video(VideoCommand),
    ImagePick(ImagePickRequest),
    /// `<body>` attributes changed; the session may have changed.
    BodyMutated,
}

fn required<'a>(message: &'a BridgeMessage, key: &str) -> Result<&'a str> {
    message
        .get(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| BridgeError::Decode(format!("{} message missing '{key}'", message.channel)))
}

fn number<T: std::str::FromStr>(message: &BridgeMessage, key: &str) -> Result<Option<T>> {
    match message.get(key) {
        None | Some("") => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            BridgeError::Decode(format!("{} message has invalid '{key}': {raw}", message.channel))
        }),
    }
}

fn finite<T: Copy + Into<f64>>(
    value: Option<T>,
    message: &BridgeMessage,
    key: &str,
) -> Result<Option<T>> {
    match value {
        Some(v) if !Into::<f64>::into(v).is_finite() => Err(BridgeError::Decode(format!(
            "{} message has non-finite '{key}'",
            message.channel
        ))),
        other => Ok(other),
    }
}

impl InboundMessage {
    /// Decode a flattened message.
    ///
    /// `Ok(None)` means a well-formed message with an unknown action (a
    /// no-op); `Err(Decode)` means a malformed payload. Both are dropped by the
    /// bridge.
    pub fn decode(message: &BridgeMessage) -> Result<Option<Self>> {
        match message.channel {
            BridgeChannel::Haptic => Ok(Some(Self::Haptic(HapticStyle::from_name(
                message.action().unwrap_or_default(),
            )))),
            BridgeChannel::Body => Ok(Some(Self::BodyMutated)),
            BridgeChannel::Podcast => Ok(decode_podcast(message)?.map(Self::Podcast)),
            BridgeChannel::Video => Ok(decode_video(message)?.map(Self::Video)),
            BridgeChannel::ImageUpload | BridgeChannel::CoverUpload => {
                let element_id = required(message, "id")?.to_string();
                // A bad ratio only loses the crop hint.
                let ratio = number::<f64>(message, "ratio")
                    .ok()
                    .flatten()
                    .filter(|r| r.is_finite() && *r > 0.0);
                Ok(Some(Self::ImagePick(ImagePickRequest {
                    channel: message.channel,
                    element_id,
                    ratio,
                })))
            }
        }
    }

    /// Flatten and decode a raw `{name, body}` message in one step.
    pub fn from_wire(name: &str, body: &Value) -> Result<Option<Self>> {
        let message = BridgeMessage::from_wire(name, body)?;
        Self::decode(&message)
    }
}

fn decode_podcast(message: &BridgeMessage) -> Result<Option<PodcastCommand>> {
    let command = match message.action() {
        Some("play") => PodcastCommand::Play {
            url: message.get("url").filter(|u| !u.is_empty()).map(str::to_string),
            seconds: finite(number::<f64>(message, "seconds")?, message, "seconds")?,
        },
        Some("load") => PodcastCommand::Load {
            url: required(message, "url")?.to_string(),
        },
        Some("seek") => {
            let seconds = finite(number::<f64>(message, "seconds")?, message, "seconds")?;
            PodcastCommand::Seek {
                seconds: seconds.ok_or_else(|| {
                    BridgeError::Decode("podcast seek missing 'seconds'".into())
                })?,
            }
        }
        Some("rate") => PodcastCommand::Rate {
            rate: finite(number::<f32>(message, "rate")?, message, "rate")?.unwrap_or(1.0),
        },
        Some("muted") => PodcastCommand::Muted {
            muted: message.get("muted") == Some("true"),
        },
        Some("pause") => PodcastCommand::Pause,
        Some("terminate") => PodcastCommand::Terminate,
        Some("volume") => PodcastCommand::Volume {
            volume: finite(number::<f32>(message, "volume")?, message, "volume")?
                .unwrap_or(1.0),
        },
        Some("metadata") => PodcastCommand::Metadata(PodcastMetadata {
            episode_name: message.get("episodeName").map(str::to_string),
            podcast_name: message.get("podcastName").map(str::to_string),
            image_url: message
                .get("podcastImageUrl")
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        }),
        other => {
            debug!(action = ?other, "ignoring unknown podcast action");
            return Ok(None);
        }
    };
    Ok(Some(command))
}

fn decode_video(message: &BridgeMessage) -> Result<Option<VideoCommand>> {
    match message.action() {
        Some("play") => Ok(Some(VideoCommand::Play {
            url: required(message, "url")?.to_string(),
            seconds: finite(number::<f64>(message, "seconds")?, message, "seconds")?,
        })),
        other => {
            debug!(action = ?other, "ignoring unknown video action");
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Progress pushed to the web podcast player.
#[derive(Debug, Clone, PartialEq)]
pub enum PodcastEvent {
    /// Duration or position not known yet.
    Init,
    Tick { duration: f64, current_time: f64 },
}

/// State pushed to the web video player.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoEvent {
    Tick { current_time: f64 },
    Play,
    Pause,
}

/// Image upload progress pushed to the requesting element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    Uploading,
    Success { link: String },
    Error { message: String },
}

/// A message injected into the hosted page.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Podcast(PodcastEvent),
    Video(VideoEvent),
    Upload {
        element_id: String,
        event: UploadEvent,
    },
}

fn seconds(value: f64) -> String {
    format!("{value:.4}")
}

impl OutboundMessage {
    /// Flat string payload, as the web layer expects it.
    pub fn payload(&self) -> BTreeMap<&'static str, String> {
        let mut payload = BTreeMap::new();
        match self {
            Self::Podcast(PodcastEvent::Init) => {
                payload.insert("action", "init".to_string());
            }
            Self::Podcast(PodcastEvent::Tick {
                duration,
                current_time,
            }) => {
                payload.insert("action", "tick".to_string());
                payload.insert("duration", seconds(*duration));
                payload.insert("currentTime", seconds(*current_time));
            }
            Self::Video(VideoEvent::Tick { current_time }) => {
                payload.insert("action", "tick".to_string());
                payload.insert("currentTime", seconds(*current_time));
            }
            Self::Video(VideoEvent::Play) => {
                payload.insert("action", "play".to_string());
            }
            Self::Video(VideoEvent::Pause) => {
                payload.insert("action", "pause".to_string());
            }
            Self::Upload { event, .. } => match event {
                UploadEvent::Uploading => {
                    payload.insert("action", "uploading".to_string());
                }
                UploadEvent::Success { link } => {
                    payload.insert("action", "success".to_string());
                    payload.insert("link", link.clone());
                }
                UploadEvent::Error { message } => {
                    payload.insert("action", "error".to_string());
                    payload.insert("message", message.clone());
                }
            },
        }
        payload
    }

    /// Script that writes this message into the DOM.
    ///
    /// JSON and element ids are embedded as JSON string literals, so quotes in
    /// the payload cannot break out of the script.
    pub fn to_script(&self) -> Result<String> {
        let json = serde_json::to_string(&self.payload())?;
        let literal = serde_json::to_string(&json)?;

        let javascript = match self {
            Self::Podcast(_) => format!(
                "document.getElementById('audiocontent').setAttribute('data-podcast', {literal})"
            ),
            Self::Video(_) => format!(
                "document.getElementById('video-player-source').setAttribute('data-message', {literal})"
            ),
            Self::Upload { element_id, .. } => {
                let id = serde_json::to_string(element_id)?;
                // React ignores programmatic value changes, so dispatch `change`.
                format!(
                    "let element = document.getElementById({id}); \
                     element.value = {literal}; \
                     element.dispatchEvent(new Event('change', {{ bubbles: true }}));"
                )
            }
        };
        Ok(scripts::wrapped(&javascript))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_podcast_play_with_numbers() {
        let msg = InboundMessage::from_wire(
            "podcast",
            &json!({"action": "play", "url": "https://cdn.example/a.mp3", "seconds": 12.5}),
        )
        .unwrap();
        assert_eq!(
            msg,
            Some(InboundMessage::Podcast(PodcastCommand::Play {
                url: Some("https://cdn.example/a.mp3".into()),
                seconds: Some(12.5),
            }))
        );
    }

    #[test]
    fn decodes_string_payloads() {
        let msg = InboundMessage::from_wire(
            "podcast",
            &json!({"action": "muted", "muted": "true"}),
        )
        .unwrap();
        assert_eq!(
            msg,
            Some(InboundMessage::Podcast(PodcastCommand::Muted { muted: true }))
        );

        let msg =
            InboundMessage::from_wire("podcast", &json!({"action": "rate", "rate": "1.5"})).unwrap();
        assert_eq!(
            msg,
            Some(InboundMessage::Podcast(PodcastCommand::Rate { rate: 1.5 }))
        );
    }

    #[test]
    fn haptic_accepts_bare_string() {
        assert_eq!(
            InboundMessage::from_wire("haptic", &json!("heavy")).unwrap(),
            Some(InboundMessage::Haptic(HapticStyle::Heavy))
        );
        assert_eq!(
            InboundMessage::from_wire("haptic", &json!("whatever")).unwrap(),
            Some(InboundMessage::Haptic(HapticStyle::Success))
        );
    }

    #[test]
    fn body_channel_accepts_empty_object() {
        assert_eq!(
            InboundMessage::from_wire("body", &json!({})).unwrap(),
            Some(InboundMessage::BodyMutated)
        );
    }

    #[test]
    fn unknown_action_is_noop() {
        assert_eq!(
            InboundMessage::from_wire("podcast", &json!({"action": "rewind"})).unwrap(),
            None
        );
        assert_eq!(
            InboundMessage::from_wire("video", &json!({"action": "pause"})).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_payloads_are_decode_errors() {
        for (name, body) in [
            ("podcast", json!({"action": "seek"})),
            ("podcast", json!({"action": "seek", "seconds": "abc"})),
            ("podcast", json!({"action": "load"})),
            ("podcast", json!({"action": "play", "url": {"nested": true}})),
            ("video", json!({"action": "play"})),
            ("imageUpload", json!({"ratio": "1.5"})),
            ("telepathy", json!({})),
            ("podcast", json!([1, 2])),
        ] {
            assert!(
                matches!(InboundMessage::from_wire(name, &body), Err(BridgeError::Decode(_))),
                "expected decode failure for {name}: {body}"
            );
        }
    }

    #[test]
    fn non_finite_rate_and_volume_are_rejected() {
        for body in [
            json!({"action": "rate", "rate": "NaN"}),
            json!({"action": "rate", "rate": "inf"}),
            json!({"action": "volume", "volume": "-inf"}),
            json!({"action": "volume", "volume": "1e40"}),
        ] {
            assert!(
                matches!(InboundMessage::from_wire("podcast", &body), Err(BridgeError::Decode(_))),
                "expected decode failure for {body}"
            );
        }
        assert_eq!(
            InboundMessage::from_wire("podcast", &json!({"action": "volume", "volume": 0.5}))
                .unwrap(),
            Some(InboundMessage::Podcast(PodcastCommand::Volume { volume: 0.5 }))
        );
    }

    #[test]
    fn image_pick_keeps_channel_and_ratio() {
        let msg = InboundMessage::from_wire("coverUpload", &json!({"id": "cover", "ratio": "2.5"}))
            .unwrap();
        assert_eq!(
            msg,
            Some(InboundMessage::ImagePick(ImagePickRequest {
                channel: BridgeChannel::CoverUpload,
                element_id: "cover".into(),
                ratio: Some(2.5),
            }))
        );

        let msg = InboundMessage::from_wire("imageUpload", &json!({"id": "x", "ratio": "wide"}))
            .unwrap();
        assert!(matches!(
            msg,
            Some(InboundMessage::ImagePick(ImagePickRequest { ratio: None, .. }))
        ));
    }

    #[test]
    fn tick_payload_uses_four_decimals() {
        let msg = OutboundMessage::Podcast(PodcastEvent::Tick {
            duration: 120.0,
            current_time: 1.23456,
        });
        let payload = msg.payload();
        assert_eq!(payload["action"], "tick");
        assert_eq!(payload["duration"], "120.0000");
        assert_eq!(payload["currentTime"], "1.2346");
    }

    #[test]
    fn podcast_script_targets_audiocontent() {
        let script = OutboundMessage::Podcast(PodcastEvent::Init).to_script().unwrap();
        assert!(script.starts_with("try { "));
        assert!(script.contains(
            r#"document.getElementById('audiocontent').setAttribute('data-podcast', "{\"action\":\"init\"}")"#
        ));
    }

    #[test]
    fn upload_script_escapes_payload() {
        let msg = OutboundMessage::Upload {
            element_id: "image-upload'); alert('x".into(),
            event: UploadEvent::Error {
                message: "it's \"bad\"".into(),
            },
        };
        let script = msg.to_script().unwrap();
        assert!(script.contains(r#"document.getElementById("image-upload'); alert('x")"#));
        assert!(script.contains(r#"\"message\":\"it's \\\"bad\\\"\""#));
        assert!(script.contains("dispatchEvent(new Event('change', { bubbles: true }))"));
    }
}
