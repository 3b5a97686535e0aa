// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Instance identity and login state of the hosted page.
//
// `InstanceSession` is plain state owned by the bridge loop. Fetches are
// returned as futures for the loop to spawn; their results come back through
// `finish_*`, so the pending flags below are the only concurrency control.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use forem_core::error::{BridgeError, Result};
use forem_core::types::{InstanceMetadata, UserSession};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::scripts;
use crate::traits::RenderingSurface;

/// A fetch handed to the event loop to run out of line.
pub type PendingFetch<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// A metadata fetch tagged with the instance generation that started it.
pub struct MetadataFetch {
    pub generation: u64,
    pub fetch: PendingFetch<InstanceMetadata>,
}

/// Login state change derived from two consecutive session fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    Login(UserSession),
    /// Carries the previous user, since the new state has no identity.
    Logout(UserSession),
}

/// Result of one session fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<UserSession>,
    pub csrf_token: Option<String>,
}

/// What the loop must do after a session fetch completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub transition: Option<SessionTransition>,
    /// A refresh was requested while this one was in flight.
    pub follow_up: bool,
}

#[derive(Debug, Default)]
pub struct InstanceSession {
    metadata: Option<InstanceMetadata>,
    metadata_pending: bool,
    /// Bumped whenever the instance identity is forgotten.
    metadata_generation: u64,
    user: Option<UserSession>,
    csrf_token: Option<String>,
    refresh_in_flight: bool,
    refresh_again: bool,
}

impl InstanceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&self) -> Option<&InstanceMetadata> {
        self.metadata.as_ref()
    }

    pub fn user(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn is_metadata_pending(&self) -> bool {
        self.metadata_pending
    }

    /// Forget the instance identity (explicit load of another origin).
    ///
    /// A fetch still in flight belongs to the old origin; its result is
    /// dropped when it lands.
    pub fn clear_metadata(&mut self) {
        self.metadata = None;
        self.metadata_pending = false;
        self.metadata_generation += 1;
    }

    /// Start a metadata fetch unless metadata is known or a fetch is pending.
    pub fn ensure_instance_metadata(
        &mut self,
        surface: &Arc<dyn RenderingSurface>,
    ) -> Option<MetadataFetch> {
        if self.metadata.is_some() || self.metadata_pending {
            return None;
        }
        self.metadata_pending = true;
        let surface = Arc::clone(surface);
        Some(MetadataFetch {
            generation: self.metadata_generation,
            fetch: Box::pin(async move {
                let value = surface
                    .evaluate_script(scripts::wrapped(scripts::INSTANCE_METADATA))
                    .await
                    .map_err(|e| BridgeError::MetadataUnavailable(e.to_string()))?;
                parse_metadata(value)
            }),
        })
    }

    /// Record the result of a metadata fetch. The first success wins.
    ///
    /// Results from a generation older than the current one are ignored.
    pub fn finish_metadata_fetch(&mut self, generation: u64, result: Result<InstanceMetadata>) {
        if generation != self.metadata_generation {
            debug!(generation, current = self.metadata_generation, "dropping stale metadata fetch");
            return;
        }
        self.metadata_pending = false;
        match result {
            Ok(metadata) if self.metadata.is_none() => {
                info!(domain = %metadata.domain, "instance metadata loaded");
                self.metadata = Some(metadata);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "instance metadata unavailable, retrying on next load"),
        }
    }

    /// Start a session fetch, or mark a follow-up if one is already running.
    pub fn refresh_session(
        &mut self,
        surface: &Arc<dyn RenderingSurface>,
    ) -> Option<PendingFetch<SessionSnapshot>> {
        if self.refresh_in_flight {
            self.refresh_again = true;
            return None;
        }
        self.refresh_in_flight = true;
        let surface = Arc::clone(surface);
        Some(Box::pin(async move {
            let value = surface
                .evaluate_script(scripts::wrapped(scripts::USER_DATA))
                .await
                .map_err(|e| BridgeError::SessionFetch(e.to_string()))?;
            let user = parse_user(value)?;

            // A missing token must not wipe the one already known.
            let csrf_token = match surface
                .evaluate_script(scripts::wrapped(scripts::CSRF_TOKEN))
                .await
            {
                Ok(value) => parse_csrf_token(value),
                Err(e) => {
                    debug!(error = %e, "csrf token unavailable");
                    None
                }
            };
            Ok(SessionSnapshot { user, csrf_token })
        }))
    }

    /// Record the result of a session fetch.
    ///
    /// A failed fetch is "no change": it never emits a transition.
    pub fn finish_refresh(&mut self, result: Result<SessionSnapshot>) -> RefreshOutcome {
        self.refresh_in_flight = false;
        let follow_up = std::mem::take(&mut self.refresh_again);

        let transition = match result {
            Ok(snapshot) => {
                if let Some(token) = snapshot.csrf_token {
                    self.csrf_token = Some(token);
                }
                self.apply_user(snapshot.user)
            }
            Err(e) => {
                warn!(error = %e, "session fetch failed, keeping previous state");
                None
            }
        };
        RefreshOutcome {
            transition,
            follow_up,
        }
    }

    /// Store `next` and report the login transition it implies.
    pub fn apply_user(&mut self, next: Option<UserSession>) -> Option<SessionTransition> {
        if self.user == next {
            return None;
        }
        let previous = std::mem::replace(&mut self.user, next);
        match (previous, &self.user) {
            (None, Some(user)) => Some(SessionTransition::Login(user.clone())),
            (Some(previous), None) => Some(SessionTransition::Logout(previous)),
            (Some(previous), Some(user)) if previous.user_id != user.user_id => {
                Some(SessionTransition::Login(user.clone()))
            }
            // Same user, different body classes.
            _ => None,
        }
    }
}

/// Parse the metadata script result: a JSON string or an object.
pub fn parse_metadata(value: Option<Value>) -> Result<InstanceMetadata> {
    let metadata: InstanceMetadata = match value {
        None | Some(Value::Null) => {
            return Err(BridgeError::MetadataUnavailable(
                "page exposes no instance metadata".into(),
            ));
        }
        Some(Value::String(json)) => serde_json::from_str(&json)
            .map_err(|e| BridgeError::MetadataUnavailable(e.to_string()))?,
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map_err(|e| BridgeError::MetadataUnavailable(e.to_string()))?,
        Some(other) => {
            return Err(BridgeError::MetadataUnavailable(format!(
                "unexpected metadata value {other}"
            )));
        }
    };
    if metadata.domain.trim().is_empty() {
        return Err(BridgeError::MetadataUnavailable("empty domain".into()));
    }
    Ok(metadata)
}

/// Parse the `data-user` attribute: `None` when logged out.
pub fn parse_user(value: Option<Value>) -> Result<Option<UserSession>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(json)) if json.trim().is_empty() || json.trim() == "null" => Ok(None),
        Some(Value::String(json)) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| BridgeError::SessionFetch(e.to_string())),
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BridgeError::SessionFetch(e.to_string())),
        Some(other) => Err(BridgeError::SessionFetch(format!(
            "unexpected user value {other}"
        ))),
    }
}

fn parse_csrf_token(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}
