// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Navigation interception policy.
//
// Every navigation requested by the rendering surface is gated here. The
// policy itself is stateless: the caller supplies the instance metadata known
// at decision time.

use forem_core::config::BridgeConfig;
use forem_core::types::{InstanceMetadata, NavigationDecision, NavigationRequest};
use tracing::debug;
use url::Url;

use crate::auth::AuthUrlClassifier;

/// Side event the host must handle natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// A user-activated link leaves the instance.
    ExternalSite(Url),
    /// A `mailto:` link.
    Mailto(Url),
}

/// Decision plus optional event for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub decision: NavigationDecision,
    pub event: Option<NavigationEvent>,
}

impl PolicyOutcome {
    fn allow() -> Self {
        Self {
            decision: NavigationDecision::Allow,
            event: None,
        }
    }

    fn cancel_with(event: NavigationEvent) -> Self {
        Self {
            decision: NavigationDecision::Cancel,
            event: Some(event),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationPolicy {
    classifier: AuthUrlClassifier,
    development_hosts: Vec<String>,
}

impl Default for NavigationPolicy {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl NavigationPolicy {
    pub fn new(classifier: AuthUrlClassifier, development_hosts: Vec<String>) -> Self {
        Self {
            classifier,
            development_hosts,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            AuthUrlClassifier::new(config.passport_oauth_prefix.clone()),
            config.development_hosts.clone(),
        )
    }

    /// Decide what to do with `request`.
    ///
    /// A decision of `Allow` for a request without a target frame is turned
    /// into `CancelAndReload`, since the surface has no multi-window model.
    pub fn evaluate(
        &self,
        request: &NavigationRequest,
        instance: Option<&InstanceMetadata>,
    ) -> PolicyOutcome {
        let mut outcome = self.decide(request, instance);
        if outcome.decision == NavigationDecision::Allow && !request.has_target_frame {
            outcome.decision = NavigationDecision::CancelAndReload(request.url.clone());
        }
        debug!(url = %request.url, decision = ?outcome.decision, "navigation policy");
        outcome
    }

    fn decide(
        &self,
        request: &NavigationRequest,
        instance: Option<&InstanceMetadata>,
    ) -> PolicyOutcome {
        let url = &request.url;

        // The origin is still being established.
        let Some(instance) = instance else {
            return PolicyOutcome::allow();
        };

        if url.scheme() == "mailto" {
            return PolicyOutcome::cancel_with(NavigationEvent::Mailto(url.clone()));
        }

        if url.as_str() == "about:blank" {
            return PolicyOutcome::allow();
        }

        if self.classifier.is_oauth_url(url) {
            return PolicyOutcome::allow();
        }

        if request.is_user_activated && !instance.owns(url) && !self.is_development_url(url) {
            return PolicyOutcome::cancel_with(NavigationEvent::ExternalSite(url.clone()));
        }

        PolicyOutcome::allow()
    }

    fn is_development_url(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.development_hosts.iter().any(|dev| dev == host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    fn dev_to() -> InstanceMetadata {
        InstanceMetadata::new("dev.to")
    }

    #[test]
    fn external_link_is_cancelled_with_event() {
        let policy = NavigationPolicy::default();
        let target = url("https://external.example.com");
        let outcome = policy.evaluate(&NavigationRequest::link(target.clone()), Some(&dev_to()));
        assert_eq!(outcome.decision, NavigationDecision::Cancel);
        assert_eq!(outcome.event, Some(NavigationEvent::ExternalSite(target)));
    }

    #[test]
    fn instance_link_is_allowed() {
        let policy = NavigationPolicy::default();
        let outcome = policy.evaluate(
            &NavigationRequest::link(url("https://dev.to/anything")),
            Some(&dev_to()),
        );
        assert_eq!(outcome, PolicyOutcome::allow());
    }

    #[test]
    fn mailto_is_cancelled_with_event() {
        let policy = NavigationPolicy::default();
        let target = url("mailto:a@b.com");
        let outcome = policy.evaluate(&NavigationRequest::link(target.clone()), Some(&dev_to()));
        assert_eq!(outcome.decision, NavigationDecision::Cancel);
        assert_eq!(outcome.event, Some(NavigationEvent::Mailto(target)));
    }

    #[test]
    fn anything_goes_before_metadata_is_known() {
        let policy = NavigationPolicy::default();
        for raw in ["https://external.example.com", "mailto:a@b.com", "https://dev.to"] {
            let outcome = policy.evaluate(&NavigationRequest::link(url(raw)), None);
            assert_eq!(outcome, PolicyOutcome::allow(), "{raw}");
        }
    }

    #[test]
    fn oauth_and_blank_are_allowed() {
        let policy = NavigationPolicy::default();
        for raw in [
            "about:blank",
            "https://github.com/login?return_to=x",
            "https://m.facebook.com/v9.0/dialog/oauth",
        ] {
            let outcome = policy.evaluate(&NavigationRequest::link(url(raw)), Some(&dev_to()));
            assert_eq!(outcome, PolicyOutcome::allow(), "{raw}");
        }
    }

    #[test]
    fn redirects_and_dev_hosts_stay_in_app() {
        let policy = NavigationPolicy::default();
        let redirect = NavigationRequest::redirect(url("https://cdn.example.com/frame"));
        assert_eq!(policy.evaluate(&redirect, Some(&dev_to())), PolicyOutcome::allow());

        let local = NavigationRequest::link(url("http://localhost:3000/admin"));
        assert_eq!(policy.evaluate(&local, Some(&dev_to())), PolicyOutcome::allow());
    }

    #[test]
    fn missing_target_frame_reloads_in_place() {
        let policy = NavigationPolicy::default();
        let target = url("https://dev.to/new");
        let request = NavigationRequest {
            has_target_frame: false,
            ..NavigationRequest::link(target.clone())
        };
        let outcome = policy.evaluate(&request, Some(&dev_to()));
        assert_eq!(outcome.decision, NavigationDecision::CancelAndReload(target));

        // A cancelled external link stays cancelled.
        let external = NavigationRequest {
            has_target_frame: false,
            ..NavigationRequest::link(url("https://external.example.com"))
        };
        assert_eq!(
            policy.evaluate(&external, Some(&dev_to())).decision,
            NavigationDecision::Cancel
        );
    }
}
