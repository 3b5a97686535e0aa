// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OAuth redirect classification.
//
// Navigations into a third-party login flow must never be intercepted as
// "external site" links. Matching is by fixed prefixes and one pattern over the
// serialized URL; no network access.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Third-party authentication providers recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvider {
    GitHub,
    Twitter,
    Facebook,
    Google,
    /// The first-party Forem passport account provider.
    ForemPassport,
}

/// GitHub login, 2FA (`/sessions/two-factor`) and session error pages.
const GITHUB_PREFIXES: [&str; 2] = ["https://github.com/login", "https://github.com/session"];

/// Twitter OAuth and its login error page.
const TWITTER_PREFIXES: [&str; 2] = [
    "https://api.twitter.com/oauth",
    "https://twitter.com/login/error",
];

const GOOGLE_PREFIX: &str = "https://accounts.google.com";

/// Facebook dialog URLs carry the Graph API version, which changes over time.
fn facebook_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://(www|m)\.facebook\.com/(v\d+\.\d+/dialog/oauth|login\.php)")
            .expect("facebook OAuth pattern is valid")
    })
}

/// Pure predicate over URLs identifying OAuth redirect pages.
#[derive(Debug, Clone)]
pub struct AuthUrlClassifier {
    passport_prefix: String,
}

impl Default for AuthUrlClassifier {
    fn default() -> Self {
        Self::new(forem_core::BridgeConfig::default().passport_oauth_prefix)
    }
}

impl AuthUrlClassifier {
    pub fn new(passport_prefix: impl Into<String>) -> Self {
        Self {
            passport_prefix: passport_prefix.into(),
        }
    }

    /// Provider whose login flow `url` belongs to, if any.
    pub fn classify(&self, url: &Url) -> Option<AuthProvider> {
        self.classify_str(url.as_str())
    }

    /// Same as [`classify`](Self::classify) on an already serialized URL.
    pub fn classify_str(&self, url: &str) -> Option<AuthProvider> {
        if GITHUB_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
            Some(AuthProvider::GitHub)
        } else if TWITTER_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
            Some(AuthProvider::Twitter)
        } else if facebook_pattern().is_match(url) {
            Some(AuthProvider::Facebook)
        } else if url.starts_with(GOOGLE_PREFIX) {
            Some(AuthProvider::Google)
        } else if !self.passport_prefix.is_empty() && url.starts_with(&self.passport_prefix) {
            Some(AuthProvider::ForemPassport)
        } else {
            None
        }
    }

    pub fn is_oauth_url(&self, url: &Url) -> bool {
        self.classify(url).is_some()
    }
}
