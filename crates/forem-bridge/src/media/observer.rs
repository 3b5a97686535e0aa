// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Periodic tick observers polled by the bridge loop.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of polling an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverPoll {
    /// Not due yet.
    Idle,
    /// Due: run the tick callback.
    Fire,
    /// Cancelled from outside; the owner must drop the observer.
    Released,
}

/// A scheduler entry firing every `interval` until cancelled.
///
/// The token is checked before every firing, so a cancellation set from the
/// presentation layer stops the callbacks without any bridge call. Dropping
/// the observer cancels the token.
#[derive(Debug)]
pub struct TickObserver {
    interval: Duration,
    next_due: Instant,
    token: CancellationToken,
}

impl TickObserver {
    /// First firing one `interval` after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self::with_token(interval, now, CancellationToken::new())
    }

    pub fn with_token(interval: Duration, now: Instant, token: CancellationToken) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        Self {
            interval,
            next_due: now + interval,
            token,
        }
    }

    pub fn poll(&mut self, now: Instant) -> ObserverPoll {
        if self.token.is_cancelled() {
            return ObserverPoll::Released;
        }
        if now < self.next_due {
            return ObserverPoll::Idle;
        }
        // Missed periods collapse into a single firing.
        while self.next_due <= now {
            self.next_due += self.interval;
        }
        ObserverPoll::Fire
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for TickObserver {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let start = Instant::now();
        let mut observer = TickObserver::new(Duration::from_millis(500), start);
        assert_eq!(observer.poll(start), ObserverPoll::Idle);
        assert_eq!(observer.poll(start + Duration::from_millis(500)), ObserverPoll::Fire);
        assert_eq!(observer.poll(start + Duration::from_millis(600)), ObserverPoll::Idle);
        // Three missed periods, one firing.
        assert_eq!(observer.poll(start + Duration::from_millis(2100)), ObserverPoll::Fire);
        assert_eq!(observer.poll(start + Duration::from_millis(2200)), ObserverPoll::Idle);
        assert_eq!(observer.next_due(), start + Duration::from_millis(2500));
    }

    #[test]
    fn cancellation_releases_before_firing() {
        let start = Instant::now();
        let token = CancellationToken::new();
        let mut observer =
            TickObserver::with_token(Duration::from_secs(1), start, token.clone());
        token.cancel();
        assert_eq!(observer.poll(start + Duration::from_secs(5)), ObserverPoll::Released);
    }

    #[test]
    fn drop_cancels_shared_token() {
        let token = CancellationToken::new();
        let observer =
            TickObserver::with_token(Duration::from_secs(1), Instant::now(), token.clone());
        drop(observer);
        assert!(token.is_cancelled());
    }
}
