// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Push notification device registration against the hosted session.
//
// Registration POSTs the device token with the page's CSRF token and retries
// with exponential backoff until acknowledged. A stale token is the usual
// cause of failure, so the token is read again before every attempt.

use std::sync::Arc;

use forem_core::config::BridgeConfig;
use forem_core::error::{BridgeError, Result};
use forem_core::types::{DeviceRegistration, InstanceMetadata, UserSession};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::retry::{RetryConfig, RetryDecision, should_retry};
use crate::scripts;
use crate::traits::{NetworkTransport, RenderingSurface};

/// One cancellable registration with retry.
#[derive(Debug, Clone)]
pub struct RegistrationJob {
    /// Matches the completion back to the registrar's current job.
    pub id: u64,
    pub endpoint: Url,
    pub registration: DeviceRegistration,
    pub retry: RetryConfig,
    pub cancel: CancellationToken,
}

impl RegistrationJob {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn run(
        self,
        surface: Arc<dyn RenderingSurface>,
        transport: Arc<dyn NetworkTransport>,
    ) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            let result = match read_csrf_token(surface.as_ref()).await {
                Ok(csrf_token) => {
                    transport
                        .register_device(&self.endpoint, &csrf_token, &self.registration)
                        .await
                }
                Err(e) => Err(e),
            };

            let err = match result {
                Ok(()) => {
                    info!(attempt, "device registered");
                    return Ok(());
                }
                Err(e) => e,
            };

            match should_retry(&err, attempt, &self.retry) {
                RetryDecision::RetryAfter(delay) => {
                    debug!(attempt, error = %err, "device registration failed, backing off");
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(BridgeError::Registration("cancelled".into()));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            }
            attempt += 1;
        }
    }
}

/// DELETE of a confirmed registration.
#[derive(Debug, Clone)]
pub struct UnregisterJob {
    pub endpoint: Url,
    pub registration: DeviceRegistration,
}

impl UnregisterJob {
    pub async fn run(self, transport: Arc<dyn NetworkTransport>) -> Result<()> {
        transport
            .unregister_device(&self.endpoint, &self.registration)
            .await
    }
}

async fn read_csrf_token(surface: &dyn RenderingSurface) -> Result<String> {
    match surface
        .evaluate_script(scripts::wrapped(scripts::CSRF_TOKEN))
        .await?
    {
        Some(serde_json::Value::String(token)) if !token.is_empty() => Ok(token),
        _ => Err(BridgeError::MissingSession),
    }
}

/// Registration state owned by the bridge loop.
#[derive(Debug)]
pub struct DeviceRegistrar {
    config: BridgeConfig,
    retry: RetryConfig,
    device_token: Option<String>,
    confirmed: bool,
    next_job: u64,
    in_flight: Option<(u64, CancellationToken)>,
}

impl DeviceRegistrar {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            retry: RetryConfig::from_config(config),
            config: config.clone(),
            device_token: None,
            confirmed: false,
            next_job: 0,
            in_flight: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The server acknowledged the current device token.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    fn registration(&self, token: &str) -> DeviceRegistration {
        DeviceRegistration {
            token: token.to_string(),
            platform: self.config.push_platform.clone(),
            app_bundle: self.config.app_bundle.clone(),
        }
    }

    /// Start registering `token`. No-op once the same token is confirmed.
    pub fn register(
        &mut self,
        token: String,
        instance: Option<&InstanceMetadata>,
    ) -> Result<Option<RegistrationJob>> {
        if self.confirmed && self.device_token.as_deref() == Some(token.as_str()) {
            debug!("device registration already confirmed");
            return Ok(None);
        }
        let instance = instance.ok_or(BridgeError::MissingSession)?;
        let endpoint = self
            .config
            .instance_base_url(instance)?
            .join(&self.config.devices_path)?;

        self.cancel();
        self.confirmed = false;
        let cancel = CancellationToken::new();
        self.next_job += 1;
        let id = self.next_job;
        self.in_flight = Some((id, cancel.clone()));
        let registration = self.registration(&token);
        self.device_token = Some(token);

        Ok(Some(RegistrationJob {
            id,
            endpoint,
            registration,
            retry: self.retry.clone(),
            cancel,
        }))
    }

    /// Apply the outcome of job `id`. Outcomes of superseded or cancelled
    /// jobs leave the current registration untouched.
    pub fn finish_registration(&mut self, id: u64, result: Result<()>) {
        if !matches!(self.in_flight, Some((current, _)) if current == id) {
            debug!(job = id, "ignoring outcome of superseded registration");
            return;
        }
        self.in_flight = None;
        match result {
            Ok(()) => self.confirmed = true,
            Err(e) => warn!(error = %e, "device registration abandoned"),
        }
    }

    /// Withdraw the confirmed registration of `user`. Unconfirmed
    /// registrations have nothing to delete.
    pub fn unregister(
        &mut self,
        user: &UserSession,
        instance: Option<&InstanceMetadata>,
    ) -> Result<Option<UnregisterJob>> {
        self.cancel();
        if !self.confirmed {
            return Ok(None);
        }
        let Some(token) = self.device_token.clone() else {
            return Ok(None);
        };
        let instance = instance.ok_or(BridgeError::MissingSession)?;
        let path = format!(
            "{}/{}",
            self.config.devices_path.trim_end_matches('/'),
            user.user_id
        );
        let endpoint = self.config.instance_base_url(instance)?.join(&path)?;
        self.confirmed = false;
        Ok(Some(UnregisterJob {
            endpoint,
            registration: self.registration(&token),
        }))
    }

    /// Stop any pending retry loop.
    pub fn cancel(&mut self) {
        if let Some((_, cancel)) = self.in_flight.take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::test_support::{FakeSurface, FakeTransport};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: None,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    fn dev_to() -> InstanceMetadata {
        InstanceMetadata::new("dev.to")
    }

    #[test]
    fn register_targets_devices_endpoint() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        let job = registrar
            .register("apns-token".into(), Some(&dev_to()))
            .unwrap()
            .unwrap();
        assert_eq!(job.endpoint.as_str(), "https://dev.to/users/devices");
        assert_eq!(
            job.registration,
            DeviceRegistration {
                token: "apns-token".into(),
                platform: "iOS".into(),
                app_bundle: "com.forem.app".into(),
            }
        );
    }

    #[test]
    fn register_requires_instance() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        assert!(matches!(
            registrar.register("t".into(), None),
            Err(BridgeError::MissingSession)
        ));
    }

    #[test]
    fn confirmed_flag_gates_register_and_unregister() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        let user = UserSession::new(42, "");

        assert!(registrar.unregister(&user, Some(&dev_to())).unwrap().is_none());

        let job = registrar.register("t".into(), Some(&dev_to())).unwrap().unwrap();
        registrar.finish_registration(job.id, Ok(()));
        assert!(registrar.is_confirmed());
        assert!(registrar.register("t".into(), Some(&dev_to())).unwrap().is_none());

        let job = registrar.unregister(&user, Some(&dev_to())).unwrap().unwrap();
        assert_eq!(job.endpoint.as_str(), "https://dev.to/users/devices/42");
        assert!(!registrar.is_confirmed());
    }

    #[test]
    fn new_registration_cancels_previous_retry() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        let first = registrar.register("a".into(), Some(&dev_to())).unwrap().unwrap();
        registrar.register("b".into(), Some(&dev_to())).unwrap();
        assert!(first.cancel.is_cancelled());
    }

    #[test]
    fn superseded_failure_keeps_live_job_cancellable() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        let first = registrar.register("a".into(), Some(&dev_to())).unwrap().unwrap();
        let second = registrar.register("b".into(), Some(&dev_to())).unwrap().unwrap();
        assert_ne!(first.id, second.id);

        registrar.finish_registration(first.id, Err(BridgeError::Registration("cancelled".into())));
        registrar.cancel();
        assert!(second.cancel.is_cancelled());
    }

    #[test]
    fn superseded_success_does_not_confirm_live_job() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        let first = registrar.register("a".into(), Some(&dev_to())).unwrap().unwrap();
        let second = registrar.register("b".into(), Some(&dev_to())).unwrap().unwrap();

        registrar.finish_registration(first.id, Ok(()));
        assert!(!registrar.is_confirmed());
        assert!(!second.cancel.is_cancelled());

        registrar.finish_registration(second.id, Ok(()));
        assert!(registrar.is_confirmed());
    }

    #[test]
    fn cancelled_job_outcome_is_ignored() {
        let mut registrar = DeviceRegistrar::new(&BridgeConfig::default());
        let job = registrar.register("a".into(), Some(&dev_to())).unwrap().unwrap();
        registrar.cancel();
        registrar.finish_registration(job.id, Ok(()));
        assert!(!registrar.is_confirmed());
    }

    #[tokio::test]
    async fn retries_with_fresh_csrf_token_until_acknowledged() {
        let surface = FakeSurface::new();
        surface.respond(scripts::CSRF_TOKEN, json!("csrf"));
        let transport = FakeTransport::new();
        transport.fail_registrations(2);

        let mut registrar =
            DeviceRegistrar::new(&BridgeConfig::default()).with_retry(fast_retry());
        let job = registrar.register("t".into(), Some(&dev_to())).unwrap().unwrap();
        let job_id = job.id;
        let result = job.run(surface.clone(), transport.clone()).await;
        registrar.finish_registration(job_id, result);

        assert!(registrar.is_confirmed());
        assert_eq!(transport.registrations().len(), 3);
        assert_eq!(surface.evaluation_count(scripts::CSRF_TOKEN), 3);
        assert!(transport.registrations().iter().all(|(_, csrf, _)| csrf == "csrf"));
    }

    #[tokio::test]
    async fn missing_token_is_retried() {
        let surface = FakeSurface::new();
        let transport = FakeTransport::new();
        let mut registrar =
            DeviceRegistrar::new(&BridgeConfig::default()).with_retry(fast_retry());
        let job = registrar.register("t".into(), Some(&dev_to())).unwrap().unwrap();

        let handle = tokio::spawn(job.clone().run(surface.clone(), transport.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.registrations().is_empty());

        surface.respond(scripts::CSRF_TOKEN, json!("late"));
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(transport.registrations()[0].1, "late");
    }

    #[tokio::test]
    async fn cancellation_stops_the_retry_loop() {
        let surface = FakeSurface::new();
        let transport = FakeTransport::new();
        let mut registrar =
            DeviceRegistrar::new(&BridgeConfig::default()).with_retry(fast_retry());
        let job = registrar.register("t".into(), Some(&dev_to())).unwrap().unwrap();

        let handle = tokio::spawn(job.run(surface, transport));
        registrar.cancel();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(BridgeError::Registration(_))));
    }
}
