//! Device Authenticator
//!
//! Orchestrates identity checks, challenge issue and verification. Session
//! state lives with the caller; this service only answers "did the device
//! prove itself" and the caller flips its session accordingly.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::challenge::{generate_code, Challenge, ChallengeStore};
use crate::domain::identity::DeviceIdentity;
use crate::domain::response::{expected_response, responses_match};
use crate::error::AuthError;
use crate::ports::{SystemTimeSource, TimeSource};
use crate::DEFAULT_CHALLENGE_TTL_SECS;

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Namespace for UUID v5 device identity derivation
    pub namespace: Uuid,
    /// Shared secret mixed into challenge responses
    pub secret: String,
    /// How long an issued challenge stays valid
    pub challenge_ttl: Duration,
}

impl AuthConfig {
    pub fn new(namespace: Uuid, secret: impl Into<String>) -> Self {
        Self {
            namespace,
            secret: secret.into(),
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECS),
        }
    }

    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("namespace", &self.namespace)
            .field("secret", &"<redacted>")
            .field("challenge_ttl", &self.challenge_ttl)
            .finish()
    }
}

/// Anything that can report whether its holder has authenticated.
pub trait SessionAuth {
    fn is_authenticated(&self) -> bool;
}

/// Guard for authenticated-only operations. Never mutates the session.
pub fn auth_check<S: SessionAuth + ?Sized>(session: &S) -> Result<(), AuthError> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(AuthError::Unauthorized)
    }
}

/// Challenge/response protocol driver.
pub struct DeviceAuthenticator {
    config: AuthConfig,
    challenges: ChallengeStore,
    time_source: Arc<dyn TimeSource>,
}

impl DeviceAuthenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(config: AuthConfig, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            challenges: ChallengeStore::new(),
            time_source,
        }
    }


    /// Issue a challenge to a device whose identity checks out.
    ///
    /// Any challenge already pending for the same device is replaced. The
    /// caller must reset its session to unauthenticated on success.
    pub fn request_challenge(&self, identity: &DeviceIdentity) -> Result<String, AuthError> {
        let device = identity.verify(&self.config.namespace).inspect_err(|e| {
            warn!(device_name = %identity.device_name, error = %e, "Rejected challenge request");
        })?;

        let code = generate_code();
        let replaced = self
            .challenges
            .issue(device, Challenge::new(code.clone(), self.time_source.now()));

        debug!(
            device = %device,
            replaced = replaced.is_some(),
            "Issued challenge"
        );

        Ok(code)
    }

    /// Verify a device's answer to its pending challenge.
    ///
    /// The pending challenge is consumed whatever the outcome.
    pub fn verify_challenge(
        &self,
        identity: &DeviceIdentity,
        response: &str,
    ) -> Result<(), AuthError> {
        let device = identity.claimed_uuid().ok_or(AuthError::ChallengeNotFound)?;
        let challenge = self
            .challenges
            .take(&device)
            .ok_or(AuthError::ChallengeNotFound)?;

        let now = self.time_source.now();
        let ttl = self.config.challenge_ttl;
        if challenge.is_expired(now, ttl) {
            warn!(device = %device, "Challenge expired before verification");
            return Err(AuthError::ChallengeExpired {
                age_ms: challenge.age(now).as_millis(),
                ttl_ms: ttl.as_millis(),
            });
        }

        let expected = expected_response(&challenge.code, &self.config.secret);
        if !responses_match(&expected, response) {
            warn!(device = %device, "Challenge response mismatch");
            return Err(AuthError::InvalidResponse);
        }

        info!(device = %device, device_name = %identity.device_name, "Device authenticated");
        Ok(())
    }

    /// Remove challenges that can no longer be answered.
    pub fn purge_expired(&self) -> usize {
        let removed = self
            .challenges
            .purge_expired(self.time_source.now(), self.config.challenge_ttl);
        if removed > 0 {
            debug!(removed, "Purged expired challenges");
        }
        removed
    }

    pub fn pending_challenges(&self) -> usize {
        self.challenges.len()
    }

    pub fn namespace(&self) -> &Uuid {
        &self.config.namespace
    }
}
