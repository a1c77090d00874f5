//! Speech recognition authorization.
//!
//! Recording never starts until the user has granted access to speech
//! recognition. The [`AuthorizationProvider`] contract hides where that
//! decision comes from; the default [`ConsentAuthorization`] derives it
//! from recorded consent in the config file plus a probe for a usable
//! input device. The status callback may run on any thread, so callers
//! must marshal it back to their own event loop.

use std::sync::Arc;
use std::thread;

use crate::config::AuthConfig;

/// Outcome of an authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user granted access; recording may start.
    Authorized,
    /// The user explicitly declined access.
    Denied,
    /// Recognition is blocked on this machine (no usable input device).
    Restricted,
    /// The user has not answered the consent question yet.
    NotDetermined,
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationStatus::Authorized => write!(f, "authorized"),
            AuthorizationStatus::Denied => write!(f, "denied"),
            AuthorizationStatus::Restricted => write!(f, "restricted"),
            AuthorizationStatus::NotDetermined => write!(f, "not determined"),
        }
    }
}

pub type AuthorizationCallback = Box<dyn FnOnce(AuthorizationStatus) + Send>;

/// Source of the user's speech recognition authorization decision.
pub trait AuthorizationProvider {
    /// Request authorization and deliver the resulting status through
    /// `callback`, possibly on a different thread than the caller's.
    fn request_authorization(&self, callback: AuthorizationCallback);
}

type DeviceProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// Authorization derived from recorded consent and a device probe.
pub struct ConsentAuthorization {
    consent: Option<bool>,
    probe: DeviceProbe,
}

impl ConsentAuthorization {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            consent: config.consent,
            probe: Arc::new(default_input_probe),
        }
    }

    /// Replace the input device probe. Used by tests and by hosts that
    /// know their capture setup without touching the audio backend.
    pub fn with_probe(config: &AuthConfig, probe: DeviceProbe) -> Self {
        Self {
            consent: config.consent,
            probe,
        }
    }

    fn evaluate(consent: Option<bool>, has_input: bool) -> AuthorizationStatus {
        match consent {
            None => AuthorizationStatus::NotDetermined,
            Some(false) => AuthorizationStatus::Denied,
            Some(true) if !has_input => AuthorizationStatus::Restricted,
            Some(true) => AuthorizationStatus::Authorized,
        }
    }
}

impl AuthorizationProvider for ConsentAuthorization {
    fn request_authorization(&self, callback: AuthorizationCallback) {
        // Probing audio devices can block, so the whole evaluation runs
        // off the caller's thread and the callback fires from there.
        let consent = self.consent;
        let probe = Arc::clone(&self.probe);
        thread::spawn(move || {
            let has_input = consent == Some(true) && probe();
            callback(Self::evaluate(consent, has_input));
        });
    }
}

fn default_input_probe() -> bool {
    use cpal::traits::HostTrait;

    let host = cpal::default_host();
    match host.input_devices() {
        Ok(mut devices) => devices.next().is_some(),
        Err(_) => false,
    }
}
