use std::sync::Arc;

use super::PayloadConsumer;
use crate::error::{DecryptError, FlowError, KeyError};
use crate::keystore::KeyAlias;

/// Category of a push payload that could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FailureKind {
    /// The data map was missing a field or carried an undecodable blob.
    InvalidMessage,
    /// No key has been generated for the topic.
    KeyNotFound,
    /// Secure storage could not be reached.
    StorageUnavailable,
    /// The blob is too short to be an envelope.
    MalformedEnvelope,
    /// The blob did not authenticate.
    AuthenticationFailed,
    /// The topic key was invalidated or does not match the blob.
    KeyMismatch,
}

/// Why a push payload produced no plaintext.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct DeliveryFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub detail: String,
    /// Whether the failure may indicate tampering.
    pub security_event: bool,
}

impl From<&FlowError> for DeliveryFailure {
    fn from(error: &FlowError) -> Self {
        let kind = match error {
            FlowError::InvalidMessage(_) | FlowError::Key(KeyError::InvalidAlias(_)) => {
                FailureKind::InvalidMessage
            }
            FlowError::Key(KeyError::NotFound { .. }) => FailureKind::KeyNotFound,
            FlowError::Key(KeyError::AlreadyExists { .. } | KeyError::BackingStoreUnavailable(_))
            | FlowError::Decrypt(DecryptError::BackendUnavailable(_)) => {
                FailureKind::StorageUnavailable
            }
            FlowError::Decrypt(DecryptError::MalformedEnvelope { .. }) => {
                FailureKind::MalformedEnvelope
            }
            FlowError::Decrypt(DecryptError::TagMismatch) => FailureKind::AuthenticationFailed,
            FlowError::Decrypt(DecryptError::KeyMismatch) => FailureKind::KeyMismatch,
        };
        Self {
            kind,
            detail: error.to_string(),
            security_event: error.is_security_event(),
        }
    }
}

/// Receives decrypted push payloads on the platform side.
#[uniffi::export(with_foreign)]
pub trait NotificationListener: Send + Sync {
    /// Called with the plaintext of a payload that authenticated.
    fn on_plaintext(&self, topic: String, plaintext: Vec<u8>);

    /// Called when a payload could not be opened.
    fn on_failure(&self, topic: String, failure: DeliveryFailure);
}

/// Forwards flow outcomes to a [`NotificationListener`].
pub struct ForeignListener {
    inner: Arc<dyn NotificationListener>,
}

impl ForeignListener {
    /// Wraps the host app's listener.
    #[must_use]
    pub const fn new(inner: Arc<dyn NotificationListener>) -> Self {
        Self { inner }
    }
}

impl PayloadConsumer for ForeignListener {
    fn on_plaintext(&self, topic: &KeyAlias, plaintext: Vec<u8>) {
        self.inner.on_plaintext(topic.to_string(), plaintext);
    }

    fn on_failure(&self, topic: &KeyAlias, error: &FlowError) {
        self.inner.on_failure(topic.to_string(), error.into());
    }
}
