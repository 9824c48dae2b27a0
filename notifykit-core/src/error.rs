//! Error types for the key store, payload codec, worker coordinator and
//! push decrypt flow.

use thiserror::Error;

use crate::keystore::KeyAlias;

/// Result type for key store operations.
pub type KeyResult<T> = Result<T, KeyError>;

/// Result type for worker coordination.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Result type for the push decrypt flow.
pub type FlowResult<T> = Result<T, FlowError>;

/// Result type for the exported API and the platform callbacks.
pub type NotifyKitResult<T> = Result<T, NotifyKitError>;

/// Errors raised by the secure key store and its storage providers.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum KeyError {
    /// No key has been generated under the alias.
    #[error("no key stored under alias `{alias}`")]
    NotFound {
        /// The alias that was looked up.
        alias: KeyAlias,
    },

    /// A key already exists under the alias. Keys are never overwritten.
    #[error("a key already exists under alias `{alias}`")]
    AlreadyExists {
        /// The alias that is already taken.
        alias: KeyAlias,
    },

    /// The alias is empty or contains control characters.
    #[error("invalid key alias: {0:?}")]
    InvalidAlias(String),

    /// The secure storage provider could not be reached, refused the
    /// operation, or the device lacks the required storage support.
    #[error("secure storage unavailable: {0}")]
    BackingStoreUnavailable(String),
}

impl KeyError {
    pub(crate) fn backing_store(reason: impl Into<String>) -> Self {
        Self::BackingStoreUnavailable(reason.into())
    }
}

/// Errors raised when opening an encrypted envelope.
///
/// No variant ever carries partially decrypted data.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum DecryptError {
    /// The authentication tag did not verify: the nonce, ciphertext, tag or
    /// associated data was altered, or the envelope was sealed under another key.
    #[error("authentication tag mismatch")]
    TagMismatch,

    /// The envelope is too short to hold a nonce and a tag.
    #[error("malformed envelope: {len} bytes, expected at least {min}")]
    MalformedEnvelope {
        /// Length of the envelope that was supplied.
        len: usize,
        /// Minimum envelope length.
        min: usize,
    },

    /// The key handle is known not to match the key the envelope was sealed
    /// under.
    #[error("envelope was sealed under a different key")]
    KeyMismatch,

    /// The device keystore holding the key could not open the envelope for a
    /// reason unrelated to its contents.
    #[error("device keystore unavailable: {0}")]
    BackendUnavailable(String),
}

impl DecryptError {
    /// Returns `true` for failures that indicate tampering or a key confusion,
    /// as opposed to a structurally broken input.
    #[must_use]
    pub const fn is_security_event(&self) -> bool {
        matches!(self, Self::TagMismatch | Self::KeyMismatch)
    }
}

/// The AEAD primitive or the system randomness source is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum CryptoBackendError {
    /// The cipher refused to seal the payload.
    #[error("encryption backend failure: {0}")]
    Encryption(String),

    /// No nonce could be drawn from the system RNG.
    #[error("randomness unavailable: {0}")]
    Randomness(String),
}

/// Errors raised by the worker coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum WorkerError {
    /// The running-task registry could not be queried or updated.
    #[error("task registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The worker could not be launched.
    #[error("worker launch failed: {0}")]
    LaunchFailed(String),
}

/// Errors reported by the push decrypt flow to its downstream consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum FlowError {
    /// The push message is missing a field or carries an undecodable blob.
    #[error("invalid push message: {0}")]
    InvalidMessage(String),

    /// The key for the topic could not be resolved.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The blob could not be opened.
    #[error(transparent)]
    Decrypt(#[from] DecryptError),
}

impl FlowError {
    /// Returns `true` when the failure should be treated as a possible
    /// tampering attempt rather than a transport or storage problem.
    #[must_use]
    pub const fn is_security_event(&self) -> bool {
        match self {
            Self::Decrypt(err) => err.is_security_event(),
            Self::InvalidMessage(_) | Self::Key(_) => false,
        }
    }
}

/// Error crossing the language boundary, in either direction.
///
/// Returned by the exported objects and thrown by the platform's
/// [`crate::keystore::DeviceKeystore`] and
/// [`crate::worker::PlatformTaskRegistry`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum NotifyKitError {
    /// No key exists under the alias.
    #[error("no key stored under alias `{alias}`")]
    KeyNotFound {
        /// The alias that was looked up.
        alias: String,
    },

    /// A key already exists under the alias.
    #[error("a key already exists under alias `{alias}`")]
    KeyAlreadyExists {
        /// The alias that is already taken.
        alias: String,
    },

    /// An argument was rejected.
    #[error("invalid input: {detail}")]
    InvalidInput {
        /// What was wrong with it.
        detail: String,
    },

    /// Secure storage could not be reached or refused the operation.
    #[error("secure storage unavailable: {detail}")]
    StorageUnavailable {
        /// Reason reported by the storage layer.
        detail: String,
    },

    /// The envelope or its associated data did not authenticate.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The key was invalidated by the platform (for example after a lock
    /// screen change) and can no longer open envelopes.
    #[error("key invalidated")]
    KeyInvalidated,

    /// The envelope is too short to be opened.
    #[error("malformed envelope: {detail}")]
    MalformedEnvelope {
        /// Length details.
        detail: String,
    },

    /// The cipher or the randomness source failed.
    #[error("crypto backend failure: {detail}")]
    Crypto {
        /// Reason reported by the backend.
        detail: String,
    },

    /// The running-task registry could not be queried or updated.
    #[error("task registry unavailable: {detail}")]
    RegistryUnavailable {
        /// Reason reported by the registry.
        detail: String,
    },

    /// The background worker could not be launched.
    #[error("worker launch failed: {detail}")]
    LaunchFailed {
        /// Reason reported by the platform.
        detail: String,
    },

    /// A platform callback failed in a way the bindings did not declare.
    #[error("unexpected uniffi callback error: {reason}")]
    UnexpectedCallback {
        /// Reason reported by the bindings.
        reason: String,
    },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for NotifyKitError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedCallback {
            reason: error.reason,
        }
    }
}

impl From<KeyError> for NotifyKitError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::NotFound { alias } => Self::KeyNotFound {
                alias: alias.into(),
            },
            KeyError::AlreadyExists { alias } => Self::KeyAlreadyExists {
                alias: alias.into(),
            },
            KeyError::InvalidAlias(_) => Self::InvalidInput {
                detail: error.to_string(),
            },
            KeyError::BackingStoreUnavailable(detail) => Self::StorageUnavailable { detail },
        }
    }
}

impl From<DecryptError> for NotifyKitError {
    fn from(error: DecryptError) -> Self {
        match error {
            DecryptError::TagMismatch => Self::AuthenticationFailed,
            DecryptError::KeyMismatch => Self::KeyInvalidated,
            DecryptError::MalformedEnvelope { .. } => Self::MalformedEnvelope {
                detail: error.to_string(),
            },
            DecryptError::BackendUnavailable(detail) => Self::StorageUnavailable { detail },
        }
    }
}

impl From<CryptoBackendError> for NotifyKitError {
    fn from(error: CryptoBackendError) -> Self {
        Self::Crypto {
            detail: error.to_string(),
        }
    }
}

impl From<WorkerError> for NotifyKitError {
    fn from(error: WorkerError) -> Self {
        match error {
            WorkerError::RegistryUnavailable(detail) => Self::RegistryUnavailable { detail },
            WorkerError::LaunchFailed(detail) => Self::LaunchFailed { detail },
        }
    }
}

impl From<FlowError> for NotifyKitError {
    fn from(error: FlowError) -> Self {
        match error {
            FlowError::InvalidMessage(detail) => Self::InvalidInput { detail },
            FlowError::Key(err) => err.into(),
            FlowError::Decrypt(err) => err.into(),
        }
    }
}
