//! Authenticated payload codec.
//!
//! ChaCha20-Poly1305 (RFC 8439) with a 256-bit key, a fresh random 96-bit
//! nonce per call and a 128-bit tag. Associated data is authenticated but not
//! encrypted. Every call is a pure function of its inputs; nothing is shared
//! between calls except the key handle's usage counter.
//!
//! Device-backed handles seal and open inside the platform keystore, which
//! must produce the same envelope layout; the codec checks the length of what
//! comes back and maps the keystore's failures onto [`DecryptError`].
//!
//! The codec does not remember nonces. With random nonces the collision
//! bound is reached around 2^32 envelopes per key, so
//! [`KeyHandle::needs_rotation`] flips and a warning is logged once a key
//! crosses [`NONCE_ROTATION_THRESHOLD`].

mod envelope;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;

pub use envelope::{EncryptedEnvelope, ENVELOPE_OVERHEAD, NONCE_LEN, TAG_LEN};

use crate::error::{CryptoBackendError, DecryptError, NotifyKitError};
use crate::keystore::{
    DeviceKeystore, KeyAlias, KeyBacking, KeyHandle, KEY_LEN, NONCE_ROTATION_THRESHOLD,
};

fn cipher(key: &[u8; KEY_LEN]) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(Key::from_slice(key))
}

fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoBackendError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|err| CryptoBackendError::Randomness(err.to_string()))?;
    Ok(nonce)
}

/// Seals `plaintext` under the key behind `handle`.
///
/// Returns `nonce || ciphertext || tag`, exactly
/// `plaintext.len() + ENVELOPE_OVERHEAD` bytes. Two calls with the same input
/// produce different envelopes.
///
/// # Errors
///
/// Returns [`CryptoBackendError`] if no nonce can be drawn or the cipher
/// refuses the input.
pub fn encrypt(
    handle: &KeyHandle,
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<EncryptedEnvelope, CryptoBackendError> {
    let envelope = match handle.backing() {
        KeyBacking::Software(secret) => {
            seal_in_process(secret.expose_secret(), plaintext, associated_data)?
        }
        KeyBacking::Device(keystore) => {
            seal_on_device(keystore.as_ref(), handle.alias(), plaintext, associated_data)?
        }
    };

    let count = handle.record_encryption();
    if count == NONCE_ROTATION_THRESHOLD + 1 {
        tracing::warn!(
            alias = %handle.alias(),
            count,
            "key exceeded its random nonce budget and should be rotated"
        );
    }

    Ok(envelope)
}

fn seal_in_process(
    key: &[u8; KEY_LEN],
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<EncryptedEnvelope, CryptoBackendError> {
    let nonce = generate_nonce()?;
    let sealed = cipher(key)
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: associated_data,
            },
        )
        .map_err(|_| {
            CryptoBackendError::Encryption("ChaCha20-Poly1305 encryption failed".to_string())
        })?;
    Ok(EncryptedEnvelope::assemble(&nonce, &sealed))
}

fn seal_on_device(
    keystore: &dyn DeviceKeystore,
    alias: &KeyAlias,
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<EncryptedEnvelope, CryptoBackendError> {
    let sealed = keystore
        .seal(alias.to_string(), associated_data.to_vec(), plaintext.to_vec())
        .map_err(|err| CryptoBackendError::Encryption(format!("device keystore: {err}")))?;
    let expected = plaintext.len() + ENVELOPE_OVERHEAD;
    if sealed.len() != expected {
        return Err(CryptoBackendError::Encryption(format!(
            "device keystore returned a {}-byte envelope, expected {expected}",
            sealed.len()
        )));
    }
    Ok(EncryptedEnvelope::from_bytes(sealed))
}

/// Opens an envelope sealed by [`encrypt`].
///
/// The tag is verified in constant time before any plaintext is released.
///
/// # Errors
///
/// - [`DecryptError::MalformedEnvelope`] if `envelope` is shorter than
///   [`ENVELOPE_OVERHEAD`].
/// - [`DecryptError::TagMismatch`] if any byte of the envelope or the
///   associated data differs from what was sealed, or the envelope was sealed
///   under another key.
/// - [`DecryptError::KeyMismatch`] if the device keystore reports the key as
///   invalidated or missing.
/// - [`DecryptError::BackendUnavailable`] if the device keystore cannot be
///   reached.
pub fn decrypt(
    handle: &KeyHandle,
    envelope: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let (nonce, sealed) = envelope::split(envelope)?;
    match handle.backing() {
        KeyBacking::Software(secret) => cipher(secret.expose_secret())
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: associated_data,
                },
            )
            .map_err(|_| DecryptError::TagMismatch),
        KeyBacking::Device(keystore) => keystore
            .open_sealed(
                handle.alias().to_string(),
                associated_data.to_vec(),
                envelope.to_vec(),
            )
            .map_err(|err| open_error(&err)),
    }
}

fn open_error(err: &NotifyKitError) -> DecryptError {
    match err {
        NotifyKitError::AuthenticationFailed | NotifyKitError::MalformedEnvelope { .. } => {
            DecryptError::TagMismatch
        }
        NotifyKitError::KeyInvalidated | NotifyKitError::KeyNotFound { .. } => {
            DecryptError::KeyMismatch
        }
        other => DecryptError::BackendUnavailable(other.to_string()),
    }
}
