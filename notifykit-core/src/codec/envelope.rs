//! Envelope wire format: `[12-byte nonce][ciphertext][16-byte tag]`.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::DecryptError;

/// Nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Bytes an envelope adds on top of the plaintext.
pub const ENVELOPE_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// One sealed payload: nonce, ciphertext and tag, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope(Vec<u8>);

impl EncryptedEnvelope {
    /// Wraps envelope bytes received from the wire. Layout is checked when
    /// the envelope is opened.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Decodes a standard-alphabet base64 envelope.
    ///
    /// # Errors
    ///
    /// Returns the decoder error if `encoded` is not valid base64.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(encoded.trim()).map(Self)
    }

    /// Encodes the envelope as standard-alphabet base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Returns the raw envelope bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the envelope, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Total envelope length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for an empty envelope.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn assemble(nonce: &[u8; NONCE_LEN], sealed: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(NONCE_LEN + sealed.len());
        bytes.extend_from_slice(nonce);
        bytes.extend_from_slice(sealed);
        Self(bytes)
    }
}

impl AsRef<[u8]> for EncryptedEnvelope {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Splits an envelope into its nonce and `ciphertext || tag`.
pub fn split(envelope: &[u8]) -> Result<(&[u8], &[u8]), DecryptError> {
    if envelope.len() < ENVELOPE_OVERHEAD {
        return Err(DecryptError::MalformedEnvelope {
            len: envelope.len(),
            min: ENVELOPE_OVERHEAD,
        });
    }
    Ok(envelope.split_at(NONCE_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_layout() {
        let mut bytes = vec![0xAA; NONCE_LEN];
        bytes.extend_from_slice(b"ct");
        bytes.extend_from_slice(&[0xBB; TAG_LEN]);
        let (nonce, sealed) = split(&bytes).unwrap();
        assert_eq!(nonce, &[0xAA; NONCE_LEN]);
        assert_eq!(sealed.len(), 2 + TAG_LEN);
        assert_eq!(&sealed[..2], b"ct");
    }

    #[test]
    fn test_split_accepts_empty_ciphertext() {
        let bytes = [0u8; ENVELOPE_OVERHEAD];
        let (_, sealed) = split(&bytes).unwrap();
        assert_eq!(sealed.len(), TAG_LEN);
    }

    #[test]
    fn test_split_rejects_short_envelope() {
        assert_eq!(
            split(&[0u8; ENVELOPE_OVERHEAD - 1]),
            Err(DecryptError::MalformedEnvelope { len: 27, min: 28 })
        );
        assert!(split(&[]).is_err());
    }

    #[test]
    fn test_base64_transport() {
        let envelope = EncryptedEnvelope::assemble(&[1u8; NONCE_LEN], &[2u8; TAG_LEN]);
        let encoded = envelope.to_base64();
        assert_eq!(EncryptedEnvelope::from_base64(&encoded).unwrap(), envelope);
        assert!(EncryptedEnvelope::from_base64("not base64!").is_err());
    }
}
