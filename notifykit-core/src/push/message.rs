use std::collections::HashMap;
use std::hash::BuildHasher;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::keystore::KeyAlias;

/// Data-map field holding the topic.
pub const TOPIC_FIELD: &str = "topic";

/// Data-map field holding the base64 envelope.
pub const BLOB_FIELD: &str = "blob";

/// Older senders put the envelope under `message`.
pub const LEGACY_BLOB_FIELD: &str = "message";

/// A remote message as handed over by the push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    /// Alias of the key the blob was sealed under.
    pub topic: KeyAlias,
    /// The encrypted envelope.
    pub blob: Vec<u8>,
}

impl PushMessage {
    /// Builds a message from already-decoded parts.
    #[must_use]
    pub const fn new(topic: KeyAlias, blob: Vec<u8>) -> Self {
        Self { topic, blob }
    }

    /// Parses the string data map a push transport delivers.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidMessage`] if the topic or blob is missing,
    /// the topic is not a valid alias, or the blob is not base64.
    pub fn from_data<S: BuildHasher>(data: &HashMap<String, String, S>) -> FlowResult<Self> {
        let topic = data
            .get(TOPIC_FIELD)
            .ok_or_else(|| FlowError::InvalidMessage("missing topic".to_string()))?;
        let topic = KeyAlias::new(topic.as_str())
            .map_err(|err| FlowError::InvalidMessage(err.to_string()))?;

        let encoded = data
            .get(BLOB_FIELD)
            .or_else(|| data.get(LEGACY_BLOB_FIELD))
            .ok_or_else(|| FlowError::InvalidMessage(format!("missing blob for topic `{topic}`")))?;
        let blob = STANDARD.decode(encoded.trim()).map_err(|err| {
            FlowError::InvalidMessage(format!("blob for topic `{topic}` is not base64: {err}"))
        })?;

        Ok(Self { topic, blob })
    }
}

/// User-facing notification carried inside a decrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyMessage {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub body: String,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Link opened when the notification is tapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sender-defined notification type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl NotifyMessage {
    /// Decodes a JSON notification from decrypted plaintext.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the plaintext is not a notification object.
    pub fn from_plaintext(plaintext: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(plaintext)
    }
}
