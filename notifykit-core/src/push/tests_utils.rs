use std::sync::{Arc, Mutex};

use super::{NotificationDecryptFlow, PayloadConsumer};
use crate::error::FlowError;
use crate::keystore::{KeyAlias, MemoryKeyProvider, SecureKeyStore};

#[derive(Default)]
pub struct RecordingConsumer {
    pub plaintexts: Mutex<Vec<(KeyAlias, Vec<u8>)>>,
    pub failures: Mutex<Vec<(KeyAlias, FlowError)>>,
}

impl PayloadConsumer for RecordingConsumer {
    fn on_plaintext(&self, topic: &KeyAlias, plaintext: Vec<u8>) {
        self.plaintexts
            .lock()
            .unwrap()
            .push((topic.clone(), plaintext));
    }

    fn on_failure(&self, topic: &KeyAlias, error: &FlowError) {
        self.failures
            .lock()
            .unwrap()
            .push((topic.clone(), error.clone()));
    }
}

pub struct FlowFixture {
    pub provider: Arc<MemoryKeyProvider>,
    pub store: Arc<SecureKeyStore>,
    pub consumer: Arc<RecordingConsumer>,
    pub flow: NotificationDecryptFlow,
}

pub fn flow_fixture() -> FlowFixture {
    let provider = Arc::new(MemoryKeyProvider::new());
    let store = Arc::new(SecureKeyStore::new(provider.clone()));
    let consumer = Arc::new(RecordingConsumer::default());
    let flow = NotificationDecryptFlow::new(Arc::clone(&store), consumer.clone());
    FlowFixture {
        provider,
        store,
        consumer,
        flow,
    }
}
