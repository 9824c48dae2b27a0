use std::collections::HashMap;
use std::sync::Arc;

use super::NotifyKeyStore;
use crate::error::NotifyKitResult;
use crate::push::{
    Delivery, DeliveryFailure, ForeignListener, NotificationDecryptFlow, NotificationListener,
    PushReceiver,
};
use crate::worker::{
    ForeignTaskRegistry, PlatformTaskRegistry, StartOutcome, StopOutcome, WorkerCoordinator,
};

/// What happened to one push message.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct DeliveryReport {
    /// Outcome of the worker start, absent if the registry failed.
    pub worker: Option<StartOutcome>,
    /// Why the worker could not be started.
    pub worker_error: Option<String>,
    /// Why no plaintext was delivered, absent on success.
    pub failure: Option<DeliveryFailure>,
}

impl From<Delivery> for DeliveryReport {
    fn from(delivery: Delivery) -> Self {
        let (worker, worker_error) = match delivery.worker {
            Ok(outcome) => (Some(outcome), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            worker,
            worker_error,
            failure: delivery.decrypt.as_ref().err().map(DeliveryFailure::from),
        }
    }
}

/// Entry point for the push transport's message callback.
#[derive(uniffi::Object)]
pub struct NotifyPushReceiver {
    coordinator: Arc<WorkerCoordinator>,
    receiver: PushReceiver,
}

#[uniffi::export]
impl NotifyPushReceiver {
    /// Wires the key store, the platform task registry and the listener.
    #[uniffi::constructor]
    #[must_use]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(
        key_store: Arc<NotifyKeyStore>,
        registry: Arc<dyn PlatformTaskRegistry>,
        listener: Arc<dyn NotificationListener>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(WorkerCoordinator::new(Arc::new(ForeignTaskRegistry::new(
            registry,
        ))));
        let flow = NotificationDecryptFlow::new(
            Arc::clone(key_store.key_store()),
            Arc::new(ForeignListener::new(listener)),
        );
        Arc::new(Self {
            receiver: PushReceiver::new(Arc::clone(&coordinator), flow),
            coordinator,
        })
    }

    /// Handles the data map of one push message.
    ///
    /// The listener hears about the payload whatever the worker outcome.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotifyKitError::InvalidInput`] if the data map names
    /// no topic or carries no base64 blob. Nothing is dispatched then.
    #[allow(clippy::needless_pass_by_value)]
    pub fn on_message(&self, data: HashMap<String, String>) -> NotifyKitResult<DeliveryReport> {
        Ok(self.receiver.receive_data(&data)?.into())
    }

    /// Returns whether the background worker is running.
    ///
    /// # Errors
    ///
    /// Returns [`crate::NotifyKitError::RegistryUnavailable`] if the platform
    /// registry cannot be queried.
    pub fn is_worker_running(&self) -> NotifyKitResult<bool> {
        Ok(self.coordinator.is_running()?)
    }

    /// Stops the background worker if it is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform registry cannot be queried or updated.
    pub fn stop_worker(&self) -> NotifyKitResult<StopOutcome> {
        Ok(self.coordinator.stop()?)
    }
}
