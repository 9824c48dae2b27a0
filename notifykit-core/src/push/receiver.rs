use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use super::{NotificationDecryptFlow, PushMessage};
use crate::error::{FlowResult, WorkerResult};
use crate::worker::{StartOutcome, WorkerCoordinator};

/// What happened to one push trigger.
#[derive(Debug)]
pub struct Delivery {
    /// Outcome of the duplicate-start check for the background worker.
    pub worker: WorkerResult<StartOutcome>,
    /// Outcome of the decrypt flow.
    pub decrypt: FlowResult<()>,
}

/// Fans one push trigger out to the worker coordinator and the decrypt flow.
///
/// The coordinator is always consulted first, whatever the decrypt outcome,
/// so a duplicate worker is never scheduled.
pub struct PushReceiver {
    coordinator: Arc<WorkerCoordinator>,
    flow: NotificationDecryptFlow,
}

impl PushReceiver {
    /// Creates a receiver.
    #[must_use]
    pub const fn new(coordinator: Arc<WorkerCoordinator>, flow: NotificationDecryptFlow) -> Self {
        Self { coordinator, flow }
    }

    /// Handles one decoded push message.
    pub fn receive(&self, message: PushMessage) -> Delivery {
        let worker = self.coordinator.start();
        if let Err(err) = &worker {
            tracing::warn!(error = %err, "background worker could not be started");
        }
        let decrypt = self.flow.handle(message);
        Delivery { worker, decrypt }
    }

    /// Parses the transport's data map and handles the message.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FlowError::InvalidMessage`] if the data map is not a
    /// valid push message. Nothing is dispatched in that case.
    pub fn receive_data<S: BuildHasher>(
        &self,
        data: &HashMap<String, String, S>,
    ) -> FlowResult<Delivery> {
        let message = PushMessage::from_data(data)?;
        Ok(self.receive(message))
    }
}
