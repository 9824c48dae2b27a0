//! Background decryption worker coordination.
//!
//! [`WorkerCoordinator`] is a two-state machine (`Inactive`, `Active`) over a
//! [`TaskRegistry`]. The check-then-launch of [`WorkerCoordinator::start`] and
//! the check-then-stop of [`WorkerCoordinator::stop`] run under one mutex, so
//! concurrent push deliveries launch at most one worker.

mod platform;
mod registry;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strum::Display;

pub use platform::{ForeignTaskRegistry, PlatformTaskRegistry};
pub use registry::{MemoryTaskRegistry, TaskRegistry, WorkerIdentity};

use crate::error::WorkerResult;

/// Observed worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WorkerState {
    /// No worker is running.
    Inactive,
    /// The worker is running.
    Active,
}

/// Result of [`WorkerCoordinator::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, uniffi::Enum)]
#[strum(serialize_all = "snake_case")]
pub enum StartOutcome {
    /// The worker was launched by this call.
    Started,
    /// A worker was already running; nothing was launched.
    AlreadyRunning,
}

/// Result of [`WorkerCoordinator::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, uniffi::Enum)]
#[strum(serialize_all = "snake_case")]
pub enum StopOutcome {
    /// The running worker was stopped by this call.
    Stopped,
    /// No worker was running.
    AlreadyStopped,
}

/// Starts and stops the background decryption worker at most once.
pub struct WorkerCoordinator {
    registry: Arc<dyn TaskRegistry>,
    identity: WorkerIdentity,
    transition: Mutex<()>,
}

impl WorkerCoordinator {
    /// Coordinates the default decryption service.
    #[must_use]
    pub fn new(registry: Arc<dyn TaskRegistry>) -> Self {
        Self::with_identity(registry, WorkerIdentity::decryption_service())
    }

    /// Coordinates the worker registered as `identity`.
    #[must_use]
    pub const fn with_identity(
        registry: Arc<dyn TaskRegistry>,
        identity: WorkerIdentity,
    ) -> Self {
        Self {
            registry,
            identity,
            transition: Mutex::new(()),
        }
    }

    /// The identity this coordinator manages.
    #[must_use]
    pub const fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// Returns whether the worker is listed as running.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WorkerError::RegistryUnavailable`] if the registry cannot be
    /// queried.
    pub fn is_running(&self) -> WorkerResult<bool> {
        Ok(self.registry.list_active()?.contains(&self.identity))
    }

    /// Returns the current state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WorkerError::RegistryUnavailable`] if the registry cannot be
    /// queried.
    pub fn state(&self) -> WorkerResult<WorkerState> {
        Ok(if self.is_running()? {
            WorkerState::Active
        } else {
            WorkerState::Inactive
        })
    }

    /// Launches the worker unless it is already running.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::WorkerError`] if the registry cannot be queried or the
    /// launch fails. The state is unchanged in that case.
    pub fn start(&self) -> WorkerResult<StartOutcome> {
        let _transition = self.lock();
        if self.is_running()? {
            tracing::debug!(worker = %self.identity, "worker already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.registry.register(&self.identity)?;
        tracing::info!(worker = %self.identity, "worker started");
        Ok(StartOutcome::Started)
    }

    /// Stops the worker if it is running.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::WorkerError`] if the registry cannot be queried or updated.
    pub fn stop(&self) -> WorkerResult<StopOutcome> {
        let _transition = self.lock();
        if !self.is_running()? {
            return Ok(StopOutcome::AlreadyStopped);
        }
        self.registry.unregister(&self.identity)?;
        tracing::info!(worker = %self.identity, "worker stopped");
        Ok(StopOutcome::Stopped)
    }

    /// The mutex guards no data, so poison is cleared.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
