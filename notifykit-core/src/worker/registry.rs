//! Running-task registry interface.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{WorkerError, WorkerResult};

/// Identity of a background worker as seen by the platform's task registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerIdentity(String);

impl WorkerIdentity {
    /// Wraps a registry identity, typically a service class name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The background service that decrypts push payloads.
    #[must_use]
    pub fn decryption_service() -> Self {
        Self::new("notifykit.DecryptionBackgroundService")
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-visible registry of running background workers.
///
/// On Android this is backed by the activity manager's running services, on
/// iOS by the background task scheduler.
pub trait TaskRegistry: Send + Sync {
    /// Lists the workers currently running.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::RegistryUnavailable`] if the registry cannot be
    /// queried.
    fn list_active(&self) -> WorkerResult<HashSet<WorkerIdentity>>;

    /// Launches and registers a worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::LaunchFailed`] if the worker cannot be started,
    /// or [`WorkerError::RegistryUnavailable`] if the registry is unreachable.
    fn register(&self, identity: &WorkerIdentity) -> WorkerResult<()>;

    /// Stops and unregisters a worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::RegistryUnavailable`] if the registry is
    /// unreachable.
    fn unregister(&self, identity: &WorkerIdentity) -> WorkerResult<()>;
}

/// In-process task registry.
pub struct MemoryTaskRegistry {
    active: Mutex<HashSet<WorkerIdentity>>,
    available: AtomicBool,
    launches: AtomicU64,
}

impl MemoryTaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
            launches: AtomicU64::new(0),
        }
    }

    /// Simulates the registry becoming unreachable (or reachable again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns how many workers have been launched over the registry's
    /// lifetime.
    #[must_use]
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> WorkerResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(WorkerError::RegistryUnavailable(
                "memory registry offline".to_string(),
            ))
        }
    }
}

impl Default for MemoryTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry for MemoryTaskRegistry {
    fn list_active(&self) -> WorkerResult<HashSet<WorkerIdentity>> {
        self.ensure_available()?;
        self.active.lock().map(|active| active.clone()).map_err(|_| poisoned())
    }

    fn register(&self, identity: &WorkerIdentity) -> WorkerResult<()> {
        self.ensure_available()?;
        let mut active = self.active.lock().map_err(|_| poisoned())?;
        if active.insert(identity.clone()) {
            self.launches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn unregister(&self, identity: &WorkerIdentity) -> WorkerResult<()> {
        self.ensure_available()?;
        self.active
            .lock()
            .map_err(|_| poisoned())?
            .remove(identity);
        Ok(())
    }
}

fn poisoned() -> WorkerError {
    WorkerError::RegistryUnavailable("registry lock poisoned".to_string())
}
