//! Task registry implemented by the host app.

use std::collections::HashSet;
use std::sync::Arc;

use super::{TaskRegistry, WorkerIdentity};
use crate::error::{NotifyKitError, NotifyKitResult, WorkerError, WorkerResult};

/// The platform's view of running background services.
///
/// Android apps back this with `ActivityManager` and `startService`, iOS apps
/// with `BGTaskScheduler`.
#[uniffi::export(with_foreign)]
pub trait PlatformTaskRegistry: Send + Sync {
    /// Lists the identities of the services currently running.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyKitError::RegistryUnavailable`] if the platform cannot
    /// be queried.
    fn list_active(&self) -> NotifyKitResult<Vec<String>>;

    /// Launches the service registered as `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyKitError::LaunchFailed`] if the service cannot start.
    fn register(&self, identity: String) -> NotifyKitResult<()>;

    /// Stops the service registered as `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyKitError::RegistryUnavailable`] if the platform cannot
    /// be reached.
    fn unregister(&self, identity: String) -> NotifyKitResult<()>;
}

/// Adapts a [`PlatformTaskRegistry`] to [`TaskRegistry`].
pub struct ForeignTaskRegistry {
    inner: Arc<dyn PlatformTaskRegistry>,
}

impl ForeignTaskRegistry {
    /// Wraps the host app's registry.
    #[must_use]
    pub const fn new(inner: Arc<dyn PlatformTaskRegistry>) -> Self {
        Self { inner }
    }
}

impl TaskRegistry for ForeignTaskRegistry {
    fn list_active(&self) -> WorkerResult<HashSet<WorkerIdentity>> {
        let active = self.inner.list_active().map_err(worker_error)?;
        Ok(active.into_iter().map(WorkerIdentity::new).collect())
    }

    fn register(&self, identity: &WorkerIdentity) -> WorkerResult<()> {
        self.inner
            .register(identity.as_str().to_owned())
            .map_err(worker_error)
    }

    fn unregister(&self, identity: &WorkerIdentity) -> WorkerResult<()> {
        self.inner
            .unregister(identity.as_str().to_owned())
            .map_err(worker_error)
    }
}

fn worker_error(err: NotifyKitError) -> WorkerError {
    match err {
        NotifyKitError::LaunchFailed { detail } => WorkerError::LaunchFailed(detail),
        NotifyKitError::RegistryUnavailable { detail } => WorkerError::RegistryUnavailable(detail),
        other => WorkerError::RegistryUnavailable(other.to_string()),
    }
}
