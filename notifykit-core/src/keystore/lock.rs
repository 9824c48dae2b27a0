//! Keystore lock serializing key creation across processes.
//!
//! The notification service and the app process may both try to create the
//! same key, and the check-then-write in [`super::FileKeyProvider`] must be
//! atomic for both. Native targets hold an exclusive `flock` (Unix) or
//! `LockFileEx` (Windows) lock on the lock file. OS file locks do not exclude
//! threads sharing one handle, so an in-process mutex is taken first.
//! On WASM only the mutex is used.

use std::path::Path;

use crate::error::{KeyError, KeyResult};

#[cfg(target_arch = "wasm32")]
mod imp {
    use super::{KeyResult, Path};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// In-process lock for single-process targets.
    #[derive(Debug, Default)]
    pub struct KeystoreLock {
        inner: Mutex<()>,
    }

    /// Holds the lock until dropped.
    #[derive(Debug)]
    pub struct KeystoreLockGuard<'a> {
        _guard: MutexGuard<'a, ()>,
    }

    impl KeystoreLock {
        pub fn open(_path: &Path) -> KeyResult<Self> {
            Ok(Self::default())
        }

        pub fn lock(&self) -> KeyResult<KeystoreLockGuard<'_>> {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(KeystoreLockGuard { _guard: guard })
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::{KeyError, KeyResult, Path};
    use std::fs::{self, File, OpenOptions};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// A file-backed exclusive lock.
    #[derive(Debug)]
    pub struct KeystoreLock {
        file: File,
        threads: Mutex<()>,
    }

    /// Holds the lock until dropped.
    #[derive(Debug)]
    pub struct KeystoreLockGuard<'a> {
        file: &'a File,
        _thread: MutexGuard<'a, ()>,
    }

    impl KeystoreLock {
        pub fn open(path: &Path) -> KeyResult<Self> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|err| map_io_err(&err))?;
            }
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|err| map_io_err(&err))?;
            Ok(Self {
                file,
                threads: Mutex::new(()),
            })
        }

        /// Blocks until both the thread mutex and the file lock are held.
        ///
        /// The mutex guards no data, so a poisoned mutex is recovered.
        pub fn lock(&self) -> KeyResult<KeystoreLockGuard<'_>> {
            let thread = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
            lock_exclusive(&self.file).map_err(|err| map_io_err(&err))?;
            Ok(KeystoreLockGuard {
                file: &self.file,
                _thread: thread,
            })
        }

        #[cfg(test)]
        pub fn try_lock(&self) -> KeyResult<Option<KeystoreLockGuard<'_>>> {
            let thread = match self.threads.try_lock() {
                Ok(thread) => thread,
                Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(std::sync::TryLockError::WouldBlock) => return Ok(None),
            };
            if try_lock_exclusive(&self.file).map_err(|err| map_io_err(&err))? {
                Ok(Some(KeystoreLockGuard {
                    file: &self.file,
                    _thread: thread,
                }))
            } else {
                Ok(None)
            }
        }
    }

    impl Drop for KeystoreLockGuard<'_> {
        fn drop(&mut self) {
            let _ = unlock(self.file);
        }
    }

    fn map_io_err(err: &std::io::Error) -> KeyError {
        KeyError::backing_store(format!("keystore lock: {err}"))
    }

    #[cfg(unix)]
    use std::os::raw::c_int;
    #[cfg(unix)]
    use std::os::unix::io::AsRawFd;

    #[cfg(unix)]
    const LOCK_EX: c_int = 2;
    #[cfg(all(unix, test))]
    const LOCK_NB: c_int = 4;
    #[cfg(unix)]
    const LOCK_UN: c_int = 8;

    #[cfg(unix)]
    extern "C" {
        fn flock(fd: c_int, operation: c_int) -> c_int;
    }

    #[cfg(unix)]
    fn flock_checked(file: &File, operation: c_int) -> std::io::Result<()> {
        // SAFETY: the descriptor is owned by `file`, which is open.
        if unsafe { flock(file.as_raw_fd(), operation) } == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(unix)]
    fn lock_exclusive(file: &File) -> std::io::Result<()> {
        flock_checked(file, LOCK_EX)
    }

    #[cfg(all(unix, test))]
    fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
        match flock_checked(file, LOCK_EX | LOCK_NB) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[cfg(unix)]
    fn unlock(file: &File) -> std::io::Result<()> {
        flock_checked(file, LOCK_UN)
    }

    #[cfg(windows)]
    use std::os::windows::io::AsRawHandle;

    #[cfg(windows)]
    type Handle = *mut std::ffi::c_void;

    #[cfg(windows)]
    #[repr(C)]
    struct Overlapped {
        internal: usize,
        internal_high: usize,
        offset: u32,
        offset_high: u32,
        event: Handle,
    }

    #[cfg(windows)]
    const LOCKFILE_EXCLUSIVE_LOCK: u32 = 0x2;
    #[cfg(all(windows, test))]
    const LOCKFILE_FAIL_IMMEDIATELY: u32 = 0x1;
    #[cfg(all(windows, test))]
    const ERROR_LOCK_VIOLATION: i32 = 33;

    #[cfg(windows)]
    extern "system" {
        fn LockFileEx(
            file: Handle,
            flags: u32,
            reserved: u32,
            bytes_low: u32,
            bytes_high: u32,
            overlapped: *mut Overlapped,
        ) -> i32;
        fn UnlockFileEx(
            file: Handle,
            reserved: u32,
            bytes_low: u32,
            bytes_high: u32,
            overlapped: *mut Overlapped,
        ) -> i32;
    }

    #[cfg(windows)]
    const fn empty_overlapped() -> Overlapped {
        Overlapped {
            internal: 0,
            internal_high: 0,
            offset: 0,
            offset_high: 0,
            event: std::ptr::null_mut(),
        }
    }

    #[cfg(windows)]
    fn lock_file(file: &File, flags: u32) -> std::io::Result<()> {
        let mut overlapped = empty_overlapped();
        // SAFETY: the handle is owned by `file`, which is open, and
        // `overlapped` outlives the synchronous call.
        let result = unsafe {
            LockFileEx(
                file.as_raw_handle().cast(),
                LOCKFILE_EXCLUSIVE_LOCK | flags,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if result == 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(windows)]
    fn lock_exclusive(file: &File) -> std::io::Result<()> {
        lock_file(file, 0)
    }

    #[cfg(all(windows, test))]
    fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
        match lock_file(file, LOCKFILE_FAIL_IMMEDIATELY) {
            Ok(()) => Ok(true),
            Err(err) if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION) => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[cfg(windows)]
    fn unlock(file: &File) -> std::io::Result<()> {
        let mut overlapped = empty_overlapped();
        // SAFETY: as in `lock_file`.
        let result =
            unsafe { UnlockFileEx(file.as_raw_handle().cast(), 0, 1, 0, &mut overlapped) };
        if result == 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

pub use imp::KeystoreLock;
