//! On-disk layout for the file-backed key provider.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::KeyAlias;

const NOTIFYKIT_DIRNAME: &str = "notifykit";
const KEYS_DIRNAME: &str = "keys";
const LOCK_FILENAME: &str = "lock";
const KEY_EXTENSION: &str = "key";

/// Paths for key records under `<root>/notifykit`.
#[derive(Debug, Clone, uniffi::Object)]
pub struct KeystorePaths {
    root: PathBuf,
    notifykit_dir: PathBuf,
}

impl KeystorePaths {
    /// Builds keystore paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let notifykit_dir = root.join(NOTIFYKIT_DIRNAME);
        Self {
            root,
            notifykit_dir,
        }
    }

    /// Returns the storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory holding one record per key.
    #[must_use]
    pub fn keys_dir(&self) -> PathBuf {
        self.notifykit_dir.join(KEYS_DIRNAME)
    }

    /// Returns the path to the lock file serializing key creation.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.notifykit_dir.join(LOCK_FILENAME)
    }

    /// Returns the record path for `alias`.
    ///
    /// File names are the hex SHA-256 of the alias, so arbitrary topics can
    /// never escape the keys directory.
    #[must_use]
    pub fn key_path(&self, alias: &KeyAlias) -> PathBuf {
        let digest = Sha256::digest(alias.as_str().as_bytes());
        self.keys_dir()
            .join(format!("{}.{KEY_EXTENSION}", hex::encode(digest)))
    }
}

#[uniffi::export]
impl KeystorePaths {
    /// Builds keystore paths rooted at `root`.
    #[uniffi::constructor]
    #[must_use]
    pub fn from_root(root: String) -> Self {
        Self::new(PathBuf::from(root))
    }

    /// Returns the storage root directory as a string.
    #[must_use]
    pub fn root_path_string(&self) -> String {
        self.root.to_string_lossy().to_string()
    }

    /// Returns the keys directory as a string.
    #[must_use]
    pub fn keys_dir_path_string(&self) -> String {
        self.keys_dir().to_string_lossy().to_string()
    }
}
