//! File-backed software keystore.
//!
//! Each key is one CBOR record at `<root>/notifykit/keys/<sha256(alias)>.key`,
//! written to a temp file and published with a hard link, which fails rather
//! than replace an existing record. Creation runs under the keystore lock so
//! concurrent creators in any process observe exactly one winner. Keys are
//! stored in the clear with owner-only permissions: this provider is for
//! development and hosts without a hardware keystore.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::lock::KeystoreLock;
use super::{
    KeyAlgorithm, KeyAlias, KeyHandle, KeySpec, KeystorePaths, SecureStorageProvider, KEY_LEN,
};
use crate::error::{KeyError, KeyResult};

const RECORD_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    version: u32,
    alias: String,
    algorithm: KeyAlgorithm,
    key: Vec<u8>,
    created_at: u64,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl KeyRecord {
    fn encode(&self) -> KeyResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| KeyError::backing_store(format!("key record encoding: {err}")))?;
        Ok(bytes)
    }

    fn decode(bytes: &[u8], alias: &KeyAlias) -> KeyResult<Self> {
        let record: Self = ciborium::de::from_reader(bytes).map_err(|err| {
            KeyError::backing_store(format!("corrupt key record for `{alias}`: {err}"))
        })?;
        if record.version != RECORD_VERSION {
            return Err(KeyError::backing_store(format!(
                "unsupported key record version {} for `{alias}`",
                record.version
            )));
        }
        if record.alias != alias.as_str() {
            return Err(KeyError::backing_store(format!(
                "key record for `{alias}` belongs to another alias"
            )));
        }
        Ok(record)
    }

    fn into_handle(self, alias: KeyAlias) -> KeyResult<KeyHandle> {
        let secret = SecretBox::try_init_with_mut(|key: &mut [u8; KEY_LEN]| {
            if self.key.len() != KEY_LEN {
                return Err(KeyError::backing_store(format!(
                    "key record for `{alias}` holds {} bytes, expected {KEY_LEN}",
                    self.key.len()
                )));
            }
            key.copy_from_slice(&self.key);
            Ok(())
        })?;
        Ok(KeyHandle::from_secret(alias, secret))
    }
}

/// Software keystore persisting keys under a [`KeystorePaths`] root.
///
/// Handles are cached after the first load so every handle for an alias
/// shares one encryption counter for the provider's lifetime.
pub struct FileKeyProvider {
    paths: KeystorePaths,
    lock: KeystoreLock,
    cache: RwLock<HashMap<KeyAlias, KeyHandle>>,
}

impl FileKeyProvider {
    /// Opens (creating if needed) the keystore directory.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::BackingStoreUnavailable`] if the directories or the
    /// lock file cannot be created.
    pub fn open(paths: KeystorePaths) -> KeyResult<Self> {
        fs::create_dir_all(paths.keys_dir()).map_err(|err| map_io_err("create keys dir", &err))?;
        let lock = KeystoreLock::open(&paths.lock_path())?;
        Ok(Self {
            paths,
            lock,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the paths this provider writes to.
    #[must_use]
    pub const fn paths(&self) -> &KeystorePaths {
        &self.paths
    }

    fn cached(&self, alias: &KeyAlias) -> KeyResult<Option<KeyHandle>> {
        let cache = self
            .cache
            .read()
            .map_err(|_| KeyError::backing_store("key cache lock poisoned"))?;
        Ok(cache.get(alias).cloned())
    }

    fn remember(&self, handle: KeyHandle) -> KeyResult<KeyHandle> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| KeyError::backing_store("key cache lock poisoned"))?;
        Ok(cache
            .entry(handle.alias().clone())
            .or_insert(handle)
            .clone())
    }

    fn load(&self, alias: &KeyAlias) -> KeyResult<Option<KeyHandle>> {
        let path = self.paths.key_path(alias);
        let mut bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(map_io_err("read key record", &err)),
        };
        let record = KeyRecord::decode(&bytes, alias);
        bytes.zeroize();
        record?.into_handle(alias.clone()).map(Some)
    }
}

impl SecureStorageProvider for FileKeyProvider {
    fn create_key(&self, alias: &KeyAlias, spec: &KeySpec) -> KeyResult<()> {
        spec.ensure_supported()?;
        let _guard = self.lock.lock()?;

        let path = self.paths.key_path(alias);
        if path
            .try_exists()
            .map_err(|err| map_io_err("check key record", &err))?
        {
            return Err(KeyError::AlreadyExists {
                alias: alias.clone(),
            });
        }

        let handle = KeyHandle::generate(alias.clone())?;
        let key = handle
            .software_key()
            .ok_or_else(|| KeyError::backing_store("generated key is not exportable"))?;
        let record = KeyRecord {
            version: RECORD_VERSION,
            alias: alias.as_str().to_owned(),
            algorithm: spec.algorithm,
            key: key.to_vec(),
            created_at: now_secs(),
        };
        let mut bytes = record.encode()?;
        let written = publish_new(&path, &bytes);
        bytes.zeroize();
        written.map_err(|err| match err {
            PublishError::Exists => KeyError::AlreadyExists {
                alias: alias.clone(),
            },
            PublishError::Io(err) => err,
        })?;

        self.remember(handle)?;
        Ok(())
    }

    fn get_key(&self, alias: &KeyAlias) -> KeyResult<KeyHandle> {
        if let Some(handle) = self.cached(alias)? {
            return Ok(handle);
        }
        let handle = self.load(alias)?.ok_or_else(|| KeyError::NotFound {
            alias: alias.clone(),
        })?;
        self.remember(handle)
    }

    fn contains_key(&self, alias: &KeyAlias) -> KeyResult<bool> {
        if self.cached(alias)?.is_some() {
            return Ok(true);
        }
        self.paths
            .key_path(alias)
            .try_exists()
            .map_err(|err| map_io_err("check key record", &err))
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }
}

enum PublishError {
    Exists,
    Io(KeyError),
}

/// Writes `bytes` to a temp file and links it in at `path`.
///
/// Never replaces an existing file at `path` on any platform.
fn publish_new(path: &Path, bytes: &[u8]) -> Result<(), PublishError> {
    let tmp = path.with_extension("key.tmp");
    let published = write_synced(&tmp, bytes).and_then(|()| {
        fs::hard_link(&tmp, path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                PublishError::Exists
            } else {
                PublishError::Io(map_io_err("publish key record", &err))
            }
        })
    });
    let _ = fs::remove_file(&tmp);
    published
}

fn write_synced(tmp: &Path, bytes: &[u8]) -> Result<(), PublishError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(tmp)
        .map_err(|err| PublishError::Io(map_io_err("create key record", &err)))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|err| PublishError::Io(map_io_err("write key record", &err)))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

fn map_io_err(context: &str, err: &std::io::Error) -> KeyError {
    KeyError::backing_store(format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_root() -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("notifykit-file-{}", Uuid::new_v4()));
        path
    }

    fn alias(name: &str) -> KeyAlias {
        KeyAlias::new(name).unwrap()
    }

    #[test]
    fn test_key_survives_reopen() {
        let root = temp_root();
        let topic = alias("wc_topic_1");
        let first = {
            let provider = FileKeyProvider::open(KeystorePaths::new(&root)).expect("open");
            provider.create_key(&topic, &KeySpec::default()).expect("create");
            *provider.get_key(&topic).expect("get").software_key().unwrap()
        };

        let reopened = FileKeyProvider::open(KeystorePaths::new(&root)).expect("reopen");
        assert!(reopened.contains_key(&topic).unwrap());
        assert_eq!(reopened.get_key(&topic).unwrap().software_key(), Some(&first));
        assert!(!reopened.is_hardware_backed());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_existing_record_is_never_overwritten() {
        let root = temp_root();
        let topic = alias("wc_topic_1");
        let provider = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        provider.create_key(&topic, &KeySpec::default()).unwrap();
        let before = fs::read(provider.paths().key_path(&topic)).unwrap();

        let other = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        assert_eq!(
            other.create_key(&topic, &KeySpec::default()),
            Err(KeyError::AlreadyExists { alias: topic.clone() })
        );
        assert_eq!(fs::read(provider.paths().key_path(&topic)).unwrap(), before);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let root = temp_root();
        let provider = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        assert!(matches!(
            provider.get_key(&alias("wc_topic_9")),
            Err(KeyError::NotFound { .. })
        ));
        assert!(!provider.contains_key(&alias("wc_topic_9")).unwrap());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let root = temp_root();
        let topic = alias("wc_topic_1");
        let provider = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        provider.create_key(&topic, &KeySpec::default()).unwrap();
        fs::write(provider.paths().key_path(&topic), b"not cbor").unwrap();

        let fresh = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        assert!(matches!(
            fresh.get_key(&topic),
            Err(KeyError::BackingStoreUnavailable(_))
        ));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_record_version_mismatch_is_reported() {
        let root = temp_root();
        let topic = alias("wc_topic_1");
        let provider = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        let record = KeyRecord {
            version: RECORD_VERSION + 1,
            alias: topic.as_str().to_owned(),
            algorithm: KeyAlgorithm::ChaCha20Poly1305,
            key: vec![7u8; KEY_LEN],
            created_at: 1,
        };
        let bytes = record.encode().unwrap();
        assert!(publish_new(&provider.paths().key_path(&topic), &bytes).is_ok());

        match provider.get_key(&topic) {
            Err(KeyError::BackingStoreUnavailable(reason)) => {
                assert!(reason.contains("version"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_concurrent_creates_yield_one_record() {
        let root = temp_root();
        let provider =
            std::sync::Arc::new(FileKeyProvider::open(KeystorePaths::new(&root)).unwrap());
        let topic = alias("wc_topic_1");
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let provider = std::sync::Arc::clone(&provider);
                let topic = topic.clone();
                std::thread::spawn(move || provider.create_key(&topic, &KeySpec::default()))
            })
            .collect();
        let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|err| matches!(err, KeyError::AlreadyExists { .. })));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn test_publish_never_replaces_existing_file() {
        let root = temp_root();
        let provider = FileKeyProvider::open(KeystorePaths::new(&root)).unwrap();
        let path = provider.paths().key_path(&alias("wc_topic_1"));

        assert!(publish_new(&path, b"first").is_ok());
        assert!(matches!(
            publish_new(&path, b"second"),
            Err(PublishError::Exists)
        ));
        assert_eq!(fs::read(&path).unwrap(), b"first");
        assert!(!path.with_extension("key.tmp").exists());

        let _ = fs::remove_dir_all(root);
    }
}
