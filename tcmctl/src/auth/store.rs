//! Durable credential storage.
//!
//! The store holds exactly one opaque string per key. It is the only owner of the credential:
//! the session manager reads through it instead of keeping its own copy.
//!
//! Next to the credential each store keeps a sign-out generation, bumped by every `clear`.
//! Separate `tcmctl` invocations share the store, so the generation is how an in-flight login
//! learns that another invocation signed out in the meantime.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, instrument};

use crate::errors::{Error, Result};
use crate::types::Credential;

/// Synchronous key/value persistence for the session credential.
///
/// All operations are idempotent. Failures of the underlying medium are reported as
/// [`Error::StorageUnavailable`].
pub trait CredentialStore: Send + Sync {
    fn put(&self, credential: &Credential) -> Result<()>;
    fn get(&self) -> Result<Option<Credential>>;
    /// Remove the credential and bump the sign-out generation.
    fn clear(&self) -> Result<()>;
    /// Number of `clear` calls seen by the medium so far.
    fn generation(&self) -> Result<u64>;
}

/// Stores the credential as a single file named after the key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
    key: String,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.key)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.tmp", self.key))
    }

    fn generation_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.generation", self.key))
    }

    fn write_atomically(&self, target: &Path, temp: &Path, contents: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        {
            let mut file = open_private(temp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(temp, target)
    }

    fn bump_generation(&self) -> Result<u64> {
        let next = self.generation()? + 1;
        let temp = self.dir.join(format!(".{}.generation.tmp", self.key));
        self.write_atomically(&self.generation_path(), &temp, &next.to_string())
            .map_err(|e| Error::storage("record sign-out", e))?;
        Ok(next)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?;
    // `mode` only applies on creation; a leftover temp file keeps its old bits otherwise
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

impl CredentialStore for FileCredentialStore {
    #[instrument(skip_all, fields(path = %self.path().display()))]
    fn put(&self, credential: &Credential) -> Result<()> {
        self.write_atomically(&self.path(), &self.temp_path(), credential.as_str())
            .map_err(|e| Error::storage("write credential", e))?;
        debug!("credential persisted");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path().display()))]
    fn get(&self) -> Result<Option<Credential>> {
        match fs::read_to_string(self.path()) {
            Ok(contents) => Ok(Credential::new(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage("read credential", e)),
        }
    }

    #[instrument(skip_all, fields(path = %self.path().display()))]
    fn clear(&self) -> Result<()> {
        // Bumped before removal so a login checking in between already sees the sign-out
        let bumped = self.bump_generation();
        match fs::remove_file(self.path()) {
            Ok(()) => debug!("credential removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage("clear credential", e)),
        }
        let generation = bumped?;
        debug!(generation, "sign-out recorded");
        Ok(())
    }

    fn generation(&self) -> Result<u64> {
        match fs::read_to_string(self.generation_path()) {
            Ok(contents) => contents.trim().parse::<u64>().map_err(|e| {
                Error::storage("read sign-out generation", io::Error::new(io::ErrorKind::InvalidData, e))
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Error::storage("read sign-out generation", e)),
        }
    }
}

/// In-process store, used for ephemeral sessions and tests.
///
/// [`MemoryCredentialStore::set_available`] simulates the medium going away.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    value: Option<Credential>,
    generation: u64,
    unavailable: bool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        let store = Self::default();
        store.lock().value = Some(credential);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a panic elsewhere; the stored value is still coherent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(inner: &MemoryInner, operation: &str) -> Result<()> {
        if inner.unavailable {
            return Err(Error::storage(
                operation,
                io::Error::new(io::ErrorKind::PermissionDenied, "memory store marked unavailable"),
            ));
        }
        Ok(())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn put(&self, credential: &Credential) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner, "write credential")?;
        inner.value = Some(credential.clone());
        Ok(())
    }

    fn get(&self) -> Result<Option<Credential>> {
        let inner = self.lock();
        Self::check(&inner, "read credential")?;
        Ok(inner.value.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::check(&inner, "clear credential")?;
        inner.value = None;
        inner.generation += 1;
        Ok(())
    }

    fn generation(&self) -> Result<u64> {
        let inner = self.lock();
        Self::check(&inner, "read sign-out generation")?;
        Ok(inner.generation)
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn put(&self, credential: &Credential) -> Result<()> {
        (**self).put(credential)
    }

    fn get(&self) -> Result<Option<Credential>> {
        (**self).get()
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn generation(&self) -> Result<u64> {
        (**self).generation()
    }
}
