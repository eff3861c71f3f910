use hal::{OpenMode, PersistentStore};
use log::{error, info, warn};

use crate::error::{FdrError, FdrResult};

/// Lazily mounted persistent store holding a single recording file
pub struct Storage<S: PersistentStore> {
    store: S,
    path: &'static str,
    mounted: bool,
}

impl<S: PersistentStore> Storage<S> {
    pub fn new(store: S, path: &'static str) -> Self {
        Self {
            store,
            path,
            mounted: false,
        }
    }

    /// Mount on first use. A failed mount is retried once with a
    /// destructive format.
    pub fn ensure_mounted(&mut self) -> FdrResult<()> {
        if self.mounted {
            return Ok(());
        }

        if self.store.mount(false) {
            info!("store mounted");
        } else {
            warn!("store mount failed, formatting");
            if !self.store.mount(true) {
                error!("store format failed");
                return Err(FdrError::StorageUnavailable);
            }
            info!("store formatted and mounted");
        }

        self.mounted = true;
        Ok(())
    }

    /// Truncate or create the recording file
    pub fn create(&mut self) -> FdrResult<S::File> {
        self.open(OpenMode::Write)
    }

    pub fn open_append(&mut self) -> FdrResult<S::File> {
        self.open(OpenMode::Append)
    }

    pub fn open_read(&mut self) -> FdrResult<S::File> {
        self.open(OpenMode::Read)
    }

    pub fn exists(&mut self) -> FdrResult<bool> {
        self.ensure_mounted()?;
        Ok(self.store.exists(self.path))
    }

    /// Remove the recording file. Returns whether a file was removed.
    pub fn remove(&mut self) -> FdrResult<bool> {
        self.ensure_mounted()?;
        if !self.store.exists(self.path) {
            return Ok(false);
        }
        if !self.store.remove(self.path) {
            return Err(FdrError::IoError("failed to remove recording"));
        }
        Ok(true)
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn open(&mut self, mode: OpenMode) -> FdrResult<S::File> {
        self.ensure_mounted()?;
        self.store.open(self.path, mode).ok_or_else(|| {
            warn!("failed to open {} ({:?})", self.path, mode);
            FdrError::IoError("failed to open recording")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeStore;
    use hal::StoreFile;

    #[test]
    fn test_mount_is_lazy_and_once() {
        let store = FakeStore::default();
        let mut storage = Storage::new(store.clone(), "/fdr.csv");
        assert!(store.0.borrow().mount_calls.is_empty());

        assert_eq!(storage.exists(), Ok(false));
        assert_eq!(storage.exists(), Ok(false));
        assert_eq!(store.0.borrow().mount_calls, vec![false]);
    }

    #[test]
    fn test_mount_falls_back_to_format() {
        let store = FakeStore::default();
        store.0.borrow_mut().mount_fails = true;
        let mut storage = Storage::new(store.clone(), "/fdr.csv");

        assert!(storage.ensure_mounted().is_ok());
        assert_eq!(store.0.borrow().mount_calls, vec![false, true]);
    }

    #[test]
    fn test_format_failure_is_unavailable() {
        let store = FakeStore::default();
        store.0.borrow_mut().mount_fails = true;
        store.0.borrow_mut().format_fails = true;
        let mut storage = Storage::new(store, "/fdr.csv");

        assert!(matches!(storage.create(), Err(FdrError::StorageUnavailable)));
        assert_eq!(storage.remove(), Err(FdrError::StorageUnavailable));
    }

    #[test]
    fn test_create_append_remove() {
        let store = FakeStore::default();
        let mut storage = Storage::new(store.clone(), "/fdr.csv");

        assert!(matches!(storage.open_read(), Err(FdrError::IoError(_))));

        let mut file = storage.create().expect("create");
        assert_eq!(file.write(b"a\n"), 2);
        drop(file);
        let mut file = storage.open_append().expect("append");
        assert_eq!(file.write(b"b\n"), 2);
        drop(file);
        assert_eq!(store.contents("/fdr.csv").as_deref(), Some("a\nb\n"));

        assert_eq!(storage.remove(), Ok(true));
        assert_eq!(storage.remove(), Ok(false));
        assert_eq!(storage.exists(), Ok(false));
    }
}
