use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

use hal::{OpenMode, PersistentStore, StoreFile};
use log::{info, warn};

/// Persistent store backed by a host directory
pub struct FsStore {
    root: PathBuf,
    mounted: bool,
    /// Wipe the directory on the first mount
    format_pending: bool,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>, format_on_start: bool) -> Self {
        Self {
            root: root.into(),
            mounted: false,
            format_pending: format_on_start,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn format(&mut self) -> bool {
        info!("formatting {}", self.root.display());
        if self.root.exists() {
            if let Err(e) = fs::remove_dir_all(&self.root) {
                warn!("format failed: {}", e);
                return false;
            }
        }
        fs::create_dir_all(&self.root).is_ok()
    }
}

impl PersistentStore for FsStore {
    type File = FsFile;

    fn mount(&mut self, format_on_failure: bool) -> bool {
        if self.mounted {
            return true;
        }
        if std::mem::take(&mut self.format_pending) && !self.format() {
            return false;
        }

        self.mounted = match fs::create_dir_all(&self.root) {
            Ok(()) => true,
            Err(e) => {
                warn!("mount {} failed: {}", self.root.display(), e);
                format_on_failure && self.format()
            }
        };
        self.mounted
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> Option<FsFile> {
        if !self.mounted {
            return None;
        }
        let path = self.resolve(path);
        let file = match mode {
            OpenMode::Write => File::create(&path),
            OpenMode::Append => OpenOptions::new().create(true).append(true).open(&path),
            OpenMode::Read => File::open(&path),
        };
        match file {
            Ok(file) => Some(FsFile { file }),
            Err(e) => {
                warn!("open {} failed: {}", path.display(), e);
                None
            }
        }
    }

    fn exists(&mut self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn remove(&mut self, path: &str) -> bool {
        fs::remove_file(self.resolve(path)).is_ok()
    }
}

pub struct FsFile {
    file: File,
}

impl StoreFile for FsFile {
    fn write(&mut self, data: &[u8]) -> usize {
        self.file.write(data).unwrap_or_else(|e| {
            warn!("write failed: {}", e);
            0
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.file.read(buf).unwrap_or_else(|e| {
            warn!("read failed: {}", e);
            0
        })
    }

    fn flush(&mut self) {
        if let Err(e) = self.file.flush() {
            warn!("flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_write_append_read() {
        let dir = tempdir().unwrap();
        let mut store = FsStore::new(dir.path().join("store"), false);
        assert!(store.open("/fdr.csv", OpenMode::Write).is_none());
        assert!(store.mount(false));

        let mut file = store.open("/fdr.csv", OpenMode::Write).unwrap();
        assert_eq!(file.write(b"a\n"), 2);
        drop(file);
        let mut file = store.open("/fdr.csv", OpenMode::Append).unwrap();
        assert_eq!(file.write(b"b\n"), 2);
        drop(file);

        let mut file = store.open("/fdr.csv", OpenMode::Read).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(file.read(&mut buf), 4);
        assert_eq!(&buf[..4], b"a\nb\n");
        assert_eq!(file.read(&mut buf), 0);

        assert!(store.exists("/fdr.csv"));
        assert!(store.remove("/fdr.csv"));
        assert!(!store.exists("/fdr.csv"));
    }

    #[test]
    fn test_format_on_start_wipes() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("fdr.csv"), "old").unwrap();

        let mut store = FsStore::new(&root, true);
        assert!(store.mount(false));
        assert!(!store.exists("/fdr.csv"));
        assert!(root.is_dir());
    }
}
