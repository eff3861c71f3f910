//! Persistent storage interface (flash filesystem)

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate
    Write,
    /// Create if missing, write at the end
    Append,
    Read,
}

/// An open file handle. Dropping the handle closes the file.
pub trait StoreFile {
    /// Write as much of `data` as possible
    ///
    /// Returns the number of bytes actually written, which may be less
    /// than `data.len()`
    fn write(&mut self, data: &[u8]) -> usize;

    /// Read into `buf`, returning the number of bytes read (0 at end of file)
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Push written bytes down to the medium
    fn flush(&mut self);
}

/// Flash filesystem
pub trait PersistentStore {
    type File: StoreFile;

    /// Mount the filesystem
    ///
    /// When `format_on_failure` is set and the mount fails, the partition
    /// is formatted and mounted again. Repeated calls after a successful
    /// mount are no-ops.
    fn mount(&mut self, format_on_failure: bool) -> bool;

    /// Open `path` in the given mode
    fn open(&mut self, path: &str, mode: OpenMode) -> Option<Self::File>;

    fn exists(&mut self, path: &str) -> bool;

    /// Returns true if the file was removed
    fn remove(&mut self, path: &str) -> bool;
}

/// Destination of an exported recording
pub trait ExportSink {
    /// Deliver one chunk. Returns false if the receiver went away.
    fn write_chunk(&mut self, chunk: &[u8]) -> bool;
}
