use thiserror::Error;

/// Failures of the acquisition and recording pipeline.
///
/// None of these is fatal to the host: each one either resolves itself on a
/// later cycle or is reported back to whoever issued the request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdrError {
    /// A full bus sweep finished without a usable barometer
    #[error("no barometer found ({responding} devices responding)")]
    SensorNotFound { responding: u8 },

    /// Too many consecutive out-of-range readings; the device was dropped
    #[error("{bad_reads} consecutive bad readings, re-scanning bus")]
    SensorDegraded { bad_reads: u8 },

    /// The store could neither be mounted nor formatted
    #[error("persistent store unavailable")]
    StorageUnavailable,

    /// A flush accepted only a prefix of the buffer; the rest stays buffered
    #[error("short write: {written} bytes written, {remaining} retained")]
    PartialWrite { written: usize, remaining: usize },

    /// Export requested but nothing has been recorded
    #[error("no recorded data")]
    NoData,

    #[error("I/O error: {0}")]
    IoError(&'static str),
}

/// Type alias for Result with FdrError
pub type FdrResult<T> = Result<T, FdrError>;
