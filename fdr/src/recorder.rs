//! Fixed-rate sampling into a flash-backed CSV recording

use core::fmt::Write;

use hal::{Clock, ExportSink, IndicatorState, PersistentStore, StatusIndicator, StoreFile};
use heapless::String;
use log::{debug, error, info, warn};

use crate::buffer::WriteBuffer;
use crate::config::{RecorderConfig, CSV_HEADER, EXPORT_CHUNK_SIZE};
use crate::error::{FdrError, FdrResult};
use crate::storage::Storage;

/// Where the recorder takes its samples from
pub trait SampleSource {
    fn is_ready(&self) -> bool;

    /// Smoothed pressure in hPa
    fn latest_smoothed_pressure(&self) -> Option<f32>;

    fn set_fast_mode(&mut self, enabled: bool);
}

/// Normalized parameters of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    pub duration_s: u32,
    pub samples_per_second: u32,
    pub interval_ms: u32,
    /// The requested rate was above the ceiling
    pub clamped: bool,
}

impl SessionPlan {
    /// A rate of zero is treated as 1, rates above `max_samples_per_second`
    /// are clamped.
    pub fn new(duration_s: u32, samples_per_second: u32, max_samples_per_second: u32) -> Self {
        let max = max_samples_per_second.max(1);
        let rate = samples_per_second.clamp(1, max);
        Self {
            duration_s,
            samples_per_second: rate,
            interval_ms: 1000 / rate,
            clamped: samples_per_second > max,
        }
    }
}

/// State of the one active recording
pub struct Session<F> {
    file: Option<F>,
    buffer: WriteBuffer,
    started_at: u64,
    ends_at: u64,
    interval_ms: u64,
    last_sample_at: Option<u64>,
    last_flush_at: u64,
    samples: u32,
    /// Fast mode was applied to the device currently delivering samples
    fast_mode: bool,
}

impl<F> Session<F> {
    /// Bytes buffered in RAM and not yet on the store
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn samples_written(&self) -> u32 {
        self.samples
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn ends_at(&self) -> u64 {
        self.ends_at
    }
}

/// Flight data recorder
///
/// Idle until `start`, then samples the source every interval, stages CSV
/// lines in RAM and flushes them to the store when enough bytes have
/// accumulated or enough time has passed, whichever comes first.
pub struct Recorder<S: PersistentStore, I: StatusIndicator, C: Clock> {
    storage: Storage<S>,
    indicator: I,
    clock: C,
    config: RecorderConfig,
    session: Option<Session<S::File>>,
}

impl<S, I, C> Recorder<S, I, C>
where
    S: PersistentStore,
    I: StatusIndicator,
    C: Clock,
{
    pub fn new(store: S, indicator: I, clock: C, config: RecorderConfig) -> Self {
        Self {
            storage: Storage::new(store, config.path),
            indicator,
            clock,
            config,
            session: None,
        }
    }

    /// Start a new recording, replacing any previous one
    pub fn start(
        &mut self,
        source: &mut impl SampleSource,
        duration_s: u32,
        samples_per_second: u32,
    ) -> FdrResult<SessionPlan> {
        if self.session.is_some() {
            info!("recording already active, restarting");
            self.stop(source);
        }

        let plan = SessionPlan::new(duration_s, samples_per_second, self.config.max_samples_per_second);
        if plan.clamped {
            warn!(
                "sample rate {} clamped to {}",
                samples_per_second, plan.samples_per_second
            );
        }

        let file = match self.storage.create() {
            Ok(file) => file,
            Err(e) => {
                error!("cannot start recording: {}", e);
                self.indicator.set_state(IndicatorState::Fault);
                return Err(e);
            }
        };

        let now = self.clock.now_ms();
        let mut buffer = WriteBuffer::with_capacity(self.config.buffer_capacity);
        buffer.push(CSV_HEADER.as_bytes());

        let mut session = Session {
            file: Some(file),
            buffer,
            started_at: now,
            ends_at: now + u64::from(duration_s) * 1000,
            interval_ms: u64::from(plan.interval_ms),
            last_sample_at: None,
            last_flush_at: now,
            samples: 0,
            fast_mode: false,
        };
        log_flush(flush_session(&mut self.storage, &mut session, now));

        source.set_fast_mode(true);
        session.fast_mode = source.is_ready();
        self.indicator.set_state(IndicatorState::Recording);
        info!(
            "recording started: {} s at {} Hz ({} ms interval)",
            plan.duration_s, plan.samples_per_second, plan.interval_ms
        );

        self.session = Some(session);
        Ok(plan)
    }

    /// Take a sample if one is due and flush if needed. Does nothing while idle.
    pub fn cycle(&mut self, source: &mut impl SampleSource) {
        let now = self.clock.now_ms();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if now >= session.ends_at {
            info!("recording duration reached");
            self.stop(source);
            return;
        }

        // a device found by a re-scan starts in high precision
        if !source.is_ready() {
            session.fast_mode = false;
        } else if !session.fast_mode {
            source.set_fast_mode(true);
            session.fast_mode = true;
        }

        let due = session
            .last_sample_at
            .map_or(true, |last| now.saturating_sub(last) >= session.interval_ms);
        if due {
            match source.latest_smoothed_pressure().filter(|_| source.is_ready()) {
                Some(pressure) => match format_sample(now - session.started_at, pressure) {
                    Ok(line) => {
                        session.buffer.push(line.as_bytes());
                        session.last_sample_at = Some(now);
                        session.samples += 1;
                    }
                    Err(e) => warn!("dropping sample: {}", e),
                },
                None => debug!("sensor not ready, tick skipped"),
            }
        }

        if session.buffer.is_empty() {
            return;
        }
        let size_due = session.buffer.len() >= self.config.flush_threshold;
        let time_due = now.saturating_sub(session.last_flush_at) >= self.config.flush_interval_ms;
        if size_due || time_due {
            log_flush(flush_session(&mut self.storage, session, now));
        }
    }

    /// Drain the buffer, close the file and return to idle. No-op while idle.
    pub fn stop(&mut self, source: &mut impl SampleSource) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let now = self.clock.now_ms();
        if let Err(e) = drain_session(&mut self.storage, &mut session, now) {
            error!("{} buffered bytes lost on stop: {}", session.buffer.len(), e);
        }
        let samples = session.samples;
        drop(session);

        source.set_fast_mode(false);
        self.indicator.set_state(IndicatorState::Idle);
        info!("recording stopped after {} samples", samples);
    }

    /// Delete the recording, stopping an active session first
    pub fn reset(&mut self, source: &mut impl SampleSource) -> FdrResult<()> {
        if self.session.is_some() {
            self.stop(source);
        }
        if self.storage.remove()? {
            info!("recording {} removed", self.storage.path());
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session<S::File>> {
        self.session.as_ref()
    }

    /// Stream the whole recording into `sink`, returning the bytes sent.
    ///
    /// An active session is flushed first so the export includes every
    /// sample taken so far.
    pub fn export_to<K: ExportSink + ?Sized>(&mut self, sink: &mut K) -> FdrResult<usize> {
        let now = self.clock.now_ms();
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = drain_session(&mut self.storage, session, now) {
                warn!("export without pending samples: {}", e);
            }
        }

        if !self.storage.exists()? {
            return Err(FdrError::NoData);
        }
        let mut file = self.storage.open_read()?;

        let mut chunk = [0u8; EXPORT_CHUNK_SIZE];
        let mut total = 0;
        loop {
            let count = file.read(&mut chunk);
            if count == 0 {
                break;
            }
            if !sink.write_chunk(&chunk[..count]) {
                warn!("export aborted after {} bytes", total);
                return Err(FdrError::IoError("export sink closed"));
            }
            total += count;
        }

        info!("exported {} bytes", total);
        Ok(total)
    }
}

/// One CSV line: elapsed seconds with millisecond resolution, pressure in hPa
fn format_sample(elapsed_ms: u64, pressure_hpa: f32) -> FdrResult<String<64>> {
    let mut line = String::new();
    writeln!(line, "{:.3},{:.2}", elapsed_ms as f64 / 1000.0, pressure_hpa)
        .map_err(|_| FdrError::IoError("sample line too long"))?;
    Ok(line)
}

/// Write the buffer once, keeping whatever the store did not accept.
///
/// A write that accepts nothing drops the handle; the next attempt reopens
/// the file for appending.
fn flush_session<S: PersistentStore>(
    storage: &mut Storage<S>,
    session: &mut Session<S::File>,
    now: u64,
) -> FdrResult<()> {
    if session.buffer.is_empty() {
        return Ok(());
    }
    session.last_flush_at = now;

    let mut file = match session.file.take() {
        Some(file) => file,
        None => storage.open_append()?,
    };

    let pending = session.buffer.len();
    let written = file.write(session.buffer.as_bytes());
    if written == 0 {
        return Err(FdrError::IoError("write failed"));
    }
    file.flush();

    session.buffer.consume(written);
    session.file = Some(file);

    if written < pending {
        return Err(FdrError::PartialWrite {
            written,
            remaining: pending - written,
        });
    }
    Ok(())
}

/// Flush until the buffer is empty or the store stops making progress
fn drain_session<S: PersistentStore>(
    storage: &mut Storage<S>,
    session: &mut Session<S::File>,
    now: u64,
) -> FdrResult<()> {
    loop {
        match flush_session(storage, session, now) {
            Err(FdrError::PartialWrite { .. }) => continue,
            result => return result,
        }
    }
}

fn log_flush(result: FdrResult<()>) {
    match result {
        Ok(()) => {}
        Err(FdrError::PartialWrite { written, remaining }) => {
            warn!("short write: {} bytes written, {} retained", written, remaining)
        }
        Err(e) => error!("flush failed, data kept in buffer: {}", e),
    }
}
