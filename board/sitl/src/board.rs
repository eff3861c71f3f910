//! Host stand-ins for the board peripherals around the barometer

use std::fs::File;
use std::io::{self, Write};
use std::time::Instant;

use hal::{Clock, ExportSink, IndicatorState, StatusIndicator};
use log::{info, warn};

/// Status LED printed to the log
#[derive(Default)]
pub struct ConsoleLight {
    state: Option<IndicatorState>,
}

impl ConsoleLight {
    fn colour(state: IndicatorState) -> &'static str {
        match state {
            IndicatorState::Idle => "blue",
            IndicatorState::Recording => "green",
            IndicatorState::Fault => "red",
        }
    }
}

impl StatusIndicator for ConsoleLight {
    fn set_state(&mut self, state: IndicatorState) {
        if self.state != Some(state) {
            info!("status light {} ({:?})", Self::colour(state), state);
        }
        self.state = Some(state);
    }
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Where an exported recording goes
pub enum ExportTarget {
    Stdout(io::Stdout),
    File(File),
}

impl ExportSink for ExportTarget {
    fn write_chunk(&mut self, chunk: &[u8]) -> bool {
        let result = match self {
            ExportTarget::Stdout(out) => out.write_all(chunk),
            ExportTarget::File(file) => file.write_all(chunk),
        };
        if let Err(e) = &result {
            warn!("export write failed: {}", e);
        }
        result.is_ok()
    }
}
