#![cfg_attr(not(test), no_std)]

mod acquisition;
mod buffer;
pub mod config;
mod control;
mod ema;
mod error;
mod recorder;
mod scan;
mod storage;

#[cfg(test)]
mod fakes;

pub use acquisition::{BaroAcquisition, SensorState, SmoothedReading};
pub use buffer::WriteBuffer;
pub use config::{AcquisitionConfig, RecorderConfig};
pub use control::{Request, Response, Station};
pub use ema::PressureFilter;
pub use error::{FdrError, FdrResult};
pub use recorder::{Recorder, SampleSource, Session, SessionPlan};
pub use scan::BusScan;
pub use storage::Storage;
