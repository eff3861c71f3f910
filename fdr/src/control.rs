//! Request surface and the cooperative control step

use hal::{Clock, DeviceBus, ExportSink, PersistentStore, StatusIndicator};
use log::warn;

use crate::acquisition::BaroAcquisition;
use crate::error::FdrError;
use crate::recorder::{Recorder, SessionPlan};

pub const DEFAULT_DURATION_S: u32 = 180;
pub const DEFAULT_SAMPLES_PER_SECOND: u32 = 1;

/// Inbound operator request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Reading,
    Start {
        duration_s: Option<u32>,
        samples_per_second: Option<u32>,
    },
    Stop,
    Reset,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response {
    /// Latest temperature (C) and smoothed pressure (hPa)
    Reading {
        temperature: Option<f32>,
        pressure: f32,
    },
    NotReady,
    Started(SessionPlan),
    Stopped,
    Reset,
    Exported { bytes: usize },
    Failed(FdrError),
}

/// The barometer and the recorder, driven by one control loop
pub struct Station<B, S, I, C>
where
    B: DeviceBus,
    S: PersistentStore,
    I: StatusIndicator,
    C: Clock,
{
    pub sensor: BaroAcquisition<B>,
    pub recorder: Recorder<S, I, C>,
}

impl<B, S, I, C> Station<B, S, I, C>
where
    B: DeviceBus,
    S: PersistentStore,
    I: StatusIndicator,
    C: Clock,
{
    pub fn new(sensor: BaroAcquisition<B>, recorder: Recorder<S, I, C>) -> Self {
        Self { sensor, recorder }
    }

    pub fn initialize(&mut self) {
        self.sensor.initialize();
    }

    /// One pass of the control loop: sensor, then requests, then recorder.
    ///
    /// A request served here completes before the recorder samples, so a
    /// tick never sees a half-started session.
    pub fn step<F>(&mut self, serve: F)
    where
        F: FnOnce(&mut Self),
    {
        if let Err(e) = self.sensor.cycle() {
            warn!("{}", e);
        }
        serve(self);
        self.recorder.cycle(&mut self.sensor);
    }

    /// Serve one request. `sink` receives the recording on `Export`.
    pub fn handle<K: ExportSink + ?Sized>(&mut self, request: Request, sink: &mut K) -> Response {
        match request {
            Request::Reading => match (self.sensor.is_ready(), self.sensor.latest_smoothed_pressure()) {
                (true, Some(pressure)) => Response::Reading {
                    temperature: self.sensor.latest_temperature(),
                    pressure,
                },
                _ => Response::NotReady,
            },
            Request::Start {
                duration_s,
                samples_per_second,
            } => {
                let duration_s = duration_s.unwrap_or(DEFAULT_DURATION_S);
                let rate = samples_per_second.unwrap_or(DEFAULT_SAMPLES_PER_SECOND);
                match self.recorder.start(&mut self.sensor, duration_s, rate) {
                    Ok(plan) => Response::Started(plan),
                    Err(e) => Response::Failed(e),
                }
            }
            Request::Stop => {
                self.recorder.stop(&mut self.sensor);
                Response::Stopped
            }
            Request::Reset => match self.recorder.reset(&mut self.sensor) {
                Ok(()) => Response::Reset,
                Err(e) => Response::Failed(e),
            },
            Request::Export => match self.recorder.export_to(sink) {
                Ok(bytes) => Response::Exported { bytes },
                Err(e) => Response::Failed(e),
            },
        }
    }
}
