//! Barometer discovery, validation and smoothing

use hal::{BaroDevice, DeviceBus, DriverKind, SamplingProfile};
use log::{debug, info, warn};

use crate::config::{AcquisitionConfig, FALLBACK_DRIVER, PRIMARY_DRIVER};
use crate::ema::PressureFilter;
use crate::error::{FdrError, FdrResult};
use crate::recorder::SampleSource;
use crate::scan::BusScan;

/// Lifecycle of the barometer as seen by the acquisition layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    /// No device; the next cycle starts a bus scan
    Unconfigured,
    /// Bus scan in progress, resumed every cycle
    Scanning,
    /// Reading from a device opened with the given driver
    Active(DriverKind),
    /// Device dropped after repeated bad readings; the next cycle re-scans
    Degraded,
}

/// Latest externally observable reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedReading {
    /// Celsius, absent if the bus read failed
    pub temperature: Option<f32>,
    /// Unfiltered pressure in hPa, absent if the bus read failed
    pub pressure_raw: Option<f32>,
    /// Filtered pressure in hPa, absent until the filter has been seeded
    pub pressure_smoothed: Option<f32>,
}

/// Owns the barometer: finds it on the bus, reads it every cycle and
/// recovers from a missing or misbehaving part without outside help.
pub struct BaroAcquisition<B: DeviceBus> {
    bus: B,
    config: AcquisitionConfig,
    state: SensorState,
    device: Option<B::Device>,
    scan: BusScan,
    bad_reads: u8,
    filter: PressureFilter,
    reading: Option<SmoothedReading>,
}

impl<B: DeviceBus> BaroAcquisition<B> {
    /// Create an unconfigured instance. The bus is not touched until
    /// `initialize` or `cycle` is called.
    pub fn new(bus: B, config: AcquisitionConfig) -> Self {
        Self {
            bus,
            config,
            state: SensorState::Unconfigured,
            device: None,
            scan: BusScan::new(config.scan_first, config.scan_last),
            bad_reads: 0,
            filter: PressureFilter::new(config.ema_alpha),
            reading: None,
        }
    }

    /// Single quick probe of the primary address with the primary driver.
    ///
    /// A miss is not an error; the next `cycle` falls back to a bus scan.
    pub fn initialize(&mut self) {
        self.device = None;
        self.bad_reads = 0;
        self.reading = None;
        self.filter.reset();

        let address = self.config.primary_address;
        match self.bus.open(address, PRIMARY_DRIVER) {
            Some(device) => self.activate(device),
            None => {
                self.state = SensorState::Unconfigured;
                info!("initial probe at {:#04x} failed, will scan on cycle", address);
            }
        }
    }

    /// Advance the acquisition state machine by one step.
    ///
    /// `SensorNotFound` and `SensorDegraded` are informational: the state
    /// machine has already arranged to retry on the next cycle.
    pub fn cycle(&mut self) -> FdrResult<()> {
        match self.state {
            SensorState::Active(_) => self.read_cycle(),
            SensorState::Scanning => self.scan_step(),
            SensorState::Unconfigured | SensorState::Degraded => {
                debug!(
                    "scanning bus {:#04x}..={:#04x}",
                    self.config.scan_first, self.config.scan_last
                );
                self.scan = BusScan::new(self.config.scan_first, self.config.scan_last);
                self.state = SensorState::Scanning;
                self.scan_step()
            }
        }
    }

    /// Switch the active device between low-latency and high-precision sampling.
    ///
    /// No-op without an active device. A device found later starts in high
    /// precision.
    pub fn set_fast_mode(&mut self, enabled: bool) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        let profile = if enabled {
            SamplingProfile::Fast
        } else {
            SamplingProfile::HighPrecision
        };
        if device.configure(profile) {
            info!(
                "{} {}",
                device.kind().name(),
                if enabled {
                    "fast mode enabled (low latency)"
                } else {
                    "high precision mode restored"
                }
            );
        } else {
            warn!("{} rejected {:?} profile", device.kind().name(), profile);
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SensorState::Active(_))
    }

    pub fn active_variant(&self) -> Option<DriverKind> {
        match self.state {
            SensorState::Active(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn latest_temperature(&self) -> Option<f32> {
        self.reading.and_then(|reading| reading.temperature)
    }

    pub fn latest_smoothed_pressure(&self) -> Option<f32> {
        self.reading.and_then(|reading| reading.pressure_smoothed)
    }

    pub fn reading(&self) -> Option<SmoothedReading> {
        self.reading
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Consecutive out-of-range readings so far
    pub fn bad_reads(&self) -> u8 {
        self.bad_reads
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn scan_step(&mut self) -> FdrResult<()> {
        for _ in 0..self.config.scan_batch.max(1) {
            let Some(address) = self.scan.next_address() else {
                break;
            };
            if !self.bus.probe(address) {
                continue;
            }

            self.scan.record_response();
            debug!("device at {:#04x}", address);

            if address == self.config.primary_address && self.device.is_none() {
                if let Some(device) = self.open_with_fallback() {
                    self.activate(device);
                    debug!("scan stopped with {} responding devices", self.scan.responding());
                    return Ok(());
                }
                warn!("barometer init failed at {:#04x}, continuing scan", address);
            }
        }

        if !self.scan.is_finished() {
            return Ok(());
        }

        let responding = self.scan.responding();
        if responding == 0 {
            warn!("no devices found on bus");
        } else {
            info!("total devices found: {}", responding);
        }
        self.state = SensorState::Unconfigured;
        Err(FdrError::SensorNotFound { responding })
    }

    /// Layered fallback for a device answering at the primary address:
    /// primary driver, identity read, primary driver again, primary driver
    /// at the secondary address, then the fallback driver if the identity
    /// matched the family.
    fn open_with_fallback(&mut self) -> Option<B::Device> {
        let primary = self.config.primary_address;

        if let Some(device) = self.bus.open(primary, PRIMARY_DRIVER) {
            return Some(device);
        }

        let chip_id = self.bus.read_register(primary, self.config.chip_id_register);
        match chip_id {
            Some(id) => info!("chip id at {:#04x}: {:#04x}", primary, id),
            None => warn!("failed to read chip id at {:#04x}", primary),
        }

        if let Some(device) = self.bus.open(primary, PRIMARY_DRIVER) {
            return Some(device);
        }

        if let Some(device) = self.bus.open(self.config.secondary_address, PRIMARY_DRIVER) {
            return Some(device);
        }

        if chip_id == Some(self.config.family_chip_id) {
            return self.bus.open(primary, FALLBACK_DRIVER);
        }

        None
    }

    fn activate(&mut self, mut device: B::Device) {
        if !device.configure(SamplingProfile::HighPrecision) {
            warn!("{} rejected high precision profile", device.kind().name());
        }
        info!("{} initialized at {:#04x}", device.kind().name(), device.address());

        self.state = SensorState::Active(device.kind());
        self.device = Some(device);
        self.bad_reads = 0;
    }

    fn read_cycle(&mut self) -> FdrResult<()> {
        let Some(device) = self.device.as_mut() else {
            self.state = SensorState::Unconfigured;
            return Ok(());
        };

        let temperature = device.read_temperature();
        let pressure_raw = device.read_pressure().map(|pa| pa / 100.0);

        if let Some(raw) = pressure_raw {
            if self.filter.is_initialized() {
                self.filter.update(raw);
            } else if self.config.pressure_in_range(raw) {
                self.filter.seed(raw);
            }
        }

        self.reading = Some(SmoothedReading {
            temperature,
            pressure_raw,
            pressure_smoothed: self.filter.value(),
        });

        let valid = match (temperature, pressure_raw) {
            (Some(t), Some(p)) => self.config.temperature_in_range(t) && self.config.pressure_in_range(p),
            _ => false,
        };
        if valid {
            self.bad_reads = 0;
            return Ok(());
        }

        self.bad_reads = self.bad_reads.saturating_add(1);
        warn!(
            "bad reading #{} (temperature {:?}, pressure {:?})",
            self.bad_reads, temperature, pressure_raw
        );

        if self.bad_reads < self.config.bad_reads_max {
            return Ok(());
        }

        let bad_reads = self.bad_reads;
        warn!("consecutive bad readings, forcing re-scan");
        self.device = None;
        self.state = SensorState::Degraded;
        self.bad_reads = 0;
        self.filter.reset();
        self.reading = None;
        Err(FdrError::SensorDegraded { bad_reads })
    }
}

impl<B: DeviceBus> SampleSource for BaroAcquisition<B> {
    fn is_ready(&self) -> bool {
        BaroAcquisition::is_ready(self)
    }

    fn latest_smoothed_pressure(&self) -> Option<f32> {
        BaroAcquisition::latest_smoothed_pressure(self)
    }

    fn set_fast_mode(&mut self, enabled: bool) {
        BaroAcquisition::set_fast_mode(self, enabled)
    }
}
