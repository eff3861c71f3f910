//! Barometer device bus interface

/// Driver families that speak the BMx280 register protocol.
///
/// `Bme280` is tried first; `Bmp280` is the fallback for boards that carry
/// the cheaper part behind the same footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverKind {
    Bme280,
    Bmp280,
}

impl DriverKind {
    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::Bme280 => "BME280",
            DriverKind::Bmp280 => "BMP280",
        }
    }
}

/// Oversampling/filtering profile applied to an open device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingProfile {
    /// Maximum oversampling and IIR filtering, slow updates
    HighPrecision,
    /// Minimal oversampling, filter off, shortest standby
    Fast,
}

/// An opened barometer
pub trait BaroDevice {
    /// Driver family this handle was opened with
    fn kind(&self) -> DriverKind;

    /// Bus address of the device
    fn address(&self) -> u8;

    /// Read the current temperature in Celsius
    fn read_temperature(&mut self) -> Option<f32>;

    /// Read the current pressure in Pascals
    fn read_pressure(&mut self) -> Option<f32>;

    /// Apply a sampling profile
    ///
    /// Returns true if the device accepted the new configuration
    fn configure(&mut self, profile: SamplingProfile) -> bool;
}

/// Shared bus that barometers are discovered on
pub trait DeviceBus {
    type Device: BaroDevice;

    /// Returns true if a device acknowledges at `addr`
    fn probe(&mut self, addr: u8) -> bool;

    /// Read a single register from the device at `addr`
    fn read_register(&mut self, addr: u8, reg: u8) -> Option<u8>;

    /// Begin a device at `addr` with the given driver
    ///
    /// Returns `None` if the device does not answer or does not identify
    /// as a part the driver supports
    fn open(&mut self, addr: u8, kind: DriverKind) -> Option<Self::Device>;
}
