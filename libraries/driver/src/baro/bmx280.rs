use embedded_hal::i2c::ErrorKind;
use hal::{BaroDevice, DriverKind, SamplingProfile};
use log::warn;
use thiserror::Error;

use crate::baro::I2cDevice;

// BMx280 I2C addresses (depends on SDO pin state)
pub const BMX280_I2C_ADDR_PRIMARY: u8 = 0x76;
pub const BMX280_I2C_ADDR_SECONDARY: u8 = 0x77;

// Register addresses
pub const BMX280_REG_CALIB_START: u8 = 0x88;
pub const BMX280_REG_CALIB_LENGTH: usize = 24;
pub const BMX280_REG_ID: u8 = 0xD0;
pub const BMX280_REG_RESET: u8 = 0xE0;
pub const BME280_REG_CTRL_HUM: u8 = 0xF2;
pub const BMX280_REG_STATUS: u8 = 0xF3;
pub const BMX280_REG_CTRL_MEAS: u8 = 0xF4;
pub const BMX280_REG_CONFIG: u8 = 0xF5;
pub const BMX280_REG_PRESSURE_MSB: u8 = 0xF7;

// Chip IDs for verification
pub const BME280_CHIP_ID: u8 = 0x60;
pub const BMP280_CHIP_ID: u8 = 0x58;

// Reset command
pub const BMX280_RESET_CMD: u8 = 0xB6;

// Status bit set while NVM calibration is copied into the image registers
const BMX280_STATUS_IM_UPDATE: u8 = 0x01;
const BMX280_RESET_POLL_LIMIT: usize = 32;

// Filter settings (IIR filter coefficient)
pub const BMX280_FILTER_OFF: u8 = 0x00;
pub const BMX280_FILTER_16: u8 = 0x04;

// Oversampling settings for temperature, pressure and humidity
pub const BMX280_OVERSAMPLING_SKIP: u8 = 0x00;
pub const BMX280_OVERSAMPLING_1X: u8 = 0x01;
pub const BMX280_OVERSAMPLING_8X: u8 = 0x04;
pub const BMX280_OVERSAMPLING_16X: u8 = 0x05;

// Power mode settings
pub const BMX280_POWER_SLEEP: u8 = 0x00;
pub const BMX280_POWER_NORMAL: u8 = 0x03;

// Standby time settings (for normal power mode)
pub const BMX280_STANDBY_0_5_MS: u8 = 0x00;
pub const BMX280_STANDBY_125_MS: u8 = 0x02;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bmx280Error {
    #[error("bus error: {0:?}")]
    Bus(ErrorKind),

    #[error("unexpected chip id {found:#04x} (expected {expected:#04x})")]
    UnexpectedChipId { expected: u8, found: u8 },

    #[error("calibration data not loaded")]
    NotCalibrated,
}

impl From<ErrorKind> for Bmx280Error {
    fn from(kind: ErrorKind) -> Self {
        Bmx280Error::Bus(kind)
    }
}

/// Measurement configuration for a BMx280
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmx280Config {
    /// Temperature oversampling setting
    pub temp_oversampling: u8,

    /// Pressure oversampling setting
    pub pressure_oversampling: u8,

    /// Humidity oversampling setting (BME280 only)
    pub humidity_oversampling: u8,

    /// IIR filter coefficient
    pub filter_coefficient: u8,

    /// Standby time between measurements in normal mode
    pub standby_time: u8,

    /// Power mode (sleep, forced, normal)
    pub power_mode: u8,
}

impl Bmx280Config {
    /// Register settings for a sampling profile on the given part
    pub fn for_profile(kind: DriverKind, profile: SamplingProfile) -> Self {
        match (kind, profile) {
            (DriverKind::Bme280, SamplingProfile::HighPrecision) => Self {
                temp_oversampling: BMX280_OVERSAMPLING_16X,
                pressure_oversampling: BMX280_OVERSAMPLING_16X,
                humidity_oversampling: BMX280_OVERSAMPLING_16X,
                filter_coefficient: BMX280_FILTER_16,
                standby_time: BMX280_STANDBY_125_MS,
                power_mode: BMX280_POWER_NORMAL,
            },
            (DriverKind::Bmp280, SamplingProfile::HighPrecision) => Self {
                temp_oversampling: BMX280_OVERSAMPLING_8X,
                pressure_oversampling: BMX280_OVERSAMPLING_8X,
                humidity_oversampling: BMX280_OVERSAMPLING_SKIP,
                filter_coefficient: BMX280_FILTER_16,
                standby_time: BMX280_STANDBY_125_MS,
                power_mode: BMX280_POWER_NORMAL,
            },
            (kind, SamplingProfile::Fast) => Self {
                temp_oversampling: BMX280_OVERSAMPLING_1X,
                pressure_oversampling: BMX280_OVERSAMPLING_1X,
                humidity_oversampling: match kind {
                    DriverKind::Bme280 => BMX280_OVERSAMPLING_1X,
                    DriverKind::Bmp280 => BMX280_OVERSAMPLING_SKIP,
                },
                filter_coefficient: BMX280_FILTER_OFF,
                standby_time: BMX280_STANDBY_0_5_MS,
                power_mode: BMX280_POWER_NORMAL,
            },
        }
    }

    fn ctrl_meas(&self) -> u8 {
        (self.temp_oversampling << 5) | (self.pressure_oversampling << 2) | self.power_mode
    }

    fn config(&self) -> u8 {
        (self.standby_time << 5) | (self.filter_coefficient << 2)
    }
}

/// Temperature and pressure trimming parameters
#[derive(Debug, Clone, Copy)]
struct Bmx280CalibData {
    dig_t1: u16,
    dig_t2: i16,
    dig_t3: i16,

    dig_p1: u16,
    dig_p2: i16,
    dig_p3: i16,
    dig_p4: i16,
    dig_p5: i16,
    dig_p6: i16,
    dig_p7: i16,
    dig_p8: i16,
    dig_p9: i16,
}

impl Bmx280CalibData {
    fn from_bytes(buffer: &[u8; BMX280_REG_CALIB_LENGTH]) -> Self {
        Self {
            dig_t1: u16::from_le_bytes([buffer[0], buffer[1]]),
            dig_t2: i16::from_le_bytes([buffer[2], buffer[3]]),
            dig_t3: i16::from_le_bytes([buffer[4], buffer[5]]),
            dig_p1: u16::from_le_bytes([buffer[6], buffer[7]]),
            dig_p2: i16::from_le_bytes([buffer[8], buffer[9]]),
            dig_p3: i16::from_le_bytes([buffer[10], buffer[11]]),
            dig_p4: i16::from_le_bytes([buffer[12], buffer[13]]),
            dig_p5: i16::from_le_bytes([buffer[14], buffer[15]]),
            dig_p6: i16::from_le_bytes([buffer[16], buffer[17]]),
            dig_p7: i16::from_le_bytes([buffer[18], buffer[19]]),
            dig_p8: i16::from_le_bytes([buffer[20], buffer[21]]),
            dig_p9: i16::from_le_bytes([buffer[22], buffer[23]]),
        }
    }
}

/// Raw 20-bit ADC values
#[derive(Debug, Clone, Copy)]
struct RawMeasurements {
    pressure: u32,
    temperature: u32,
}

/// Returns (temperature in Celsius, t_fine)
fn compensate_temperature(raw_temp: u32, cal: &Bmx280CalibData) -> (f64, f64) {
    let adc = raw_temp as f64;
    let var1 = (adc / 16384.0 - (cal.dig_t1 as f64) / 1024.0) * (cal.dig_t2 as f64);
    let var2 = (adc / 131072.0 - (cal.dig_t1 as f64) / 8192.0)
        * (adc / 131072.0 - (cal.dig_t1 as f64) / 8192.0)
        * (cal.dig_t3 as f64);

    let t_fine = var1 + var2;
    (t_fine / 5120.0, t_fine)
}

/// Pressure in Pascals
fn compensate_pressure(raw_pressure: u32, t_fine: f64, cal: &Bmx280CalibData) -> f64 {
    let var1 = t_fine / 2.0 - 64000.0;
    let var2 = var1 * var1 * (cal.dig_p6 as f64) / 32768.0;
    let var2 = var2 + var1 * (cal.dig_p5 as f64) * 2.0;
    let var2 = var2 / 4.0 + (cal.dig_p4 as f64) * 65536.0;
    let var1 = ((cal.dig_p3 as f64) * var1 * var1 / 524288.0 + (cal.dig_p2 as f64) * var1) / 524288.0;
    let var1 = (1.0 + var1 / 32768.0) * (cal.dig_p1 as f64);

    if var1 == 0.0 {
        return 0.0;
    }

    let pressure = 1048576.0 - (raw_pressure as f64);
    let pressure = (pressure - var2 / 4096.0) * 6250.0 / var1;
    let var1 = (cal.dig_p9 as f64) * pressure * pressure / 2147483648.0;
    let var2 = pressure * (cal.dig_p8 as f64) / 32768.0;
    pressure + (var1 + var2 + (cal.dig_p7 as f64)) / 16.0
}

/// BME280 / BMP280 barometer
pub struct Bmx280<I: I2cDevice> {
    i2c: I,
    addr: u8,
    kind: DriverKind,
    config: Bmx280Config,
    cal: Option<Bmx280CalibData>,
}

impl<I: I2cDevice> Bmx280<I> {
    pub fn new(i2c: I, addr: u8, kind: DriverKind) -> Self {
        Self {
            i2c,
            addr,
            kind,
            config: Bmx280Config::for_profile(kind, SamplingProfile::HighPrecision),
            cal: None,
        }
    }

    pub fn expected_chip_id(&self) -> u8 {
        match self.kind {
            DriverKind::Bme280 => BME280_CHIP_ID,
            DriverKind::Bmp280 => BMP280_CHIP_ID,
        }
    }

    pub fn config(&self) -> &Bmx280Config {
        &self.config
    }

    /// Verify the part, reset it, load calibration and apply the current configuration
    pub fn init(&mut self) -> Result<(), Bmx280Error> {
        let chip_id = self.i2c.read_reg(self.addr, BMX280_REG_ID)?;
        let expected = self.expected_chip_id();
        if chip_id != expected {
            return Err(Bmx280Error::UnexpectedChipId {
                expected,
                found: chip_id,
            });
        }

        self.i2c.write_reg(self.addr, BMX280_REG_RESET, BMX280_RESET_CMD)?;
        self.wait_for_nvm_copy();

        let mut buffer = [0u8; BMX280_REG_CALIB_LENGTH];
        self.i2c.read_regs(self.addr, BMX280_REG_CALIB_START, &mut buffer)?;
        self.cal = Some(Bmx280CalibData::from_bytes(&buffer));

        self.apply_config(self.config)
    }

    /// Write a new measurement configuration to the device
    pub fn apply_config(&mut self, config: Bmx280Config) -> Result<(), Bmx280Error> {
        // config is only writable reliably in sleep mode
        self.i2c.write_reg(self.addr, BMX280_REG_CTRL_MEAS, BMX280_POWER_SLEEP)?;
        if self.kind == DriverKind::Bme280 {
            // ctrl_hum takes effect on the next ctrl_meas write
            self.i2c.write_reg(self.addr, BME280_REG_CTRL_HUM, config.humidity_oversampling)?;
        }
        self.i2c.write_reg(self.addr, BMX280_REG_CONFIG, config.config())?;
        self.i2c.write_reg(self.addr, BMX280_REG_CTRL_MEAS, config.ctrl_meas())?;
        self.config = config;
        Ok(())
    }

    /// Temperature in Celsius
    pub fn temperature(&mut self) -> Result<f32, Bmx280Error> {
        let cal = self.cal.ok_or(Bmx280Error::NotCalibrated)?;
        let raw = self.read_raw_measurements()?;
        let (temperature, _) = compensate_temperature(raw.temperature, &cal);
        Ok(temperature as f32)
    }

    /// Pressure in Pascals
    pub fn pressure(&mut self) -> Result<f32, Bmx280Error> {
        let cal = self.cal.ok_or(Bmx280Error::NotCalibrated)?;
        let raw = self.read_raw_measurements()?;
        // t_fine from the same burst read keeps both values consistent
        let (_, t_fine) = compensate_temperature(raw.temperature, &cal);
        Ok(compensate_pressure(raw.pressure, t_fine, &cal) as f32)
    }

    /// The part may NACK while it starts up after a reset; a bus error
    /// counts as still busy.
    fn wait_for_nvm_copy(&mut self) {
        for _ in 0..BMX280_RESET_POLL_LIMIT {
            if let Ok(status) = self.i2c.read_reg(self.addr, BMX280_REG_STATUS) {
                if status & BMX280_STATUS_IM_UPDATE == 0 {
                    return;
                }
            }
        }
        warn!("{} at {:#04x} still busy after reset", self.kind.name(), self.addr);
    }

    fn read_raw_measurements(&mut self) -> Result<RawMeasurements, Bmx280Error> {
        let mut buffer = [0u8; 6];
        self.i2c.read_regs(self.addr, BMX280_REG_PRESSURE_MSB, &mut buffer)?;

        let pressure = ((buffer[0] as u32) << 12) | ((buffer[1] as u32) << 4) | ((buffer[2] as u32) >> 4);
        let temperature = ((buffer[3] as u32) << 12) | ((buffer[4] as u32) << 4) | ((buffer[5] as u32) >> 4);

        Ok(RawMeasurements {
            pressure,
            temperature,
        })
    }
}

impl<I: I2cDevice> BaroDevice for Bmx280<I> {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    fn address(&self) -> u8 {
        self.addr
    }

    fn read_temperature(&mut self) -> Option<f32> {
        self.temperature().ok()
    }

    fn read_pressure(&mut self) -> Option<f32> {
        self.pressure().ok()
    }

    fn configure(&mut self, profile: SamplingProfile) -> bool {
        let config = Bmx280Config::for_profile(self.kind, profile);
        match self.apply_config(config) {
            Ok(()) => true,
            Err(err) => {
                warn!("{} at {:#04x}: failed to apply {:?}: {}", self.kind.name(), self.addr, profile, err);
                false
            }
        }
    }
}
