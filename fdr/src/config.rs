//! Tunables for acquisition and recording

use hal::DriverKind;

// Bus addresses (SDO low / high)
pub const PRIMARY_ADDRESS: u8 = 0x76;
pub const SECONDARY_ADDRESS: u8 = 0x77;

/// Identity register of the BMx280 family
pub const CHIP_ID_REGISTER: u8 = 0xD0;

/// Identity value that makes the fallback driver worth trying
pub const FAMILY_CHIP_ID: u8 = 0x58;

pub const PRIMARY_DRIVER: DriverKind = DriverKind::Bme280;
pub const FALLBACK_DRIVER: DriverKind = DriverKind::Bmp280;

pub const BAD_READS_MAX: u8 = 3;

/// 0.0–1.0, higher means less smoothing
pub const PRESSURE_EMA_ALPHA: f32 = 0.25;

// Validation ranges
pub const TEMPERATURE_MIN: f32 = -40.0;
pub const TEMPERATURE_MAX: f32 = 85.0;
pub const PRESSURE_MIN_HPA: f32 = 300.0;
pub const PRESSURE_MAX_HPA: f32 = 1100.0;

// 7-bit addresses outside the reserved ranges
pub const SCAN_FIRST_ADDRESS: u8 = 1;
pub const SCAN_LAST_ADDRESS: u8 = 119;

/// Addresses probed per cycle while scanning
pub const SCAN_BATCH: u8 = 16;

pub const FDR_PATH: &str = "/fdr.csv";
pub const CSV_HEADER: &str = "timestamp_s,pressure_hpa\n";

pub const MAX_SAMPLES_PER_SEC: u32 = 50;

/// Buffered bytes that force a flush
pub const BUFFER_FLUSH_THRESHOLD: usize = 1024;

/// Age of the last flush that forces a flush of whatever is buffered
pub const BUFFER_FLUSH_INTERVAL_MS: u64 = 250;

pub const BUFFER_CAPACITY: usize = 2 * BUFFER_FLUSH_THRESHOLD;

pub const EXPORT_CHUNK_SIZE: usize = 256;

/// Sensor discovery and validation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionConfig {
    pub primary_address: u8,
    pub secondary_address: u8,
    pub chip_id_register: u8,
    pub family_chip_id: u8,
    pub bad_reads_max: u8,
    pub ema_alpha: f32,
    pub temperature_min: f32,
    pub temperature_max: f32,
    pub pressure_min_hpa: f32,
    pub pressure_max_hpa: f32,
    pub scan_first: u8,
    pub scan_last: u8,
    pub scan_batch: u8,
}

impl AcquisitionConfig {
    pub fn temperature_in_range(&self, celsius: f32) -> bool {
        (self.temperature_min..=self.temperature_max).contains(&celsius)
    }

    pub fn pressure_in_range(&self, hpa: f32) -> bool {
        (self.pressure_min_hpa..=self.pressure_max_hpa).contains(&hpa)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            primary_address: PRIMARY_ADDRESS,
            secondary_address: SECONDARY_ADDRESS,
            chip_id_register: CHIP_ID_REGISTER,
            family_chip_id: FAMILY_CHIP_ID,
            bad_reads_max: BAD_READS_MAX,
            ema_alpha: PRESSURE_EMA_ALPHA,
            temperature_min: TEMPERATURE_MIN,
            temperature_max: TEMPERATURE_MAX,
            pressure_min_hpa: PRESSURE_MIN_HPA,
            pressure_max_hpa: PRESSURE_MAX_HPA,
            scan_first: SCAN_FIRST_ADDRESS,
            scan_last: SCAN_LAST_ADDRESS,
            scan_batch: SCAN_BATCH,
        }
    }
}

/// Recording file and flush policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Path of the recording on the store
    pub path: &'static str,
    pub max_samples_per_second: u32,
    pub flush_threshold: usize,
    pub flush_interval_ms: u64,
    pub buffer_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            path: FDR_PATH,
            max_samples_per_second: MAX_SAMPLES_PER_SEC,
            flush_threshold: BUFFER_FLUSH_THRESHOLD,
            flush_interval_ms: BUFFER_FLUSH_INTERVAL_MS,
            buffer_capacity: BUFFER_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_ranges_are_inclusive() {
        let config = AcquisitionConfig::default();
        assert!(config.temperature_in_range(-40.0));
        assert!(config.temperature_in_range(85.0));
        assert!(!config.temperature_in_range(85.1));
        assert!(config.pressure_in_range(300.0));
        assert!(config.pressure_in_range(1100.0));
        assert!(!config.pressure_in_range(299.9));
        assert!(!config.pressure_in_range(f32::NAN));
    }
}
