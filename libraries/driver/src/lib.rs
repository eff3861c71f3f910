//! BME280 / BMP280 drivers for real hardware.
//!
//! `I2cBaroBus` is the production `hal::DeviceBus`: hand it the board's
//! `embedded-hal` I2C peripheral and pass it to `fdr::BaroAcquisition`.

#![cfg_attr(not(test), no_std)]

pub mod baro;

pub use baro::{Bmx280, Bmx280Config, Bmx280Error, I2cBaroBus, I2cDevice, SharedI2c};
