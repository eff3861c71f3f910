use std::f32::consts::TAU;
use std::time::Instant;

use clap::ValueEnum;
use hal::{BaroDevice, DeviceBus, DriverKind, SamplingProfile};
use log::debug;

/// Display controller that answers on the bus but is not a barometer
const DECOY_ADDRESS: u8 = 0x3C;

const CHIP_ID_REGISTER: u8 = 0xD0;

const SEA_LEVEL_PA: f32 = 101_325.0;

/// Period of the simulated climb and descent
const PROFILE_PERIOD_S: f32 = 120.0;
const PROFILE_PEAK_M: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Part {
    Bme280,
    Bmp280,
    None,
}

impl Part {
    fn kind(self) -> Option<DriverKind> {
        match self {
            Part::Bme280 => Some(DriverKind::Bme280),
            Part::Bmp280 => Some(DriverKind::Bmp280),
            Part::None => None,
        }
    }
}

fn chip_id(kind: DriverKind) -> u8 {
    match kind {
        DriverKind::Bme280 => 0x60,
        DriverKind::Bmp280 => 0x58,
    }
}

/// I2C bus with at most one barometer and a decoy device
pub struct SimBus {
    baro: Option<(u8, DriverKind)>,
    origin: Instant,
}

impl SimBus {
    pub fn new(part: Part, address: u8) -> Self {
        Self {
            baro: part.kind().map(|kind| (address, kind)),
            origin: Instant::now(),
        }
    }
}

impl DeviceBus for SimBus {
    type Device = SimBaro;

    fn probe(&mut self, addr: u8) -> bool {
        addr == DECOY_ADDRESS || self.baro.is_some_and(|(address, _)| address == addr)
    }

    fn read_register(&mut self, addr: u8, reg: u8) -> Option<u8> {
        match self.baro {
            Some((address, kind)) if address == addr && reg == CHIP_ID_REGISTER => Some(chip_id(kind)),
            Some((address, _)) if address == addr => Some(0),
            _ if addr == DECOY_ADDRESS => Some(0),
            _ => None,
        }
    }

    fn open(&mut self, addr: u8, kind: DriverKind) -> Option<SimBaro> {
        match self.baro {
            Some((address, installed)) if address == addr && installed == kind => Some(SimBaro {
                kind,
                address,
                origin: self.origin,
                profile: SamplingProfile::HighPrecision,
            }),
            Some((address, installed)) if address == addr => {
                debug!(
                    "sim: chip id {:#04x} rejected by {} driver",
                    chip_id(installed),
                    kind.name()
                );
                None
            }
            _ => None,
        }
    }
}

/// Barometer following a slow climb and descent
pub struct SimBaro {
    kind: DriverKind,
    address: u8,
    origin: Instant,
    profile: SamplingProfile,
}

impl SimBaro {
    fn elapsed_s(&self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }

    fn altitude_m(&self) -> f32 {
        let phase = self.elapsed_s() / PROFILE_PERIOD_S * TAU;
        PROFILE_PEAK_M * 0.5 * (1.0 - phase.cos())
    }

    /// Deterministic ripple standing in for sensor noise, larger without oversampling
    fn noise_pa(&self) -> f32 {
        let amplitude = match self.profile {
            SamplingProfile::HighPrecision => 1.5,
            SamplingProfile::Fast => 6.0,
        };
        amplitude * (self.elapsed_s() * 7.3).sin()
    }
}

impl BaroDevice for SimBaro {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn read_temperature(&mut self) -> Option<f32> {
        // standard lapse rate
        Some(21.0 - 0.0065 * self.altitude_m())
    }

    fn read_pressure(&mut self) -> Option<f32> {
        let ratio = 1.0 - 2.255_77e-5 * self.altitude_m();
        Some(SEA_LEVEL_PA * ratio.powf(5.255_88) + self.noise_pa())
    }

    fn configure(&mut self, profile: SamplingProfile) -> bool {
        self.profile = profile;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmp280_only_opens_with_its_driver() {
        let mut bus = SimBus::new(Part::Bmp280, 0x76);
        assert!(bus.probe(0x76));
        assert!(bus.probe(DECOY_ADDRESS));
        assert!(!bus.probe(0x77));

        assert!(bus.open(0x76, DriverKind::Bme280).is_none());
        assert_eq!(bus.read_register(0x76, CHIP_ID_REGISTER), Some(0x58));
        assert!(bus.open(0x76, DriverKind::Bmp280).is_some());
    }

    #[test]
    fn test_pressure_near_sea_level_at_start() {
        let mut bus = SimBus::new(Part::Bme280, 0x76);
        let mut baro = bus.open(0x76, DriverKind::Bme280).unwrap();
        let hpa = baro.read_pressure().unwrap() / 100.0;
        assert!((1000.0..1020.0).contains(&hpa), "got {}", hpa);
    }

    #[test]
    fn test_no_part() {
        let mut bus = SimBus::new(Part::None, 0x76);
        assert!(!bus.probe(0x76));
        assert_eq!(bus.read_register(0x76, CHIP_ID_REGISTER), None);
    }
}
