// Barometer drivers for the BMx280 family on a shared I2C bus.
//
// The bus is owned by a `RefCell` so that the address scanner and the opened
// device can take turns on it from the same control loop.

use core::cell::RefCell;

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use hal::{DeviceBus, DriverKind};
use log::debug;

pub mod bmx280;

pub use self::bmx280::{Bmx280, Bmx280Config, Bmx280Error};

/// Register-level access to devices on an I2C bus
pub trait I2cDevice {
    /// Write data to a device at the specified address
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), ErrorKind>;

    /// Write data to a device and then read from it (combined operation)
    fn write_read(&mut self, addr: u8, write_data: &[u8], read_data: &mut [u8]) -> Result<(), ErrorKind>;

    /// Read a single register from a device
    fn read_reg(&mut self, addr: u8, reg: u8) -> Result<u8, ErrorKind> {
        let mut buffer = [0u8; 1];
        self.write_read(addr, &[reg], &mut buffer)?;
        Ok(buffer[0])
    }

    /// Write to a single register on a device
    fn write_reg(&mut self, addr: u8, reg: u8, value: u8) -> Result<(), ErrorKind> {
        self.write(addr, &[reg, value])
    }

    /// Read consecutive registers starting at `reg`
    fn read_regs(&mut self, addr: u8, reg: u8, data: &mut [u8]) -> Result<(), ErrorKind> {
        self.write_read(addr, &[reg], data)
    }
}

/// Handle onto an I2C bus shared through a `RefCell`
pub struct SharedI2c<'a, I> {
    bus: &'a RefCell<I>,
}

impl<'a, I> SharedI2c<'a, I> {
    pub fn new(bus: &'a RefCell<I>) -> Self {
        Self { bus }
    }
}

impl<I> Clone for SharedI2c<'_, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I> Copy for SharedI2c<'_, I> {}

impl<I: I2c> I2cDevice for SharedI2c<'_, I> {
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<(), ErrorKind> {
        self.bus.borrow_mut().write(addr, data).map_err(|e| e.kind())
    }

    fn write_read(&mut self, addr: u8, write_data: &[u8], read_data: &mut [u8]) -> Result<(), ErrorKind> {
        self.bus
            .borrow_mut()
            .write_read(addr, write_data, read_data)
            .map_err(|e| e.kind())
    }
}

/// `DeviceBus` backed by a real I2C peripheral
pub struct I2cBaroBus<'a, I> {
    i2c: SharedI2c<'a, I>,
}

impl<'a, I: I2c> I2cBaroBus<'a, I> {
    pub fn new(bus: &'a RefCell<I>) -> Self {
        Self {
            i2c: SharedI2c::new(bus),
        }
    }
}

impl<'a, I: I2c> DeviceBus for I2cBaroBus<'a, I> {
    type Device = Bmx280<SharedI2c<'a, I>>;

    fn probe(&mut self, addr: u8) -> bool {
        // An empty write is acknowledged only if something answers at `addr`
        self.i2c.write(addr, &[]).is_ok()
    }

    fn read_register(&mut self, addr: u8, reg: u8) -> Option<u8> {
        self.i2c.read_reg(addr, reg).ok()
    }

    fn open(&mut self, addr: u8, kind: DriverKind) -> Option<Self::Device> {
        let mut device = Bmx280::new(self.i2c, addr, kind);
        match device.init() {
            Ok(()) => Some(device),
            Err(err) => {
                debug!("{} begin at {:#04x} failed: {}", kind.name(), addr, err);
                None
            }
        }
    }
}
