#![no_std]

mod bus;
mod clock;
mod status;
mod store;

pub use bus::*;
pub use clock::*;
pub use status::*;
pub use store::*;
