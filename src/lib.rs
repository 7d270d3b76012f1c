#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logic;
pub mod net;
pub mod node;
pub mod peripherals;

pub use config::Config;
pub use error::Error;
pub use node::{TelemetryNode, TemperatureSensor};

#[cfg(feature = "nrf52840")]
use defmt_rtt as _; // global logger

#[cfg(feature = "nrf52840")]
use nrf52840_hal as _; // memory layout

#[cfg(feature = "nrf52840")]
use panic_probe as _;

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[cfg(feature = "nrf52840")]
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

/// Terminates the application and makes `probe-run` exit with exit-code = 0
#[cfg(feature = "nrf52840")]
pub fn exit() -> ! {
    loop {
        cortex_m::asm::bkpt();
    }
}
