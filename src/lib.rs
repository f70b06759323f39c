//! Manipulates Raspberry Pi header pins through the kernel's GPIO sysfs interface.
//!
//! The [`GPIO`] controller maps header pins to GPIO lines and exports, configures,
//! writes, reads and releases them. The [`cli`] module is the `pi-pin` command
//! built on top of it.

pub mod cli;
mod error;
pub mod gpio;
pub mod gpio_pin_data;
pub mod sysfs;

pub use error::GpioError;
pub use gpio::{Direction, Level, PwmTiming, GPIO};
