use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving pins or talking to the sysfs GPIO interface.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GpioError {
    #[error("Pin {0} is not GPIO or it does not exist!")]
    InvalidPin(String),

    #[error("Unable to write '{contents}' to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        contents: String,
        source: std::io::Error,
    },

    #[error("Unable to read from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("For PWM command we need PWM value!")]
    MissingPwmValue,

    #[error("PWM value must be an integer between 0 and 255, got '{0}'")]
    InvalidPwmValue(String),
}

impl GpioError {
    /// `true` for failures of the underlying file I/O.
    pub fn is_io(&self) -> bool {
        matches!(self, GpioError::Write { .. } | GpioError::Read { .. })
    }
}
