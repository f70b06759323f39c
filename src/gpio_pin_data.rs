use std::collections::HashMap;

use crate::error::GpioError;

/// Maps a pin on the 40-pin header to the Linux GPIO line behind it.
///
/// The fields are:
/// - Pin number on the header (BOARD numbering), as typed on the command line
/// - Linux GPIO line number (BCM numbering), used to address the sysfs files
#[derive(Clone, Copy, Debug)]
struct PinDefinition {
    board: &'static str,
    bcm: u32,
}

// Every GPIO capable pin of the Raspberry Pi 40-pin header.
static RASPBERRY_PI_PIN_DEFS: [PinDefinition; 24] = [
    PinDefinition { board: "3", bcm: 2 },
    PinDefinition { board: "5", bcm: 3 },
    PinDefinition { board: "7", bcm: 4 },
    PinDefinition { board: "11", bcm: 17 },
    PinDefinition { board: "12", bcm: 18 },
    PinDefinition { board: "13", bcm: 27 },
    PinDefinition { board: "15", bcm: 22 },
    PinDefinition { board: "16", bcm: 23 },
    PinDefinition { board: "18", bcm: 24 },
    PinDefinition { board: "19", bcm: 10 },
    PinDefinition { board: "21", bcm: 9 },
    PinDefinition { board: "22", bcm: 25 },
    PinDefinition { board: "23", bcm: 11 },
    PinDefinition { board: "24", bcm: 8 },
    PinDefinition { board: "26", bcm: 7 },
    PinDefinition { board: "29", bcm: 5 },
    PinDefinition { board: "31", bcm: 6 },
    PinDefinition { board: "32", bcm: 12 },
    PinDefinition { board: "33", bcm: 13 },
    PinDefinition { board: "35", bcm: 19 },
    PinDefinition { board: "36", bcm: 16 },
    PinDefinition { board: "37", bcm: 26 },
    PinDefinition { board: "38", bcm: 20 },
    PinDefinition { board: "40", bcm: 21 },
];

/// Contains information about a single GPIO channel.
///
/// The fields are:
/// * `channel`: Pin number on the header, e.g. `"11"`
/// * `global_gpio`: Linux GPIO line number, e.g. `17`
/// * `global_gpio_name`: Name of the exported sysfs directory, e.g. `"gpio17"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel: String,
    pub global_gpio: u32,
    pub global_gpio_name: String,
}

impl From<&PinDefinition> for ChannelInfo {
    fn from(def: &PinDefinition) -> Self {
        ChannelInfo {
            channel: def.board.to_string(),
            global_gpio: def.bcm,
            global_gpio_name: format!("gpio{}", def.bcm),
        }
    }
}

/// Builds the lookup table from header pin to channel information.
///
/// # Example
///
/// ```rust
/// use pi_pin::gpio_pin_data::get_data;
///
/// let data = get_data();
/// assert_eq!(data.len(), 24);
/// assert_eq!(data["11"].global_gpio, 17);
/// ```
pub fn get_data() -> HashMap<&'static str, ChannelInfo> {
    RASPBERRY_PI_PIN_DEFS
        .iter()
        .map(|def| (def.board, ChannelInfo::from(def)))
        .collect()
}

/// Resolves a header pin in `channel_data`, failing with `GpioError::InvalidPin`
/// when the pin is not a GPIO.
pub fn channel_to_info(
    channel_data: &HashMap<&'static str, ChannelInfo>,
    channel: &str,
) -> Result<ChannelInfo, GpioError> {
    channel_data
        .get(channel)
        .cloned()
        .ok_or_else(|| GpioError::InvalidPin(channel.to_string()))
}
