use std::{
    collections::HashMap,
    convert::Infallible,
    fmt,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::error::GpioError;
use crate::gpio_pin_data::{channel_to_info, get_data, ChannelInfo};
use crate::sysfs::{Sysfs, SysfsFiles, SYSFS_ROOT};

/// Length of one software PWM period in microseconds (500 Hz).
pub const PWM_PERIOD_US: u64 = 2000;

// How long to wait for udev to create the line directory after an export.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(1);
const EXPORT_POLL: Duration = Duration::from_millis(10);

/// Specifies the GPIO pin value.
///
/// * `LOW` - 0
/// * `HIGH` - 1
///
/// `Level` converts from `bool`, so `Level::from(true)` is `HIGH`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Level {
    LOW = 0,
    HIGH = 1,
}

impl Level {
    /// The string written to, and read from, the sysfs `value` file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::LOW => "0",
            Level::HIGH => "1",
        }
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Level::HIGH
        } else {
            Level::LOW
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level == Level::HIGH
    }
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::LOW => Level::HIGH,
            Level::HIGH => Level::LOW,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Specifies the GPIO pin direction.
///
/// * `IN` - Input
/// * `OUT` - Output
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    IN,
    OUT,
}

impl Direction {
    /// The string written to the sysfs `direction` file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::IN => "in",
            Direction::OUT => "out",
        }
    }
}

/// High and low phase of one software PWM period.
///
/// The on-time advances in steps of `PWM_PERIOD_US / 255` whole microseconds, so
/// a duty cycle of 255 still leaves a short low phase at the end of each period.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PwmTiming {
    pub on: Duration,
    pub off: Duration,
}

impl PwmTiming {
    pub fn from_duty(duty: u8) -> Self {
        let on = PWM_PERIOD_US / 255 * u64::from(duty);

        PwmTiming {
            on: Duration::from_micros(on),
            off: Duration::from_micros(PWM_PERIOD_US - on),
        }
    }
}

/// Controls Raspberry Pi header pins through a GPIO sysfs tree.
///
/// Nothing about the pins is cached: every operation resolves the header pin
/// again and goes straight to the files under the sysfs root.
///
/// # Example
///
/// ```rust,no_run
/// use pi_pin::{Direction, Level, GPIO};
///
/// let gpio = GPIO::new();
/// gpio.export_and_configure("11", Direction::OUT).unwrap();
/// gpio.set_value("11", Level::HIGH).unwrap();
/// gpio.release("11").unwrap();
/// ```
pub struct GPIO<S: Sysfs = SysfsFiles> {
    sysfs: S,
    root: PathBuf,

    // lookup table for header pin to linux gpio mapping
    channel_data: HashMap<&'static str, ChannelInfo>,
}

impl GPIO<SysfsFiles> {
    /// Creates a controller for the real `/sys/class/gpio` tree.
    pub fn new() -> Self {
        GPIO::with_root(SysfsFiles, SYSFS_ROOT)
    }
}

impl Default for GPIO<SysfsFiles> {
    fn default() -> Self {
        GPIO::new()
    }
}

impl<S: Sysfs> GPIO<S> {
    /// Creates a controller working on the sysfs tree at `root` through `sysfs`.
    pub fn with_root(sysfs: S, root: impl Into<PathBuf>) -> Self {
        GPIO {
            sysfs,
            root: root.into(),
            channel_data: get_data(),
        }
    }

    pub fn sysfs(&self) -> &S {
        &self.sysfs
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a header pin, e.g. `"11"`, to its GPIO channel.
    pub fn channel_to_info(&self, channel: &str) -> Result<ChannelInfo, GpioError> {
        channel_to_info(&self.channel_data, channel)
    }

    fn gpio_dir(&self, ch_info: &ChannelInfo) -> PathBuf {
        self.root.join(&ch_info.global_gpio_name)
    }

    fn write_file(&self, path: PathBuf, contents: &str) -> Result<(), GpioError> {
        debug!("write '{}' to {}", contents, path.display());
        self.sysfs
            .write(&path, contents)
            .map_err(|source| GpioError::Write {
                path,
                contents: contents.to_string(),
                source,
            })
    }

    fn read_file(&self, path: PathBuf) -> Result<String, GpioError> {
        let value = self
            .sysfs
            .read(&path)
            .map_err(|source| GpioError::Read {
                path: path.clone(),
                source,
            })?;
        debug!("read '{}' from {}", value.trim(), path.display());
        Ok(value)
    }

    fn export_gpio(&self, ch_info: &ChannelInfo) -> Result<(), GpioError> {
        self.write_file(
            self.root.join("export"),
            &ch_info.global_gpio.to_string(),
        )?;

        let direction = self.gpio_dir(ch_info).join("direction");
        let start = Instant::now();
        while !self.sysfs.exists(&direction) {
            if start.elapsed() >= EXPORT_TIMEOUT {
                warn!(
                    "{} did not appear within {} ms of the export",
                    direction.display(),
                    EXPORT_TIMEOUT.as_millis()
                );
                break;
            }
            thread::sleep(EXPORT_POLL);
        }

        Ok(())
    }

    fn unexport_gpio(&self, ch_info: &ChannelInfo) -> Result<(), GpioError> {
        self.write_file(
            self.root.join("unexport"),
            &ch_info.global_gpio.to_string(),
        )
    }

    fn write_direction(&self, ch_info: &ChannelInfo, direction: Direction) -> Result<(), GpioError> {
        self.write_file(self.gpio_dir(ch_info).join("direction"), direction.as_str())
    }

    fn write_value(&self, ch_info: &ChannelInfo, value: Level) -> Result<(), GpioError> {
        self.write_file(self.gpio_dir(ch_info).join("value"), value.as_str())
    }

    fn read_value(&self, ch_info: &ChannelInfo) -> Result<Level, GpioError> {
        let value = self.read_file(self.gpio_dir(ch_info).join("value"))?;

        match value.split_whitespace().next() {
            Some("1") => Ok(Level::HIGH),
            _ => Ok(Level::LOW),
        }
    }

    /// Exports the pin and sets its direction.
    ///
    /// A pin that is already exported makes the export write fail, which is
    /// reported as an error. Nothing is undone when the direction write fails
    /// after a successful export.
    pub fn export_and_configure(&self, channel: &str, direction: Direction) -> Result<(), GpioError> {
        let ch_info = self.channel_to_info(channel)?;

        self.export_gpio(&ch_info)?;
        self.write_direction(&ch_info, direction)
    }

    /// Writes a value to an exported output pin.
    pub fn set_value(&self, channel: &str, value: Level) -> Result<(), GpioError> {
        let ch_info = self.channel_to_info(channel)?;
        self.write_value(&ch_info, value)
    }

    /// Returns the current value of an exported pin.
    ///
    /// Only a value of `1` reads as `Level::HIGH`; anything else is `Level::LOW`.
    pub fn get_value(&self, channel: &str) -> Result<Level, GpioError> {
        let ch_info = self.channel_to_info(channel)?;
        self.read_value(&ch_info)
    }

    fn pwm_period(&self, ch_info: &ChannelInfo, timing: PwmTiming) -> Result<(), GpioError> {
        if !timing.on.is_zero() {
            self.write_value(ch_info, Level::HIGH)?;
            thread::sleep(timing.on);
        }

        if !timing.off.is_zero() {
            self.write_value(ch_info, Level::LOW)?;
            thread::sleep(timing.off);
        }

        Ok(())
    }

    /// Runs a single software PWM period on an exported output pin.
    ///
    /// A phase of zero length is skipped entirely, so a duty cycle of 0 never
    /// drives the pin high.
    pub fn pwm_cycle(&self, channel: &str, timing: PwmTiming) -> Result<(), GpioError> {
        let ch_info = self.channel_to_info(channel)?;
        self.pwm_period(&ch_info, timing)
    }

    /// Drives an exported output pin with a 500 Hz software PWM signal.
    ///
    /// `duty` ranges from 0 (always low) to 255. This never returns unless a
    /// write fails; stop it by terminating the process.
    pub fn pwm(&self, channel: &str, duty: u8) -> Result<Infallible, GpioError> {
        let ch_info = self.channel_to_info(channel)?;

        let timing = PwmTiming::from_duty(duty);
        debug!(
            "pwm on pin {}: duty {}/255, high {} us, low {} us",
            channel,
            duty,
            timing.on.as_micros(),
            timing.off.as_micros()
        );

        loop {
            self.pwm_period(&ch_info, timing)?;
        }
    }

    /// Unexports the pin.
    pub fn release(&self, channel: &str) -> Result<(), GpioError> {
        let ch_info = self.channel_to_info(channel)?;
        self.unexport_gpio(&ch_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::MemorySysfs;

    const ROOT: &str = "/sys/class/gpio";

    fn setup() -> GPIO<MemorySysfs> {
        GPIO::with_root(MemorySysfs::new(ROOT), ROOT)
    }

    fn path(rel: &str) -> PathBuf {
        Path::new(ROOT).join(rel)
    }

    #[test]
    fn export_and_configure_writes_line_then_direction() {
        let gpio = setup();
        gpio.export_and_configure("11", Direction::OUT).unwrap();

        assert_eq!(
            gpio.sysfs().writes(),
            vec![
                (path("export"), String::from("17")),
                (path("gpio17/direction"), String::from("out")),
            ]
        );
    }

    #[test]
    fn second_export_is_an_error() {
        let gpio = setup();
        gpio.export_and_configure("7", Direction::IN).unwrap();

        let err = gpio.export_and_configure("7", Direction::IN).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("/sys/class/gpio/export"));
    }

    // Export succeeds but udev never creates the line directory.
    struct MissingLineDir {
        inner: MemorySysfs,
    }

    impl Sysfs for MissingLineDir {
        fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
            let result = self.inner.write(path, contents);
            if result.is_ok() && path.ends_with("export") {
                self.inner
                    .remove_file(&path.with_file_name(format!("gpio{}/direction", contents)));
            }
            result
        }

        fn read(&self, path: &Path) -> std::io::Result<String> {
            self.inner.read(path)
        }

        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }
    }

    #[test]
    fn export_wait_times_out_and_direction_write_fails() {
        let gpio = GPIO::with_root(
            MissingLineDir {
                inner: MemorySysfs::new(ROOT),
            },
            ROOT,
        );

        let start = Instant::now();
        let err = gpio.export_and_configure("11", Direction::OUT).unwrap_err();
        assert!(start.elapsed() >= EXPORT_TIMEOUT);

        match err {
            GpioError::Write { path, contents, .. } => {
                assert_eq!(path, gpio.root().join("gpio17/direction"));
                assert_eq!(contents, "out");
            }
            other => panic!("expected a direction write error, got {:?}", other),
        }

        // the export itself is not rolled back
        assert!(gpio.sysfs().inner.exists(&gpio.root().join("gpio17/value")));
    }

    #[test]
    fn invalid_pin_touches_nothing() {
        let gpio = setup();

        for result in [
            gpio.export_and_configure("99", Direction::OUT),
            gpio.set_value("99", Level::HIGH),
            gpio.get_value("99").map(|_| ()),
            gpio.pwm_cycle("99", PwmTiming::from_duty(128)),
            gpio.pwm("99", 0).map(|_| ()),
            gpio.release("99"),
        ] {
            match result {
                Err(GpioError::InvalidPin(pin)) => assert_eq!(pin, "99"),
                other => panic!("expected InvalidPin, got {:?}", other),
            }
        }

        assert!(gpio.sysfs().writes().is_empty());
        assert!(gpio.sysfs().reads().is_empty());
    }

    #[test]
    fn set_then_get_round_trips() {
        let gpio = setup();
        gpio.export_and_configure("13", Direction::OUT).unwrap();

        gpio.set_value("13", Level::HIGH).unwrap();
        assert_eq!(gpio.get_value("13").unwrap(), Level::HIGH);

        gpio.set_value("13", Level::LOW).unwrap();
        assert_eq!(gpio.get_value("13").unwrap(), Level::LOW);
    }

    #[test]
    fn only_one_reads_as_high() {
        let gpio = setup();
        for (contents, expected) in [
            ("1\n", Level::HIGH),
            ("1", Level::HIGH),
            ("0\n", Level::LOW),
            ("", Level::LOW),
            ("11", Level::LOW),
            ("high", Level::LOW),
        ] {
            gpio.sysfs().set_file(path("gpio4/value"), contents);
            assert_eq!(gpio.get_value("7").unwrap(), expected, "{:?}", contents);
        }
    }

    #[test]
    fn unexported_pin_cannot_be_written_or_read() {
        let gpio = setup();
        assert!(gpio.set_value("15", Level::HIGH).unwrap_err().is_io());
        assert!(gpio.get_value("15").unwrap_err().is_io());
    }

    #[test]
    fn release_unexports() {
        let gpio = setup();
        gpio.export_and_configure("40", Direction::OUT).unwrap();
        gpio.release("40").unwrap();

        assert!(!gpio.sysfs().exists(&path("gpio21")));
        assert_eq!(
            gpio.sysfs().writes().last(),
            Some(&(path("unexport"), String::from("21")))
        );
        assert!(gpio.release("40").unwrap_err().is_io());
    }

    #[test]
    fn pwm_timing_is_quantized() {
        assert_eq!(
            PwmTiming::from_duty(0),
            PwmTiming {
                on: Duration::ZERO,
                off: Duration::from_micros(2000)
            }
        );
        assert_eq!(PwmTiming::from_duty(1).on, Duration::from_micros(7));
        assert_eq!(PwmTiming::from_duty(128).on, Duration::from_micros(896));
        assert_eq!(
            PwmTiming::from_duty(255),
            PwmTiming {
                on: Duration::from_micros(1785),
                off: Duration::from_micros(215)
            }
        );
    }

    #[test]
    fn pwm_cycle_with_zero_duty_never_goes_high() {
        let gpio = setup();
        gpio.export_and_configure("12", Direction::OUT).unwrap();

        for _ in 0..3 {
            gpio.pwm_cycle("12", PwmTiming::from_duty(0)).unwrap();
        }

        let values: Vec<String> = gpio
            .sysfs()
            .writes()
            .into_iter()
            .filter(|(p, _)| p == &path("gpio18/value"))
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec!["0", "0", "0"]);
    }

    #[test]
    fn pwm_cycle_goes_high_then_low() {
        let gpio = setup();
        gpio.export_and_configure("12", Direction::OUT).unwrap();

        gpio.pwm_cycle("12", PwmTiming::from_duty(255)).unwrap();

        let writes = gpio.sysfs().writes();
        assert_eq!(
            &writes[2..],
            &[
                (path("gpio18/value"), String::from("1")),
                (path("gpio18/value"), String::from("0")),
            ]
        );
    }

    #[test]
    fn pwm_returns_on_write_failure() {
        let gpio = setup();
        // never exported, so the first value write fails
        let err = gpio.pwm("16", 100).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn level_helpers() {
        assert_eq!(Level::from(true), Level::HIGH);
        assert_eq!(!Level::HIGH, Level::LOW);
        assert!(bool::from(Level::HIGH));
        assert_eq!(Level::LOW.to_string(), "0");
        assert_eq!(Direction::OUT.as_str(), "out");
    }
}
