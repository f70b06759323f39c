use std::{ffi::OsString, io::Write, path::PathBuf, process::ExitCode};

use clap::{error::ErrorKind, CommandFactory, Parser};
use log::debug;

use crate::error::GpioError;
use crate::gpio::{Direction, Level, GPIO};
use crate::sysfs::{Sysfs, SYSFS_ROOT};

const COMMANDS_HELP: &str = "\
command options:
\ts0\t-\tset pin LOW
\ts1\t-\tset pin HIGH
\tt\t-\ttoggle pin
\tp\t-\tPWM
\tg\t-\tget pin value
\tr\t-\trelease pin";

/// Manipulates Raspberry Pi pins from the command line or shell scripts
#[derive(Parser, Debug)]
#[command(
    name = "pi-pin",
    author,
    version,
    about,
    long_about = None,
    help_template = "\n{name} {version} by {author}\n\n{usage-heading} {usage}\n\n{all-args}\n\n{after-help}\n",
    after_help = COMMANDS_HELP
)]
pub struct Args {
    /// Pin number on the 40-pin header, e.g. 11
    #[arg(allow_hyphen_values = true)]
    pub pin: String,

    /// One of s0, s1, t, p, g, r
    #[arg(allow_hyphen_values = true)]
    pub command: String,

    /// PWM value (0-255), needed by the p command
    #[arg(allow_hyphen_values = true)]
    pub pwm_value: Option<String>,

    // anything after the PWM value is accepted and ignored
    #[arg(hide = true, allow_hyphen_values = true)]
    pub ignored: Vec<String>,

    /// Directory of the kernel's GPIO sysfs interface
    #[arg(long, env = "PI_PIN_SYSFS_ROOT", default_value = SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    /// Log every sysfs access to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Process exit codes of `pi-pin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success = 0,
    MissingArguments = 1,
    InvalidCommand = 2,
    Failure = 3,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCommand {
    SetLow,
    SetHigh,
    Toggle,
    Pwm,
    Get,
    Release,
}

impl PinCommand {
    pub fn from_token(token: &str) -> Option<PinCommand> {
        match token {
            "s0" => Some(PinCommand::SetLow),
            "s1" => Some(PinCommand::SetHigh),
            "t" => Some(PinCommand::Toggle),
            "p" => Some(PinCommand::Pwm),
            "g" => Some(PinCommand::Get),
            "r" => Some(PinCommand::Release),
            _ => None,
        }
    }
}

pub fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Warn);
    }
    builder
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()));
    // a logger may already be installed when run more than once in a process
    let _ = builder.try_init();
}

fn usage(out: &mut dyn Write) {
    let _ = write!(out, "{}", Args::command().render_help());
}

fn parse_pwm_value(value: Option<&str>) -> Result<u8, GpioError> {
    let value = value.ok_or(GpioError::MissingPwmValue)?;
    value
        .trim()
        .parse::<u8>()
        .map_err(|_| GpioError::InvalidPwmValue(value.to_string()))
}

/// Runs one command against `gpio`, printing the pin value for `g` to `stdout`.
///
/// `t` reads and writes the value file without exporting the pin first, so it
/// only works on a pin a previous `s0`, `s1` or `p` left exported as an output.
pub fn dispatch<S: Sysfs>(
    gpio: &GPIO<S>,
    pin: &str,
    command: PinCommand,
    pwm_value: Option<&str>,
    stdout: &mut dyn Write,
) -> anyhow::Result<()> {
    debug!("pin {}: {:?}", pin, command);

    match command {
        PinCommand::SetLow | PinCommand::SetHigh => {
            gpio.export_and_configure(pin, Direction::OUT)?;
            gpio.set_value(pin, Level::from(command == PinCommand::SetHigh))?;
        }
        PinCommand::Toggle => {
            let level = gpio.get_value(pin)?;
            gpio.set_value(pin, !level)?;
        }
        PinCommand::Pwm => {
            let duty = parse_pwm_value(pwm_value)?;
            gpio.export_and_configure(pin, Direction::OUT)?;
            match gpio.pwm(pin, duty)? {}
        }
        PinCommand::Get => {
            gpio.export_and_configure(pin, Direction::IN)?;
            let level = gpio.get_value(pin)?;
            writeln!(stdout, "{}", level)?;
        }
        PinCommand::Release => gpio.release(pin)?,
    }

    Ok(())
}

/// Parses `argv` (program name first) and runs the requested command on the
/// sysfs tree behind `sysfs`.
pub fn run<I, T, S>(argv: I, sysfs: S, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Exit
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    S: Sysfs,
{
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = write!(stdout, "{}", err.render());
                return Exit::Success;
            }
            _ => {
                usage(stdout);
                return Exit::MissingArguments;
            }
        },
    };

    init_logging(args.verbose);

    let command = match PinCommand::from_token(&args.command) {
        Some(command) => command,
        None => {
            usage(stdout);
            let _ = writeln!(stderr, "\nINVALID COMMAND: {}", args.command);
            return Exit::InvalidCommand;
        }
    };

    let gpio = GPIO::with_root(sysfs, &args.sysfs_root);
    match dispatch(&gpio, &args.pin, command, args.pwm_value.as_deref(), stdout) {
        Ok(()) => Exit::Success,
        Err(err) => {
            let _ = writeln!(stderr, "ERROR: {}", err);
            Exit::Failure
        }
    }
}
