use std::{env, io, process::ExitCode};

use pi_pin::{cli, sysfs::SysfsFiles};

fn main() -> ExitCode {
    cli::run(
        env::args_os(),
        SysfsFiles,
        &mut io::stdout(),
        &mut io::stderr(),
    )
    .into()
}
