//! oi - runs tasks from built-in and plugin modules

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = oi::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
