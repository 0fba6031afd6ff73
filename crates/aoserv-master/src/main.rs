//! Entry point for the `aoserv-master` daemon.

use std::process::ExitCode;

fn main() -> ExitCode {
    match aoserv_master::run_master() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("aoserv-master: {error}");
            ExitCode::FAILURE
        }
    }
}
