use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match thriftgated::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let mut stderr = io::stderr().lock();
            // Nothing sensible remains to be done if stderr is gone.
            drop(writeln!(stderr, "thriftgated: {error}"));
            ExitCode::FAILURE
        }
    }
}
