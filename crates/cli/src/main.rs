use std::process::ExitCode;

fn main() -> ExitCode {
    roomwise_cli::run()
}
