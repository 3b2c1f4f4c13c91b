use std::process::ExitCode;

fn main() -> ExitCode {
    clarity_cli::run()
}
