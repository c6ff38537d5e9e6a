use std::process::ExitCode;

fn main() -> ExitCode {
    tripwise_cli::run()
}
