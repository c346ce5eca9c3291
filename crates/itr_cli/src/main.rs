use std::process::ExitCode;

fn main() -> ExitCode {
    itr_cli::run()
}
