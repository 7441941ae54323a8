use std::process::ExitCode;

fn main() -> ExitCode {
    loomline_cli::run()
}
