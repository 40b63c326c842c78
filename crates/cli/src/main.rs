use std::process::ExitCode;

fn main() -> ExitCode {
    paintquote_cli::run()
}
