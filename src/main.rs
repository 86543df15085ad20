use std::process::ExitCode;

fn main() -> ExitCode {
    match treepush::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
