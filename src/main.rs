use std::process::ExitCode;

use logshelf::ui::output;

fn main() -> ExitCode {
    match logshelf::cli::run() {
        Ok(code) => code,
        Err(e) => {
            output::error(format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
