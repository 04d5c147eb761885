use barscan::cli::{failure_response, run, usage_error, Cli};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match usage_error(&e) {
            Some(err) => {
                println!("{}", failure_response(&err));
                return (&err).into();
            }
            None => e.exit(),
        },
    };
    barscan::logging::init_logging(cli.log_json);
    run(cli)
}
