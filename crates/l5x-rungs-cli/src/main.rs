use log::debug;
use std::process::ExitCode;

mod cmd;

fn main() -> ExitCode {
    let commands = cmd::CommandLine::parse_args();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(commands.log_filter()))
        .init();

    let config = commands.into_config();
    debug!("{:?}", config);
    match l5x_rungs::run(&config) {
        Ok(summary) => {
            if summary.written.is_empty() {
                println!(
                    "{} devices, {} rungs generated (dry run, nothing written)",
                    summary.devices, summary.rungs
                );
            } else {
                println!(
                    "{} devices, {} rungs generated, {} replaced",
                    summary.devices, summary.rungs, summary.removed
                );
                for path in &summary.written {
                    println!("  wrote {}", path.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
