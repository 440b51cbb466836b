use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use log::error;

use trainctl::config::DEFAULT_CONFIG_FILE;

#[tokio::main]
async fn main() -> ExitCode {
    // Raw mode leaves the cursor mid-line on a plain newline, so every log
    // line ends with an explicit carriage return.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf, "[{:<5}] {}\r", record.level(), record.args())
        })
        .init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    match trainctl::run(&config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
