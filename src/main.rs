use std::process::ExitCode;

use rcurl::app::Application;
use rcurl::config::ClientConfig;
use rcurl::observability::console::Console;
use rcurl::observability::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let config = ClientConfig::default();
    init_logging(&config.observability);

    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let app = Application::new(config, Console::stdout());
    match app.run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.to_string().trim_end());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
