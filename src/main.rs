use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use murmur::{run_config_command, App, Cli, Commands, Config, MurmurError, Result};

pub fn initialize_logger(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;

    let command = match cli.command {
        Commands::Config { show, set, reset } => {
            return run_config_command(&mut config, &config_path, show, set, reset);
        }
        command => command,
    };

    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let mut app = App::new(config, cli.verbose)?;
    app.run(command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        // Validation failures were already shown by the notifier.
        Err(MurmurError::Validation { .. }) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", console::style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
