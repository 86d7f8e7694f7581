use clap::Parser;
use habit_app::app::{run, AppConfig, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config, cli.into_command()) {
        eprintln!("habit_tracker: {err:#}");
        std::process::exit(1);
    }
}
