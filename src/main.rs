use anyhow::Result;
use tracing_subscriber::EnvFilter;

use academy_calendar::storage::config::Config;

mod cli;
use cli::{CliMode, USAGE, parse_cli_mode, run_move, run_transfer, run_week};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli_mode = match parse_cli_mode() {
        Ok(mode) => mode,
        Err(err) => {
            eprintln!("Error: {}", err);
            println!("{}", USAGE);
            return Ok(());
        }
    };

    let config = Config::load_or_create()?;

    match cli_mode {
        CliMode::Week(date) => run_week(&config, date).await,
        CliMode::Move {
            date,
            class_id,
            day,
            start,
        } => run_move(&config, date, class_id, day, start).await,
        CliMode::Transfer {
            date,
            student_id,
            from_class,
            to_class,
        } => run_transfer(&config, date, student_id, from_class, to_class).await,
    }
}

fn setup_logging() {
    let log_dir = Config::config_dir();

    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "academy-calendar.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    std::mem::forget(_guard);

    tracing::info!("academy-calendar started");
}
