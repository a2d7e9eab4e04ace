use clap::Parser;
use deal_report::config::{load_dotenv, DOTENV_FILE};
use deal_report::core::demo::DEMO_OUTPUT_DIR;
use deal_report::utils::{logger, validation::Validate};
use deal_report::{run_demo, run_with, CliConfig, Command, ReportError};
use std::path::Path;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Before parsing, so `.env` values reach clap's `env` fallbacks.
    let dotenv = load_dotenv(Path::new(DOTENV_FILE));
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    match dotenv {
        Ok(true) => tracing::debug!("Loaded environment from {}", DOTENV_FILE),
        Ok(false) => {}
        Err(e) => tracing::warn!("{}", e),
    }

    if let Err(e) = dispatch(&cli).await {
        tracing::error!(
            "Export failed: {} (category: {:?}, severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("Error: {}", e.user_friendly_message());
        eprintln!("Hint: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code().max(1));
    }
}

async fn dispatch(cli: &CliConfig) -> Result<(), ReportError> {
    let command = cli.command();

    if matches!(command, Command::Demo) {
        let dir = cli.output_dir.as_deref().unwrap_or(DEMO_OUTPUT_DIR);
        let path = run_demo(dir).await?;
        print_saved(&path);
        return Ok(());
    }

    let settings = cli.resolve()?;
    // Fail on a missing token before any network traffic or scheduling.
    settings.validate()?;

    match command.schedule() {
        Some((schedule, run_now)) => {
            schedule
                .run_forever(run_now, || run_with(settings.clone()))
                .await;
        }
        None => {
            let path = run_with(settings).await?;
            print_saved(&path);
        }
    }
    Ok(())
}

fn print_saved(path: &Path) {
    println!("{}", path.display());
}
