// SMMA agent runner
// Main entry point for the smma binary

use clap::Parser;
use smma_engine::cli::{Cli, Command, ConfigAction, TapeAction};
use smma_engine::config::Config;
use smma_engine::handlers::{
    handle_config_show, handle_config_validate, handle_run, handle_tape_recall, handle_tape_show,
    OutputFormat, RunOptions,
};
use smma_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let config = if cli.config.is_some() {
        Config::load_from_path(&config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the configured level; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("SMMA v{} ({} - {})", version, commit, timestamp);

    match cli.command {
        Command::Run {
            prompt,
            id,
            criteria,
            system,
        } => {
            let options = RunOptions {
                id,
                criteria,
                system_prompt_file: system,
            };
            let outcome = handle_run(prompt, options, &config, format).await?;
            if outcome.status == smma_engine::agent::OutcomeStatus::Failed {
                std::process::exit(1);
            }
            Ok(())
        }

        Command::Tape { action } => match action {
            TapeAction::Show { task_id } => handle_tape_show(&task_id, &config, format),
            TapeAction::Recall {
                task_id,
                visible_id,
            } => handle_tape_recall(&task_id, visible_id, &config, format),
        },

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Validate => handle_config_validate(&config_path, format),
        },
    }
}
