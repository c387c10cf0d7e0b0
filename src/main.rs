//! mlops-lab entry point

use clap::Parser;
use mlops_lab::cli::{
    cmd_dataset_register, cmd_provision, cmd_submit, cmd_train, Cli, Commands, DatasetCommand,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mlops_lab=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Provision { dry_run, config_out } => {
            cmd_provision(dry_run, &config_out).await?;
        }
        Commands::Train { run_id, config, train_config, output_dir } => {
            cmd_train(run_id.as_deref(), config, train_config.as_deref(), output_dir)?;
        }
        Commands::Dataset { command } => match command {
            DatasetCommand::Register { name, csv, schema, description, config } => {
                cmd_dataset_register(&name, &csv, schema.as_deref(), &description, config)?;
            }
        },
        Commands::Submit { experiment, inputs, config } => {
            cmd_submit(&experiment, &inputs, config)?;
        }
    }

    Ok(())
}
