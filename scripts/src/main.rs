use clap::Parser;
use release_scripts::cli::Cli;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let Cli { global, command } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    command.run(&global).await?;
    Ok(())
}
