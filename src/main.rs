use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trawl::app::Trawler;
use trawl::cli::{commands, Cli, Commands};
use trawl::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.headful {
        config.browser.headless = false;
    }
    if let Commands::Scrape {
        keep_assets: true, ..
    } = cli.command
    {
        config.scrape.block_assets = false;
    }

    let trawler = Trawler::launch(config).await?;

    let result = match cli.command {
        Commands::Login { username, password } => {
            commands::login(&trawler, username, password).await
        }
        Commands::Status => commands::status(&trawler).await,
        Commands::Scrape {
            feed,
            sort,
            output,
            save,
            ..
        } => commands::scrape(&trawler, &feed, sort, output, save).await,
    };

    trawler.close().await?;
    result?;
    Ok(())
}
