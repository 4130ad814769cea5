pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::feed::FeedSort;

#[derive(Parser)]
#[command(name = "trawl")]
#[command(about = "Browser-driven scraper for dynamically rendered group feeds", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Run the browser with a visible window
    #[arg(long, global = true)]
    pub headful: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate and persist session cookies
    Login {
        /// Account username or email
        #[arg(short, long)]
        username: Option<String>,

        /// Account password
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Probe whether the stored session is still authenticated
    Status,
    /// Traverse a feed and stream extracted posts as JSON lines
    Scrape {
        /// Feed identifier
        feed: String,

        /// Feed sort mode
        #[arg(short, long, value_enum)]
        sort: Option<FeedSort>,

        /// Write records to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write records to <feed>.json
        #[arg(long, conflicts_with = "output")]
        save: bool,

        /// Keep loading images, media and fonts
        #[arg(long)]
        keep_assets: bool,
    },
}
