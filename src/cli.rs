use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "aniplay",
    version,
    about = "Search, play and resume anime in mpv with tracked progress"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the provider and list matching titles
    Search { query: String },
    /// Play an episode of the n-th search result
    Play {
        query: String,
        /// 1-based position in the search results
        #[arg(
            short = 'n',
            long,
            default_value_t = 1,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        index: usize,
        #[arg(short, long, default_value_t = 1)]
        episode: u32,
        /// Preferred quality, overrides the settings file
        #[arg(short, long)]
        quality: Option<String>,
        /// Start offset in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,
    },
    /// Resume a title from watch history (most recent when no id is given)
    Resume {
        id: Option<String>,
        #[arg(short, long)]
        quality: Option<String>,
    },
    /// List titles to continue watching
    Continue {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the effective settings
    Settings,
}
