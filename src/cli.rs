use clap::{Args, Parser, Subcommand};

use crate::search::DEFAULT_BASE_URL;
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "trackr",
    version,
    about = "Follow your location and cache public photos taken nearby"
)]
pub struct Cli {
    /// Directory holding the photo cache and preferences databases
    #[arg(long, global = true, default_value = "~/.trackr")]
    pub data_dir: String,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track a replayed route and cache photos near each fix
    Track(TrackArgs),

    /// Show the tracking flag and cache summary
    Status,

    /// List cached photos, newest first
    List(ListArgs),

    /// Delete every cached photo
    Clear(ClearArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    /// Route file with one `latitude,longitude` pair per line
    #[arg(long)]
    pub route: String,

    /// Flickr API key
    #[arg(long, env = "TRACKR_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the photo search API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub api_base_url: String,

    /// Search radius around each fix, in kilometers
    #[arg(long, default_value_t = 0.4)]
    pub radius: f32,

    /// Seconds between replayed route points
    #[arg(long, default_value_t = 20)]
    pub replay_interval: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Show at most this many photos
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ClearArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}
