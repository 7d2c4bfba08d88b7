use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Cli, TrackArgs};

/// Largest radius the search API accepts, in kilometers.
const MAX_RADIUS_KM: f32 = 32.0;

const PHOTOS_DB: &str = "photos.db";
const PREFERENCES_DB: &str = "preferences.db";

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
}

/// Settings for the `track` command.
pub struct TrackConfig {
    pub route: PathBuf,
    pub api_base_url: String,
    pub api_key: String,
    pub radius_km: f32,
    pub replay_interval: Duration,
}

impl std::fmt::Debug for TrackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackConfig")
            .field("route", &self.route)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"<redacted>")
            .field("radius_km", &self.radius_km)
            .field("replay_interval", &self.replay_interval)
            .finish()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            data_dir: expand_tilde(&cli.data_dir),
        }
    }

    pub fn photos_db(&self) -> PathBuf {
        self.data_dir.join(PHOTOS_DB)
    }

    pub fn preferences_db(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_DB)
    }

    /// Whether a previous run left any database behind.
    pub fn has_data(&self) -> bool {
        exists(&self.photos_db()) || exists(&self.preferences_db())
    }
}

fn exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

impl TrackConfig {
    pub fn from_args(args: TrackArgs) -> anyhow::Result<Self> {
        if args.api_key.trim().is_empty() {
            anyhow::bail!("An API key is required (--api-key or TRACKR_API_KEY)");
        }
        if !(args.radius > 0.0 && args.radius <= MAX_RADIUS_KM) {
            anyhow::bail!(
                "--radius must be greater than 0 and at most {} km, got {}",
                MAX_RADIUS_KM,
                args.radius
            );
        }
        if args.replay_interval == 0 {
            anyhow::bail!("--replay-interval must be at least 1 second");
        }

        Ok(Self {
            route: expand_tilde(&args.route),
            api_base_url: args.api_base_url,
            api_key: args.api_key,
            radius_km: args.radius,
            replay_interval: Duration::from_secs(args.replay_interval),
        })
    }
}
