use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::DateTime;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info};

use place_watch::api::{VkClient, VkWall};
use place_watch::auth::identity_check;
use place_watch::config::{AppConfig, CONFIG_PATH};
use place_watch::poller::{PollSettings, Poller};
use place_watch::rank::Tracker;

#[derive(Parser)]
#[command(
    name = "place-watch",
    about = "Post bug-tracker place updates to a VK group wall"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

fn format_date(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?.with_env_overrides();
    info!("Loaded config from {}", args.config.display());

    let client = VkClient::new(&config.vk)?;
    let Some(session) = identity_check(&client).await? else {
        error!("Token check failed, run setup-token to get a fresh one");
        bail!("VK authentication failed");
    };

    let tracker = Tracker::from_config(&config.tracker, &client, &session)?;
    let campaign = config.campaign;
    let settings = PollSettings::from(&config.settings);
    info!(
        "Watching place ({}) for group {}: start={} end={} target<={} poll={}s",
        tracker.strategy(),
        config.vk.group_id,
        format_date(campaign.start_date),
        format_date(campaign.end_date),
        campaign.target_place,
        settings.interval.as_secs(),
    );

    let wall = VkWall::new(client, session, config.vk.group_id);
    let mut poller = Poller::new(wall, tracker, campaign, settings, StdRng::from_os_rng());

    tokio::select! {
        result = poller.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
