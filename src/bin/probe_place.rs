//! Probe: read the tracked reporter's place once.
//!
//! Uses the strategy from `config.toml` (scrape or api) and prints what the
//! polling loop would see, along with the campaign phase for "now".

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use clap::Parser;

use place_watch::api::VkClient;
use place_watch::auth::identity_check;
use place_watch::config::{AppConfig, CONFIG_PATH};
use place_watch::rank::{RankSource, Tracker};

#[derive(Parser)]
#[command(name = "probe-place", about = "Fetch and print the current tracker place")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?.with_env_overrides();

    let client = VkClient::new(&config.vk)?;
    let Some(session) = identity_check(&client).await? else {
        bail!("VK authentication failed");
    };
    println!("Logged in as {} {}", session.user().first_name, session.user().last_name);

    let tracker = Tracker::from_config(&config.tracker, &client, &session)?;
    println!("Strategy: {}", tracker.strategy());

    let start = Instant::now();
    let place = tracker.current_place().await?;
    println!("Latency: {:?}", start.elapsed());

    let now = chrono::Utc::now().timestamp();
    let campaign = config.campaign;
    match place {
        Some(place) => {
            println!("Place: #{place}");
            println!("Phase: {:?}", campaign.phase(now, Some(place)));
        }
        None => println!("Place: not found"),
    }
    println!("Days elapsed:   {}", campaign.days_elapsed(now));
    println!("Days remaining: {}", campaign.days_remaining(now));

    Ok(())
}
