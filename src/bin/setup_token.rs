//! setup-token: refresh the VK access token used by place-watch.
//!
//! Expects `config.toml` to already exist (copied from `config.toml.template`).
//! Prints the login URL to open in a browser, reads the token from the
//! redirect, verifies it with `account.getProfileInfo`, and writes it back
//! into the config file.
//!
//! By default, reads the token interactively (hidden input) to avoid leaking
//! it into shell history. Use `--token` only for scripted use.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use place_watch::api::VkClient;
use place_watch::auth::identity_check;
use place_watch::config::{AppConfig, CONFIG_PATH};

#[derive(Parser)]
#[command(
    name = "setup-token",
    about = "Verify a VK access token and save it to config.toml"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Access token. If omitted, reads interactively with hidden input (recommended).
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_path();

    let mut app_config = AppConfig::load(config_path).with_context(|| {
        format!(
            "{} not found, copy config.toml.template to config.toml first",
            config_path.display()
        )
    })?;

    println!("=== place-watch Token Setup ===\n");

    // ── Step 1: Read token ─────────────────────────────────────────
    let token = match cli.token {
        Some(token) => token.trim().to_string(),
        None => {
            if app_config.vk.login_url.is_empty() {
                println!("No login_url in config; open your app's OAuth authorize URL manually.");
            } else {
                println!("Open this URL, allow access, and copy access_token from the redirect:");
                println!("  {}\n", app_config.vk.login_url);
            }
            rpassword::prompt_password("Enter access token: ")
                .context("failed to read access token")?
                .trim()
                .to_string()
        }
    };
    if token.is_empty() {
        bail!("access token cannot be empty");
    }

    // ── Step 2: Verify token ───────────────────────────────────────
    println!("Checking token...");
    let mut vk = app_config.vk.clone();
    vk.token = token.clone();
    let client = VkClient::new(&vk)?;
    let Some(session) = identity_check(&client).await? else {
        bail!("token check failed, the token is invalid or expired");
    };
    let user = session.user();
    println!("  Logged in as {} {} (id {})", user.first_name, user.last_name, user.id);
    println!();

    // ── Step 3: Update token in config.toml ────────────────────────
    println!("Updating token in {}...", config_path.display());
    app_config.vk.token = token;
    app_config.save(config_path)?;
    println!("  Config updated successfully");
    println!();

    println!("=== Setup Complete ===");
    println!();
    println!("Next steps:");
    println!("  cargo run --bin probe-place      # check the tracker is readable");
    println!("  cargo run --bin place-watch");

    Ok(())
}
