use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use encoding_rs::WINDOWS_1251;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{Html, Selector};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::SESSION_COOKIE;
use crate::api::VkClient;
use crate::config::TrackerConfig;
use crate::types::Session;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0";

static PROFILE_CONTENT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".BugtrackerReporterProfile__content").expect("valid profile selector")
});

static PLACE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)\s").expect("valid place regex"));

/// Something that knows the tracked reporter's current place.
#[async_trait]
pub trait RankSource: Send + Sync {
    /// `Ok(None)` when the source has nothing usable right now.
    async fn current_place(&self) -> Result<Option<u32>>;
}

/// Reads the place off the reporter's bug-tracker profile page.
pub struct ScrapeRankSource {
    http: reqwest::Client,
    profile_url: Url,
}

impl ScrapeRankSource {
    pub fn new(profile_url: &str, cookie: &str) -> Result<Self> {
        let profile_url =
            Url::parse(profile_url).with_context(|| format!("invalid profile_url {profile_url}"))?;

        let jar = Jar::default();
        if cookie.is_empty() {
            warn!("No {SESSION_COOKIE} cookie configured, the profile may be hidden");
        } else {
            jar.add_cookie_str(&format!("{SESSION_COOKIE}={cookie}; Path=/"), &profile_url);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru"));
        headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::new(jar))
            .build()
            .context("failed to build scrape client")?;

        Ok(Self { http, profile_url })
    }
}

#[async_trait]
impl RankSource for ScrapeRankSource {
    async fn current_place(&self) -> Result<Option<u32>> {
        let bytes = self
            .http
            .get(self.profile_url.clone())
            .send()
            .await
            .context("profile request failed")?
            .bytes()
            .await
            .context("failed to read profile body")?;

        if bytes.is_empty() {
            return Ok(None);
        }

        // The tracker serves windows-1251 regardless of what the headers claim.
        let (body, _, malformed) = WINDOWS_1251.decode(&bytes);
        if malformed {
            debug!("Profile body had bytes outside windows-1251");
        }
        Ok(extract_place(&body))
    }
}

/// Pull the `#<digits>` token out of the profile summary block.
pub fn extract_place(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let text: String = document
        .select(&PROFILE_CONTENT)
        .flat_map(|el| el.text())
        .collect();
    let caps = PLACE_TOKEN.captures(text.trim())?;
    caps[1].parse().ok()
}

/// Asks a tracker method for the reporter's top position.
pub struct ApiRankSource {
    client: VkClient,
    session: Session,
    reporter_id: i64,
    method: String,
}

impl ApiRankSource {
    pub fn new(client: VkClient, session: Session, reporter_id: i64, method: String) -> Self {
        Self {
            client,
            session,
            reporter_id,
            method,
        }
    }
}

#[async_trait]
impl RankSource for ApiRankSource {
    async fn current_place(&self) -> Result<Option<u32>> {
        let body = self
            .client
            .call(
                Some(&self.session),
                &self.method,
                &json!({ "reporter_id": self.reporter_id }),
            )
            .await?;
        Ok(body.as_ref().and_then(top_position))
    }
}

/// `top_position` of the first result; absent or zero means no data.
fn top_position(body: &Value) -> Option<u32> {
    let payload = body.get("response")?;
    let items = payload.get("items").unwrap_or(payload);
    let first = items.as_array()?.first()?;
    first
        .get("top_position")?
        .as_u64()
        .filter(|&p| p != 0)
        .and_then(|p| u32::try_from(p).ok())
}

/// The rank strategy chosen by config. One per deployment.
pub enum Tracker {
    Scrape(ScrapeRankSource),
    Api(ApiRankSource),
}

impl Tracker {
    pub fn from_config(config: &TrackerConfig, client: &VkClient, session: &Session) -> Result<Self> {
        Ok(match config {
            TrackerConfig::Scrape {
                profile_url,
                cookie,
            } => Tracker::Scrape(ScrapeRankSource::new(profile_url, cookie)?),
            TrackerConfig::Api {
                reporter_id,
                method,
            } => Tracker::Api(ApiRankSource::new(
                client.clone(),
                session.clone(),
                *reporter_id,
                method.clone(),
            )),
        })
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            Tracker::Scrape(_) => "scrape",
            Tracker::Api(_) => "api",
        }
    }
}

#[async_trait]
impl RankSource for Tracker {
    async fn current_place(&self) -> Result<Option<u32>> {
        match self {
            Tracker::Scrape(source) => source.current_place().await,
            Tracker::Api(source) => source.current_place().await,
        }
    }
}
