use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::DAY_SECS;
use crate::config::SettingsConfig;
use crate::engine::{Campaign, MessageKind, Phase, compose};
use crate::rank::RankSource;
use crate::state::PollState;

/// The timeline updates are posted to.
#[async_trait]
pub trait Wall: Send + Sync {
    /// Unix timestamp of the newest post, if the wall has any.
    async fn latest_post_date(&self) -> Result<Option<i64>>;

    /// Publish `message`; `Ok(false)` when the remote side refused it.
    async fn post(&self, message: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay before the first iteration.
    pub warmup: Duration,
    /// Delay before every later iteration.
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&SettingsConfig::default())
    }
}

impl From<&SettingsConfig> for PollSettings {
    fn from(settings: &SettingsConfig) -> Self {
        Self {
            warmup: Duration::from_millis(settings.warmup_ms),
            interval: Duration::from_secs(settings.poll_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoWallData,
    RecentlyPosted,
    NoPlace,
}

/// What one iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Skipped(SkipReason),
    Posted { kind: MessageKind, ok: bool },
    /// Target reached and the win post was attempted; the loop ends here.
    Won { ok: bool },
}

/// Sleep, check the wall, read the place, post. Repeat.
pub struct Poller<W, R, G> {
    wall: W,
    ranks: R,
    campaign: Campaign,
    settings: PollSettings,
    rng: G,
    state: PollState,
}

impl<W: Wall, R: RankSource, G: Rng> Poller<W, R, G> {
    pub fn new(wall: W, ranks: R, campaign: Campaign, settings: PollSettings, rng: G) -> Self {
        Self {
            wall,
            ranks,
            campaign,
            settings,
            rng,
            state: PollState::new(),
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// One iteration at wall-clock `now`.
    pub async fn run_cycle(&mut self, now: i64) -> Result<Cycle> {
        let Some(last_post) = self.wall.latest_post_date().await? else {
            debug!("No wall data");
            return Ok(Cycle::Skipped(SkipReason::NoWallData));
        };

        if now - last_post <= DAY_SECS {
            debug!("Last post is {}s old, nothing to do", now - last_post);
            return Ok(Cycle::Skipped(SkipReason::RecentlyPosted));
        }

        info!("Need update...");
        // A place of 0 is treated the same as no place at all.
        let Some(place) = self.ranks.current_place().await?.filter(|&p| p != 0) else {
            warn!("Could not read the current place");
            return Ok(Cycle::Skipped(SkipReason::NoPlace));
        };

        info!("Place === {place}");
        self.state.record_place(place);

        let phase = self.campaign.phase(now, Some(place));
        let announcement = compose(&self.campaign, phase, now, place, &mut self.rng);
        let ok = self.wall.post(&announcement.text).await?;
        if !ok {
            error!("wallPost error!");
        }

        Ok(match phase {
            Phase::Concluded => Cycle::Won { ok },
            Phase::NotStarted | Phase::Active => Cycle::Posted {
                kind: announcement.kind,
                ok,
            },
        })
    }

    /// Loop until the target is reached or the campaign window closes.
    ///
    /// Errors inside an iteration are logged and the iteration is skipped.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let delay = if self.state.is_first_tick() {
                self.settings.warmup
            } else {
                self.settings.interval
            };
            info!("Sleep...");
            tokio::time::sleep(delay).await;

            let now = chrono::Utc::now().timestamp();
            self.state.record_tick(now);

            match self.run_cycle(now).await {
                Ok(Cycle::Won { .. }) => break,
                Ok(cycle) => debug!("Cycle finished: {cycle:?}"),
                Err(e) => warn!("Poll cycle error: {e:#}"),
            }

            if !self.campaign.keep_running(now, self.state.current_place) {
                break;
            }
        }

        info!("Done.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::engine::{EMOJI_POOL, LOSE_POOL};

    const START: i64 = 1605906000;
    const END: i64 = 1621026000;
    const NOW: i64 = 1605996000;

    const CAMPAIGN: Campaign = Campaign {
        start_date: START,
        end_date: END,
        target_place: 10,
    };

    #[derive(Clone, Default)]
    struct FakeWall {
        last: Option<i64>,
        accept: bool,
        broken: bool,
        posts: Arc<Mutex<Vec<String>>>,
    }

    impl FakeWall {
        fn with_last(last: i64) -> Self {
            Self {
                last: Some(last),
                accept: true,
                ..Default::default()
            }
        }

        fn posts(&self) -> Vec<String> {
            self.posts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Wall for FakeWall {
        async fn latest_post_date(&self) -> Result<Option<i64>> {
            if self.broken {
                anyhow::bail!("connection reset");
            }
            Ok(self.last)
        }

        async fn post(&self, message: &str) -> Result<bool> {
            self.posts.lock().unwrap().push(message.to_string());
            Ok(self.accept)
        }
    }

    #[derive(Clone, Default)]
    struct FakeRanks {
        place: Arc<Mutex<Option<u32>>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeRanks {
        fn at(place: u32) -> Self {
            let ranks = Self::default();
            ranks.set(Some(place));
            ranks
        }

        fn set(&self, place: Option<u32>) {
            *self.place.lock().unwrap() = place;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RankSource for FakeRanks {
        async fn current_place(&self) -> Result<Option<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(*self.place.lock().unwrap())
        }
    }

    fn poller(
        wall: &FakeWall,
        ranks: &FakeRanks,
        campaign: Campaign,
    ) -> Poller<FakeWall, FakeRanks, StdRng> {
        let settings = PollSettings {
            warmup: Duration::ZERO,
            interval: Duration::ZERO,
        };
        Poller::new(
            wall.clone(),
            ranks.clone(),
            campaign,
            settings,
            StdRng::seed_from_u64(11),
        )
    }

    // ── run_cycle: guards ──────────────────────────────────────────

    #[tokio::test]
    async fn recent_post_skips_without_reading_place() {
        let wall = FakeWall::with_last(NOW - 3600);
        let ranks = FakeRanks::at(5);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(cycle, Cycle::Skipped(SkipReason::RecentlyPosted));
        assert!(wall.posts().is_empty());
        assert_eq!(ranks.calls(), 0);
    }

    #[tokio::test]
    async fn exactly_one_day_still_counts_as_recent() {
        let wall = FakeWall::with_last(NOW - DAY_SECS);
        let ranks = FakeRanks::at(5);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(cycle, Cycle::Skipped(SkipReason::RecentlyPosted));
    }

    #[tokio::test]
    async fn empty_wall_skips() {
        let wall = FakeWall {
            accept: true,
            ..Default::default()
        };
        let ranks = FakeRanks::at(5);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(cycle, Cycle::Skipped(SkipReason::NoWallData));
        assert_eq!(ranks.calls(), 0);
    }

    #[tokio::test]
    async fn missing_place_keeps_previous_state() {
        let wall = FakeWall::with_last(NOW - 2 * DAY_SECS);
        let ranks = FakeRanks::at(15);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        p.run_cycle(NOW).await.unwrap();
        assert_eq!(p.state().current_place, Some(15));

        ranks.set(None);
        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(cycle, Cycle::Skipped(SkipReason::NoPlace));
        assert_eq!(p.state().current_place, Some(15));
        assert_eq!(wall.posts().len(), 1);
    }

    #[tokio::test]
    async fn zero_place_counts_as_no_data() {
        let wall = FakeWall::with_last(NOW - 2 * DAY_SECS);
        let ranks = FakeRanks::at(0);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(cycle, Cycle::Skipped(SkipReason::NoPlace));
        assert_eq!(p.state().current_place, None);
        assert!(wall.posts().is_empty());
    }

    // ── run_cycle: posts ───────────────────────────────────────────

    #[tokio::test]
    async fn win_posts_trophy() {
        let wall = FakeWall::with_last(NOW - 2 * DAY_SECS);
        let ranks = FakeRanks::at(5);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(cycle, Cycle::Won { ok: true });
        let posts = wall.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].starts_with("\u{1F3C6} Лотерея завершена на 2 дн."));
        assert!(posts[0].contains("#5, поздравляем!"));
    }

    #[tokio::test]
    async fn lose_posts_from_pool() {
        let wall = FakeWall::with_last(NOW - 2 * DAY_SECS);
        let ranks = FakeRanks::at(15);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(
            cycle,
            Cycle::Posted {
                kind: MessageKind::Lose,
                ok: true
            }
        );
        let post = &wall.posts()[0];
        assert!(EMOJI_POOL.iter().any(|e| post.starts_with(e)));
        assert!(LOSE_POOL.iter().any(|l| post.ends_with(&format!("«{l}»"))));
        assert!(post.contains("Сегодня выпал бочонок #15"));
    }

    #[tokio::test]
    async fn before_start_posts_countdown_even_when_place_is_good() {
        let now = START - 2 * DAY_SECS;
        let wall = FakeWall::with_last(now - 2 * DAY_SECS);
        let ranks = FakeRanks::at(1);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(now).await.unwrap();
        assert_eq!(
            cycle,
            Cycle::Posted {
                kind: MessageKind::Countdown,
                ok: true
            }
        );
        assert!(wall.posts()[0].ends_with("Начало лотереи через 2 дн."));
    }

    #[tokio::test]
    async fn refused_post_is_reported_not_fatal() {
        let wall = FakeWall {
            last: Some(NOW - 2 * DAY_SECS),
            accept: false,
            ..Default::default()
        };
        let ranks = FakeRanks::at(15);
        let mut p = poller(&wall, &ranks, CAMPAIGN);

        let cycle = p.run_cycle(NOW).await.unwrap();
        assert_eq!(
            cycle,
            Cycle::Posted {
                kind: MessageKind::Lose,
                ok: false
            }
        );
    }

    // ── run ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_stops_after_win() {
        let wall = FakeWall::with_last(0);
        let ranks = FakeRanks::at(5);
        let campaign = Campaign {
            start_date: 0,
            end_date: i64::MAX / 2,
            target_place: 10,
        };
        let mut p = poller(&wall, &ranks, campaign);

        p.run().await.unwrap();
        assert_eq!(wall.posts().len(), 1);
        assert_eq!(p.state().current_place, Some(5));
        assert!(p.state().current_timestamp.is_some());
    }

    #[tokio::test]
    async fn run_stops_once_window_closed() {
        let wall = FakeWall::with_last(0);
        let ranks = FakeRanks::at(15);
        let campaign = Campaign {
            start_date: 0,
            end_date: 1,
            target_place: 10,
        };
        let mut p = poller(&wall, &ranks, campaign);

        p.run().await.unwrap();
        assert_eq!(wall.posts().len(), 1);
        assert_eq!(ranks.calls(), 1);
    }

    #[tokio::test]
    async fn run_survives_transport_errors() {
        let wall = FakeWall {
            broken: true,
            ..Default::default()
        };
        let ranks = FakeRanks::at(15);
        let campaign = Campaign {
            start_date: 0,
            end_date: 1,
            target_place: 10,
        };
        let mut p = poller(&wall, &ranks, campaign);

        assert!(p.run_cycle(NOW).await.is_err());
        p.run().await.unwrap();
        assert!(wall.posts().is_empty());
    }
}
