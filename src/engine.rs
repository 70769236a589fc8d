use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::DAY_SECS;

/// Flavor emoji prefixed to countdown and lose posts.
pub const EMOJI_POOL: [&str; 30] = [
    "\u{1F9E8}", // dynamite
    "\u{1F525}", // fire
    "\u{1F44C}", // ok hand
    "\u{270A}",  // fist
    "\u{1F44F}", // clap
    "\u{1F494}", // broken heart
    "\u{1F648}", // monkey
    "\u{1F47B}", // ghost
    "\u{1F608}", // purple head
    "\u{1F60E}", // glasses
    "\u{1F974}", // woozy
    "\u{1F4A3}", // bomb
    "\u{261D}\u{261D}\u{261D}",
    "\u{1F9E0}", // brain
    "\u{1F57A}", // dance
    "\u{1F408}", // cat
    "\u{1F984}", // unicorn
    "\u{1F986}", // duck
    "\u{1F40A}", // crocodile
    "\u{1F438}", // frog
    "\u{1F98B}", // butterfly
    "\u{1F34F}", // apple
    "\u{1F355}", // pizza
    "\u{1F36C}", // candy
    "\u{1F379}", // drink
    "\u{1F682}", // train
    "\u{1F680}", // rocket
    "\u{1F308}", // rainbow
    "\u{1F389}", // party
    "\u{1F5FF}", // moai
];

/// Closing quote of a lose post.
pub const LOSE_POOL: [&str; 12] = [
    "Увы, победа не сегодня",
    "Возможно завтра победим",
    "Бочонок пытался, не удалось",
    "Я обязательно выживу...",
    "Сегодня читал книжку про java, не успел",
    "Завтра перезвоню",
    "Отстаньте, пожалуйста",
    "Я вам ничего не должен",
    "Сегодня велосипед",
    "Жалко продуктов нет нормальных (в холодильнике)",
    "[голосовое сообщение]",
    "Сегодня написал трек новый",
];

const TROPHY: &str = "\u{1F3C6}";

/// Campaign window and the place that counts as a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unix seconds.
    pub start_date: i64,
    /// Unix seconds.
    pub end_date: i64,
    /// Won once the place is at or below this value.
    pub target_place: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Active,
    Concluded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Countdown,
    Win,
    Lose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: MessageKind,
    pub text: String,
}

/// `ceil(secs / DAY_SECS)` for any sign.
fn ceil_days(secs: i64) -> i64 {
    let days = secs / DAY_SECS;
    if secs % DAY_SECS > 0 { days + 1 } else { days }
}

impl Campaign {
    pub fn days_elapsed(&self, now: i64) -> i64 {
        ceil_days((now - self.start_date).abs())
    }

    /// Negative once the end date has passed.
    pub fn days_remaining(&self, now: i64) -> i64 {
        ceil_days(self.end_date - now)
    }

    pub fn is_won(&self, place: u32) -> bool {
        place <= self.target_place
    }

    pub fn phase(&self, now: i64, place: Option<u32>) -> Phase {
        if now <= self.start_date {
            Phase::NotStarted
        } else if place.is_some_and(|p| self.is_won(p)) {
            Phase::Concluded
        } else {
            Phase::Active
        }
    }

    /// Loop condition: inside the window, or the last place already reached
    /// the target. An unset place never satisfies the second clause.
    pub fn keep_running(&self, now: i64, last_place: Option<u32>) -> bool {
        now <= self.end_date || last_place.is_some_and(|p| self.is_won(p))
    }
}

/// Render the post for `phase` at `now` with the observed `place`.
pub fn compose<R: Rng + ?Sized>(
    campaign: &Campaign,
    phase: Phase,
    now: i64,
    place: u32,
    rng: &mut R,
) -> Announcement {
    let days = campaign.days_elapsed(now);
    let remaining = campaign.days_remaining(now);
    let emoji = EMOJI_POOL.choose(rng).copied().unwrap_or(TROPHY);

    match phase {
        Phase::NotStarted => Announcement {
            kind: MessageKind::Countdown,
            text: format!("{emoji} Начало лотереи через {days} дн."),
        },
        Phase::Concluded => Announcement {
            kind: MessageKind::Win,
            text: format!(
                "{TROPHY} Лотерея завершена на {days} дн. (осталось: {remaining})\n\
                 Выпал бочонок #{place}, поздравляем!\n\
                 (бот уходит спать)"
            ),
        },
        Phase::Active => {
            let lose_text = LOSE_POOL.choose(rng).copied().unwrap_or_default();
            Announcement {
                kind: MessageKind::Lose,
                text: format!(
                    "{emoji} НЕТ\n\n Лотерея идёт уже {days} дн. (осталось: {remaining})\n\
                     Сегодня выпал бочонок #{place}\n\n«{lose_text}»"
                ),
            }
        }
    }
}
