//! Scheduled notifications: wake-up, training reminder, morning stretch.
//!
//! Cron rules are evaluated in the configured timezone. Fire-on-schedule only:
//! instants missed while the process is down are not replayed.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use teloxide::types::ChatId;
use tracing::{info, warn};

use crate::telegram::TelegramClient;

// cron crate uses 7-field format: sec min hour day month dow year
const WAKE_UP_CRON: &str = "0 0 9 * * * *";
const TRAINING_CRON: &str = "0 20 16 * * Tue,Thu,Sat *";
const STRETCH_CRON: &str = "0 20 9 * * * *";

const WAKE_UP_TEXT: &str = "Астах, пора просыпаться! ☀️";
const TRAINING_TEXT: &str =
    "Астах, не забудь про тренировку по футболу сегодня в 16:20! ⚽️";
const STRETCH_TEXT: &str =
    "Не забудь сделать утреннюю разминку, это поможет начать день правильно! 💪";

/// A recurring notification: cron rule plus the fixed message it sends.
pub struct Notification {
    pub name: &'static str,
    pub schedule: Schedule,
    pub text: &'static str,
}

/// The three built-in triggers.
pub fn notifications() -> Vec<Notification> {
    [
        ("wake_up", WAKE_UP_CRON, WAKE_UP_TEXT),
        ("training_reminder", TRAINING_CRON, TRAINING_TEXT),
        ("morning_stretch", STRETCH_CRON, STRETCH_TEXT),
    ]
    .into_iter()
    .map(|(name, cron, text)| Notification {
        name,
        schedule: Schedule::from_str(cron).unwrap(),
        text,
    })
    .collect()
}

/// Next instant each notification will fire after `now`, earliest first.
fn upcoming<'a>(
    jobs: &'a [Notification],
    now: DateTime<Tz>,
) -> Vec<(DateTime<Tz>, &'a Notification)> {
    let mut next: Vec<_> = jobs
        .iter()
        .filter_map(|job| job.schedule.after(&now).next().map(|at| (at, job)))
        .collect();
    next.sort_by_key(|(at, _)| *at);
    next
}

/// Run the notification loop: sleep until the earliest trigger, send every
/// message due at that instant, repeat. Failed sends are logged and skipped;
/// the next occurrence still fires.
pub async fn run(telegram: TelegramClient, chat_id: ChatId, timezone: Tz) {
    let jobs = notifications();
    info!("Scheduler started ({} trigger(s), timezone {})", jobs.len(), timezone);

    loop {
        let now = Utc::now().with_timezone(&timezone);
        let next = upcoming(&jobs, now);
        let Some(&(fire_at, _)) = next.first() else {
            warn!("No upcoming notifications; scheduler stopping");
            return;
        };

        let wait = (fire_at.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default();
        tokio::time::sleep(wait).await;

        // Independent triggers can share an instant (no ordering guarantee).
        for (at, job) in next.iter().filter(|(at, _)| *at == fire_at) {
            match telegram.send_message(chat_id, job.text, None).await {
                Ok(_) => info!("Sent {} notification ({})", job.name, at),
                Err(e) => warn!("Failed to send {} notification: {}", job.name, e),
            }
        }
    }
}
