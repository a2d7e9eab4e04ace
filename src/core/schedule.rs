//! Weekly trigger for unattended exports.

use crate::utils::error::Result;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Weekday};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub at: NaiveTime,
}

impl Default for WeeklySchedule {
    /// Mondays at 09:00 local time.
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        }
    }
}

impl fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {} at {}", self.weekday, self.at.format("%H:%M"))
    }
}

impl WeeklySchedule {
    pub fn new(weekday: Weekday, at: NaiveTime) -> Self {
        Self { weekday, at }
    }

    /// First slot strictly after `now`. A slot that falls into a DST gap fires
    /// an hour later; an ambiguous one fires at its first occurrence.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let today = now.date_naive();

        for offset in 0..=14 {
            let date = today + Duration::days(offset);
            if date.weekday() != self.weekday {
                continue;
            }
            let local = date.and_time(self.at);
            let resolved = tz
                .from_local_datetime(&local)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest());

            if let Some(candidate) = resolved {
                if candidate > *now {
                    return candidate;
                }
            }
        }

        now.clone() + Duration::weeks(1)
    }

    /// Runs `job` at every slot until Ctrl-C. Failed runs are logged and the
    /// loop carries on with the next slot.
    pub async fn run_forever<F, Fut>(&self, run_now: bool, mut job: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        tracing::info!("Scheduler started: {}", self);

        if run_now {
            Self::run_logged(&mut job).await;
        }

        loop {
            let now = chrono::Local::now();
            let next = self.next_after(&now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!("Next export at {}", next.format("%Y-%m-%d %H:%M:%S %Z"));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        tracing::error!("Failed to listen for shutdown signal: {}", e);
                    }
                    tracing::info!("Scheduler stopped");
                    return;
                }
            }

            Self::run_logged(&mut job).await;
        }
    }

    async fn run_logged<F, Fut>(job: &mut F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        match job().await {
            Ok(path) => tracing::info!("Scheduled export written to {}", path.display()),
            Err(e) => tracing::error!(
                "Scheduled export failed: {} (category: {:?}); {}",
                e,
                e.category(),
                e.recovery_suggestion()
            ),
        }
    }
}
