use time::{error::ComponentRange, Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::users::services::UserDirectory;

/// First `day`-of-month midnight (UTC) strictly after `now`.
pub fn next_reset_after(now: OffsetDateTime, day: u8) -> Result<OffsetDateTime, ComponentRange> {
    let now = now.to_offset(time::UtcOffset::UTC);
    let this_month = Date::from_calendar_date(now.year(), now.month(), day)?;
    let candidate = PrimitiveDateTime::new(this_month, Time::MIDNIGHT).assume_utc();
    if candidate > now {
        return Ok(candidate);
    }

    let (year, month) = match now.month() {
        Month::December => (now.year() + 1, Month::January),
        m => (now.year(), m.next()),
    };
    let next_month = Date::from_calendar_date(year, month, day)?;
    Ok(PrimitiveDateTime::new(next_month, Time::MIDNIGHT).assume_utc())
}

/// Resets the free-tier quota once a month until cancelled. A failed run is
/// logged and the next one is scheduled as usual.
pub async fn run_quota_reset(users: UserDirectory, reset_day: u8, cancel: CancellationToken) {
    loop {
        let now = OffsetDateTime::now_utc();
        let next = match next_reset_after(now, reset_day) {
            Ok(next) => next,
            Err(e) => {
                error!(error = %e, reset_day, "invalid quota reset day; scheduler stopped");
                return;
            }
        };
        info!(next_run = %next, "free tier quota reset scheduled");

        tokio::select! {
            () = cancel.cancelled() => {
                info!("quota reset scheduler shutting down");
                return;
            }
            () = tokio::time::sleep((next - now).unsigned_abs()) => {
                if let Err(e) = users.reset_all_free_tier_quota().await {
                    warn!(error = %e, "free tier quota reset failed");
                }
            }
        }
    }
}

pub fn spawn(users: UserDirectory, reset_day: u8, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(run_quota_reset(users, reset_day, cancel))
}
