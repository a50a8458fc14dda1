use bookflow_core::Schedule;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// Compute the next UTC execution time for `schedule` strictly after `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` whose instant has
/// passed), when the hour/minute fields do not form a valid time, or when the
/// next instant is out of range.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => (*at > from).then_some(*at),

        Schedule::Interval { every_secs } => i64::try_from(*every_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|step| from.checked_add_signed(step)),

        Schedule::Daily { hour, minute } => {
            let candidate = at_time(from, *hour, *minute)?;
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(1))
            }
        }

        Schedule::Weekly { day, hour, minute } => {
            // 0 = Monday … 6 = Sunday, same as chrono's num_days_from_monday.
            let today = from.weekday().num_days_from_monday() as i64;
            let target = (*day as i64).clamp(0, 6);
            let candidate = at_time(from, *hour, *minute)? + Duration::days((target - today).rem_euclid(7));
            if candidate > from {
                Some(candidate)
            } else {
                Some(candidate + Duration::days(7))
            }
        }
    }
}

/// When a schedule with no run history should fire first.
///
/// Interval schedules start immediately; calendar schedules wait for their
/// next slot.
pub fn first_run(schedule: &Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Interval { .. } => Some(now),
        Schedule::Once { at } => Some(*at),
        _ => compute_next_run(schedule, now),
    }
}

/// First due instant for a daemon starting at `now`, given the logical date
/// of the latest scheduled run on record.
pub fn initial_due(
    schedule: &Schedule,
    last_scheduled: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match last_scheduled {
        Some(last) => compute_next_run(schedule, last),
        None => first_run(schedule, now),
    }
}

/// Next due instant once the slot `due` has fired at `now`.
///
/// With `catchup`, the cadence continues from the slot itself, so every missed
/// slot is visited in turn. Without it, the cadence restarts from `now`.
pub fn next_due(
    schedule: &Schedule,
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    catchup: bool,
) -> Option<DateTime<Utc>> {
    let base = if catchup { due } else { now };
    compute_next_run(schedule, base)
}

fn at_time(day: DateTime<Utc>, hour: u8, minute: u8) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(
        day.year(),
        day.month(),
        day.day(),
        hour as u32,
        minute as u32,
        0,
    )
    .single()
}
