// src/jobs/scheduler.rs

//! Recurring jobs: daily reminders and the monthly report batch (UTC).

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::{
    config::ScheduleConfig,
    jobs::{Job, JobQueue, report::ReportMonth},
};

/// First instant strictly after `now` at time-of-day `at`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// First instant strictly after `now` on day-of-month `day` at `at`.
/// `day` must be valid in every month (1..=28).
pub fn next_monthly_run(now: DateTime<Utc>, day: u32, at: NaiveTime) -> DateTime<Utc> {
    let (mut year, mut month) = (now.year(), now.month());
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let candidate = date.and_time(at).and_utc();
            if candidate > now {
                return candidate;
            }
        }
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
}

async fn sleep_until(at: DateTime<Utc>) {
    let wait = (at - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}

/// Spawns the reminder and monthly-report loops. No-op when disabled.
pub fn spawn(queue: JobQueue, schedule: ScheduleConfig) {
    if !schedule.enabled {
        tracing::info!("Scheduler disabled");
        return;
    }

    let reminders = queue.clone();
    let reminder_time = schedule.reminder_time;
    tokio::spawn(async move {
        loop {
            let next = next_daily_run(Utc::now(), reminder_time);
            tracing::info!(%next, "Next daily reminder run");
            sleep_until(next).await;
            if let Err(e) = reminders.enqueue(Job::DailyReminders, None).await {
                tracing::error!("Failed to enqueue daily reminders: {}", e.message());
            }
        }
    });

    let day = schedule.monthly_report_day;
    let report_time = schedule.monthly_report_time;
    tokio::spawn(async move {
        loop {
            let next = next_monthly_run(Utc::now(), day, report_time);
            tracing::info!(%next, "Next monthly report run");
            sleep_until(next).await;
            let month = ReportMonth::previous(Utc::now());
            if let Err(e) = queue.enqueue(Job::AllMonthlyReports { month }, None).await {
                tracing::error!("Failed to enqueue monthly reports: {}", e.message());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daily_run_later_today_or_tomorrow() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(morning, at(18, 0)),
            Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap()
        );

        let evening = Utc.with_ymd_and_hms(2024, 3, 10, 18, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(evening, at(18, 0)),
            Utc.with_ymd_and_hms(2024, 3, 11, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn monthly_run_rolls_into_next_month_and_year() {
        let before = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        assert_eq!(
            next_monthly_run(before, 1, at(8, 0)),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );

        let after = Utc.with_ymd_and_hms(2024, 12, 5, 0, 0, 0).unwrap();
        assert_eq!(
            next_monthly_run(after, 1, at(8, 0)),
            Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
        );
    }
}
