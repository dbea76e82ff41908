//! Freshness decision for the published artifacts

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::time::Duration;

use crate::config::MergeConfig;

/// When a merge is due, derived from the merge settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSchedule {
    pub auto_merge: bool,
    pub reload_interval: Duration,
    pub merge_at_hour: bool,
    pub merge_hour: u32,
    pub cooldown: Duration,
}

impl MergeSchedule {
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            auto_merge: config.auto_merge,
            reload_interval: Duration::from_secs(u64::from(config.reload_time_hours) * 3600),
            merge_at_hour: config.merge_at_hour,
            merge_hour: config.merge_hour,
            cooldown: config.effective_cooldown(),
        }
    }

    /// Decide whether a merge should run now.
    ///
    /// Nothing runs within the cooldown of the last run. After that a merge is
    /// due when the reload interval has elapsed, when today's merge hour has
    /// passed since the last run, or when either artifact is missing.
    /// `now` carries the local time zone used for the merge hour.
    pub fn is_due<Tz: TimeZone>(
        &self,
        last_run: Option<DateTime<Utc>>,
        now: &DateTime<Tz>,
        artifacts_present: bool,
    ) -> bool {
        let now_utc = now.with_timezone(&Utc);
        let since_last = last_run.map(|last| now_utc.signed_duration_since(last));

        if let Some(elapsed) = since_last
            && elapsed < to_delta(self.cooldown)
        {
            return false;
        }

        let reload_due = self.auto_merge
            && since_last.is_none_or(|elapsed| elapsed > to_delta(self.reload_interval));

        let at_hour = !reload_due
            && self.merge_at_hour
            && self.todays_run_time(now).is_some_and(|run_at| {
                last_run.is_none_or(|last| last < run_at) && now_utc >= run_at
            });

        reload_due || at_hour || !artifacts_present
    }

    /// Today's merge hour in `now`'s time zone, as UTC
    fn todays_run_time<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let naive = now.date_naive().and_hms_opt(self.merge_hour, 0, 0)?;
        now.timezone()
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rstest::rstest;

    fn schedule(auto_merge: bool, merge_at_hour: bool) -> MergeSchedule {
        MergeSchedule {
            auto_merge,
            reload_interval: Duration::from_secs(12 * 3600),
            merge_at_hour,
            merge_hour: 3,
            cooldown: Duration::from_secs(300),
        }
    }

    /// Local time in UTC+10
    fn local(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(10 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, day, hour, minute, 0)
            .unwrap()
    }

    fn utc(local: DateTime<FixedOffset>) -> Option<DateTime<Utc>> {
        Some(local.with_timezone(&Utc))
    }

    #[test]
    fn test_first_run_is_due() {
        assert!(schedule(true, false).is_due(None, &local(16, 12, 0), true));
    }

    #[test]
    fn test_cooldown_blocks_even_missing_artifacts() {
        let now = local(16, 12, 0);
        let last = utc(local(16, 11, 57));
        assert!(!schedule(true, true).is_due(last, &now, false));
    }

    #[rstest]
    // Reload interval elapsed
    #[case(true, false, (15, 23, 0), (16, 12, 0), true)]
    // Interval not yet elapsed
    #[case(true, false, (16, 1, 0), (16, 12, 0), false)]
    // Auto merge off never reloads on interval
    #[case(false, false, (15, 0, 0), (16, 12, 0), false)]
    // Merge hour passed since the last run
    #[case(false, true, (16, 2, 0), (16, 3, 10), true)]
    // Merge hour not reached yet today
    #[case(false, true, (16, 1, 0), (16, 2, 50), false)]
    // Already ran after today's merge hour
    #[case(false, true, (16, 3, 5), (16, 9, 0), false)]
    fn test_due_decision(
        #[case] auto_merge: bool,
        #[case] merge_at_hour: bool,
        #[case] last: (u32, u32, u32),
        #[case] now: (u32, u32, u32),
        #[case] expected: bool,
    ) {
        let last = utc(local(last.0, last.1, last.2));
        let now = local(now.0, now.1, now.2);
        assert_eq!(
            schedule(auto_merge, merge_at_hour).is_due(last, &now, true),
            expected
        );
    }

    #[test]
    fn test_missing_artifact_forces_merge_after_cooldown() {
        let last = utc(local(16, 11, 0));
        assert!(schedule(false, false).is_due(last, &local(16, 12, 0), false));
    }

    #[test]
    fn test_cooldown_floor_from_config() {
        let config = MergeConfig {
            cooldown: Duration::from_secs(10),
            ..MergeConfig::default()
        };
        assert_eq!(MergeSchedule::from_config(&config).cooldown, Duration::from_secs(300));
    }
}
