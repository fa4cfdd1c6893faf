//! Workload ledger: per-day committed hours across in-flight tasks.
//!
//! A ledger is private to one optimizer invocation. It is seeded from the
//! tasks the strategy must schedule around (fixed, in-progress, or, in a
//! partial reschedule, every other active task) and then mutated by the
//! strategy as it commits allocations.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use taskdog_core::{HolidayChecker, Task};

use crate::allocation;
use crate::strategy::SCHEDULING_EPSILON;

/// Workday predicate: Mon-Fri minus holidays, or every day when
/// `include_all_days` is set.
#[derive(Clone, Copy)]
pub struct Workdays<'a> {
    holiday_checker: Option<&'a dyn HolidayChecker>,
    include_all_days: bool,
}

impl<'a> Workdays<'a> {
    pub fn new(holiday_checker: Option<&'a dyn HolidayChecker>, include_all_days: bool) -> Self {
        Self {
            holiday_checker,
            include_all_days,
        }
    }

    pub fn is_workday(&self, date: NaiveDate) -> bool {
        if self.include_all_days {
            return true;
        }
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        self.holiday_checker.map_or(true, |h| !h.is_holiday(date))
    }
}

impl std::fmt::Debug for Workdays<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workdays")
            .field("include_all_days", &self.include_all_days)
            .field("has_holiday_checker", &self.holiday_checker.is_some())
            .finish()
    }
}

/// Per-date committed hours, default 0.
#[derive(Debug, Clone, Default)]
pub struct WorkloadLedger {
    reserved: BTreeMap<NaiveDate, f64>,
}

impl WorkloadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserved_on(&self, date: NaiveDate) -> f64 {
        self.reserved.get(&date).copied().unwrap_or(0.0)
    }

    /// Hours still available under `cap`, never negative.
    pub fn available_on(&self, date: NaiveDate, cap: f64) -> f64 {
        (cap - self.reserved_on(date)).max(0.0)
    }

    /// Commit hours to a date. `hours` must be non-negative.
    pub fn reserve(&mut self, date: NaiveDate, hours: f64) {
        if hours > 0.0 {
            *self.reserved.entry(date).or_insert(0.0) += hours;
        }
    }

    /// Give hours back, clamping the date at zero.
    pub fn release(&mut self, date: NaiveDate, hours: f64) {
        if let Some(current) = self.reserved.get_mut(&date) {
            *current = (*current - hours).max(0.0);
            if *current <= SCHEDULING_EPSILON {
                self.reserved.remove(&date);
            }
        }
    }

    pub fn reserved(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.reserved
    }

    /// Dates whose committed hours exceed `cap`.
    pub fn overloaded_days(&self, cap: f64) -> Vec<NaiveDate> {
        self.reserved
            .iter()
            .filter(|(_, &hours)| hours > cap + SCHEDULING_EPSILON)
            .map(|(&date, _)| date)
            .collect()
    }

    /// Pre-populate from tasks the strategy must not reschedule.
    ///
    /// Finished and archived tasks never count. Under `force_override`
    /// only fixed and in-progress tasks hold their reservations; otherwise
    /// every task with a planned start does. Hours come from the task's
    /// allocation map, falling back to an even split over its planned
    /// workdays.
    pub fn seed(&mut self, tasks: &[Task], force_override: bool, workdays: &Workdays<'_>) {
        for task in tasks {
            if !task.should_count_in_workload() {
                continue;
            }
            if force_override {
                if !task.is_fixed && task.status != taskdog_core::TaskStatus::InProgress {
                    continue;
                }
            } else if task.planned_start.is_none() {
                continue;
            }
            for (date, hours) in allocation::distribute(task, workdays) {
                self.reserve(date, hours);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;
    use taskdog_core::TaskStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
    }

    struct Holidays(Vec<NaiveDate>);
    impl HolidayChecker for Holidays {
        fn is_holiday(&self, date: NaiveDate) -> bool {
            self.0.contains(&date)
        }
    }

    #[test]
    fn weekends_are_not_workdays() {
        let workdays = Workdays::new(None, false);
        assert!(workdays.is_workday(date(2025, 1, 6))); // Monday
        assert!(!workdays.is_workday(date(2025, 1, 11))); // Saturday
        assert!(!workdays.is_workday(date(2025, 1, 12))); // Sunday
    }

    #[test]
    fn holidays_are_not_workdays() {
        let holidays = Holidays(vec![date(2025, 1, 1)]);
        let workdays = Workdays::new(Some(&holidays), false);
        assert!(!workdays.is_workday(date(2025, 1, 1))); // Wednesday, holiday
        assert!(workdays.is_workday(date(2025, 1, 2)));
    }

    #[test]
    fn include_all_days_overrides_everything() {
        let holidays = Holidays(vec![date(2025, 1, 11)]);
        let workdays = Workdays::new(Some(&holidays), true);
        assert!(workdays.is_workday(date(2025, 1, 11))); // Saturday and holiday
    }

    #[test]
    fn reserve_and_release_clamp_at_zero() {
        let mut ledger = WorkloadLedger::new();
        let monday = date(2025, 1, 6);

        ledger.reserve(monday, 4.0);
        assert_eq!(ledger.reserved_on(monday), 4.0);
        assert_eq!(ledger.available_on(monday, 6.0), 2.0);

        ledger.release(monday, 10.0);
        assert_eq!(ledger.reserved_on(monday), 0.0);
        assert_eq!(ledger.available_on(monday, 6.0), 6.0);
    }

    #[test]
    fn available_never_negative() {
        let mut ledger = WorkloadLedger::new();
        let monday = date(2025, 1, 6);
        ledger.reserve(monday, 8.0);
        assert_eq!(ledger.available_on(monday, 6.0), 0.0);
    }

    #[test]
    fn seed_uses_allocation_maps() {
        let now = dt(2025, 1, 1, 9);
        let mut task = Task::new(1, "Existing", now)
            .estimated_duration(4.0)
            .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18));
        let mut alloc = BTreeMap::new();
        alloc.insert(date(2025, 1, 6), 4.0);
        task.set_daily_allocations(alloc).unwrap();

        let mut ledger = WorkloadLedger::new();
        ledger.seed(&[task], false, &Workdays::new(None, false));
        assert_eq!(ledger.reserved_on(date(2025, 1, 6)), 4.0);
    }

    #[test]
    fn seed_falls_back_to_even_split() {
        let now = dt(2025, 1, 1, 9);
        // Mon-Wed window, 6h estimate, no allocation map: 2h per workday
        let task = Task::new(1, "Legacy", now)
            .estimated_duration(6.0)
            .planned(dt(2025, 1, 6, 9), dt(2025, 1, 8, 18));

        let mut ledger = WorkloadLedger::new();
        ledger.seed(&[task], false, &Workdays::new(None, false));
        assert_eq!(ledger.reserved_on(date(2025, 1, 6)), 2.0);
        assert_eq!(ledger.reserved_on(date(2025, 1, 7)), 2.0);
        assert_eq!(ledger.reserved_on(date(2025, 1, 8)), 2.0);
    }

    #[test]
    fn seed_skips_finished_tasks() {
        let now = dt(2025, 1, 1, 9);
        let mut task = Task::new(1, "Done", now)
            .estimated_duration(4.0)
            .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18));
        task.complete(now).unwrap();

        let mut ledger = WorkloadLedger::new();
        ledger.seed(&[task], false, &Workdays::new(None, false));
        assert!(ledger.reserved().is_empty());
    }

    #[test]
    fn seed_with_force_keeps_only_fixed_and_in_progress() {
        let now = dt(2025, 1, 1, 9);
        let pending = Task::new(1, "Pending", now)
            .estimated_duration(4.0)
            .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18));
        let mut in_progress = Task::new(2, "Started", now)
            .estimated_duration(3.0)
            .planned(dt(2025, 1, 7, 9), dt(2025, 1, 7, 18));
        in_progress.start(now).unwrap();
        let fixed = Task::new(3, "Fixed", now)
            .estimated_duration(2.0)
            .planned(dt(2025, 1, 8, 9), dt(2025, 1, 8, 18))
            .fixed();

        let mut ledger = WorkloadLedger::new();
        ledger.seed(
            &[pending, in_progress, fixed],
            true,
            &Workdays::new(None, false),
        );

        assert_eq!(ledger.reserved_on(date(2025, 1, 6)), 0.0);
        assert_eq!(ledger.reserved_on(date(2025, 1, 7)), 3.0);
        assert_eq!(ledger.reserved_on(date(2025, 1, 8)), 2.0);
    }

    #[test]
    fn overloaded_days_reports_over_cap() {
        let mut ledger = WorkloadLedger::new();
        ledger.reserve(date(2025, 1, 6), 7.5);
        ledger.reserve(date(2025, 1, 7), 6.0);
        assert_eq!(ledger.overloaded_days(6.0), vec![date(2025, 1, 6)]);
    }

    #[test]
    fn in_progress_task_counts_in_workload() {
        let now = dt(2025, 1, 1, 9);
        let mut task = Task::new(1, "Started", now)
            .estimated_duration(4.0)
            .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18));
        task.start(now).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);

        let mut ledger = WorkloadLedger::new();
        ledger.seed(&[task], false, &Workdays::new(None, false));
        assert_eq!(ledger.reserved_on(date(2025, 1, 6)), 4.0);
    }
}
