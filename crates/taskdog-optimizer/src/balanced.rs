//! Balanced strategy: equal distribution across the days before the
//! deadline.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use taskdog_core::Task;

use crate::allocation::ceil_to_tenth;
use crate::ledger::WorkloadLedger;
use crate::strategy::{
    schedule_task, OptimizeParams, OptimizeStrategy, StrategyOutcome, SCHEDULING_EPSILON,
};

/// *Equal Distribution*: give each task a per-day quota of
/// `ceil_to_tenth(estimate / workdays_until_deadline)` and walk the window
/// committing up to that quota per workday.
#[derive(Debug)]
pub struct BalancedStrategy {
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl BalancedStrategy {
    pub fn new(day_start: NaiveTime, day_end: NaiveTime) -> Self {
        Self { day_start, day_end }
    }
}

impl OptimizeStrategy for BalancedStrategy {
    fn optimize(
        &self,
        tasks: &[Task],
        ledger: &mut WorkloadLedger,
        params: &OptimizeParams<'_>,
    ) -> StrategyOutcome {
        let workdays = params.workdays();
        let mut outcome = StrategyOutcome::default();

        let mut order: Vec<&Task> = tasks.iter().collect();
        order.sort_by_key(|t| (t.deadline.is_none(), t.deadline, Reverse(t.priority), t.id));

        for task in order {
            let Some(estimate) = task.estimated_duration else {
                outcome.record_failure(task, "no estimated duration");
                continue;
            };
            let start_day = params.start_date.date();
            let horizon = params.effective_deadline(task).date();
            let window =
                crate::allocation::workdays_between(start_day, horizon, &workdays);
            if window.is_empty() {
                outcome.record_failure(task, "No workdays available before deadline");
                continue;
            }

            let quota = ceil_to_tenth(estimate / window.len() as f64);
            let mut remaining = estimate;
            let mut allocations: BTreeMap<NaiveDate, f64> = BTreeMap::new();

            for &day in &window {
                if remaining <= SCHEDULING_EPSILON {
                    break;
                }
                let available = ledger.available_on(day, params.max_hours_per_day);
                let allocated = quota.min(available).min(remaining);
                if allocated > SCHEDULING_EPSILON {
                    allocations.insert(day, allocated);
                    remaining -= allocated;
                }
            }

            if remaining > SCHEDULING_EPSILON {
                outcome.record_failure(
                    task,
                    format!("Insufficient capacity before deadline; {remaining:.1}h remaining"),
                );
                continue;
            }

            let (Some((&first, _)), Some((&last, _))) =
                (allocations.first_key_value(), allocations.last_key_value())
            else {
                outcome.record_failure(task, "No capacity available");
                continue;
            };
            for (&date, &hours) in &allocations {
                ledger.reserve(date, hours);
                *outcome.daily_allocations.entry(date).or_insert(0.0) += hours;
            }
            outcome.scheduled.push(schedule_task(
                task,
                first,
                last,
                allocations,
                self.day_start,
                self.day_end,
                params.current_time,
            ));
        }

        outcome
    }
}
