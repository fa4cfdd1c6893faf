//! Backward strategy: just-in-time packing from the deadline backward.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use taskdog_core::Task;

use crate::ledger::WorkloadLedger;
use crate::strategy::{
    prev_day, schedule_task, OptimizeParams, OptimizeStrategy, StrategyOutcome,
    SCHEDULING_EPSILON,
};

/// *Just-In-Time*: walk backward over workdays from the effective deadline,
/// committing hours as late as possible. Tasks with the furthest deadlines
/// are placed first so earlier deadlines pack into the earlier days.
#[derive(Debug)]
pub struct BackwardStrategy {
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl BackwardStrategy {
    pub fn new(day_start: NaiveTime, day_end: NaiveTime) -> Self {
        Self { day_start, day_end }
    }
}

impl OptimizeStrategy for BackwardStrategy {
    fn optimize(
        &self,
        tasks: &[Task],
        ledger: &mut WorkloadLedger,
        params: &OptimizeParams<'_>,
    ) -> StrategyOutcome {
        let workdays = params.workdays();
        let mut outcome = StrategyOutcome::default();

        // Furthest deadline first, then priority, then id.
        let mut order: Vec<&Task> = tasks.iter().collect();
        order.sort_by_key(|t| {
            (
                Reverse(params.effective_deadline(t)),
                Reverse(t.priority),
                t.id,
            )
        });

        let start_day = params.start_date.date();
        for task in order {
            let Some(estimate) = task.estimated_duration else {
                outcome.record_failure(task, "no estimated duration");
                continue;
            };

            let mut remaining = estimate;
            let mut allocations: BTreeMap<NaiveDate, f64> = BTreeMap::new();
            let mut cursor = Some(params.effective_deadline(task).date());
            let mut failure: Option<String> = None;

            while remaining > SCHEDULING_EPSILON {
                let Some(day) = cursor else {
                    failure = Some(format!("Deadline too close; {remaining:.1}h remaining"));
                    break;
                };
                if day < start_day {
                    failure = Some(format!("Deadline too close; {remaining:.1}h remaining"));
                    break;
                }
                if workdays.is_workday(day) {
                    let available = ledger.available_on(day, params.max_hours_per_day);
                    if available > SCHEDULING_EPSILON {
                        let allocated = remaining.min(available);
                        allocations.insert(day, allocated);
                        remaining -= allocated;
                    }
                }
                cursor = prev_day(day);
            }

            if let Some(reason) = failure {
                outcome.record_failure(task, reason);
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
