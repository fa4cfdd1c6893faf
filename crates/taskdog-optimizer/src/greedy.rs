//! Greedy strategy: earliest-fit packing by (deadline, priority).

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use taskdog_core::Task;

use crate::ledger::WorkloadLedger;
use crate::strategy::{
    next_day, schedule_task, OptimizeParams, OptimizeStrategy, StrategyOutcome,
    MAX_SCHEDULING_WINDOW_DAYS, SCHEDULING_EPSILON,
};

/// *Earliest First*: sort by urgency, then advance a day cursor from the
/// start date, committing as many hours per workday as the cap allows.
#[derive(Debug)]
pub struct GreedyStrategy {
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl GreedyStrategy {
    pub fn new(day_start: NaiveTime, day_end: NaiveTime) -> Self {
        Self { day_start, day_end }
    }
}

impl OptimizeStrategy for GreedyStrategy {
    fn optimize(
        &self,
        tasks: &[Task],
        ledger: &mut WorkloadLedger,
        params: &OptimizeParams<'_>,
    ) -> StrategyOutcome {
        let workdays = params.workdays();
        let mut outcome = StrategyOutcome::default();

        // Deadline urgency first (missing deadline last), then priority,
        // then id for reproducibility.
        let mut order: Vec<&Task> = tasks.iter().collect();
        order.sort_by_key(|t| (t.deadline.is_none(), t.deadline, Reverse(t.priority), t.id));

        for task in order {
            let Some(estimate) = task.estimated_duration else {
                outcome.record_failure(task, "no estimated duration");
                continue;
            };
            let deadline_day = task.deadline.map(|d| d.date());
            let start_day = params.start_date.date();

            let mut remaining = estimate;
            let mut allocations: BTreeMap<NaiveDate, f64> = BTreeMap::new();
            let mut cursor = start_day;
            let mut failure: Option<String> = None;

            while remaining > SCHEDULING_EPSILON {
                if let Some(deadline) = deadline_day {
                    if cursor > deadline {
                        failure = Some(format!(
                            "Cannot meet deadline; {remaining:.1}h remaining"
                        ));
                        break;
                    }
                }
                if (cursor - start_day).num_days() > MAX_SCHEDULING_WINDOW_DAYS {
                    failure = Some("No capacity available".into());
                    break;
                }
                if workdays.is_workday(cursor) {
                    let available = ledger.available_on(cursor, params.max_hours_per_day);
                    if available > SCHEDULING_EPSILON {
                        let allocated = remaining.min(available);
                        allocations.insert(cursor, allocated);
                        remaining -= allocated;
                    }
                }
                cursor = next_day(cursor);
            }

            if let Some(reason) = failure {
                // Nothing was committed to the ledger, so a failed task
                // leaves no phantom reservation.
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
