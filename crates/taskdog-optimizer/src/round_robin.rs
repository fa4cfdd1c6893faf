//! Round-robin strategy: rotate daily capacity among all active tasks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveTime};
use taskdog_core::{Task, TaskId};

use crate::ledger::WorkloadLedger;
use crate::strategy::{
    next_day, schedule_task, OptimizeParams, OptimizeStrategy, StrategyOutcome,
    ROUND_ROBIN_MAX_ITERATIONS, SCHEDULING_EPSILON,
};

/// *Round Robin*: each workday, split the day's free capacity equally among
/// every task that still has remaining hours and has not passed its
/// deadline. Ideal for parallel progress on several projects at once.
///
/// The iteration cap only bounds pathological input (every deadline before
/// the start date); it is not a correctness parameter.
#[derive(Debug)]
pub struct RoundRobinStrategy {
    day_start: NaiveTime,
    day_end: NaiveTime,
}

impl RoundRobinStrategy {
    pub fn new(day_start: NaiveTime, day_end: NaiveTime) -> Self {
        Self { day_start, day_end }
    }
}

impl OptimizeStrategy for RoundRobinStrategy {
    fn optimize(
        &self,
        tasks: &[Task],
        ledger: &mut WorkloadLedger,
        params: &OptimizeParams<'_>,
    ) -> StrategyOutcome {
        let workdays = params.workdays();
        let mut outcome = StrategyOutcome::default();
        if tasks.is_empty() {
            return outcome;
        }

        let task_map: BTreeMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
        let mut remaining: BTreeMap<TaskId, f64> = tasks
            .iter()
            .map(|t| (t.id, t.estimated_duration.unwrap_or(0.0)))
            .collect();
        let deadlines: BTreeMap<TaskId, Option<NaiveDate>> = tasks
            .iter()
            .map(|t| (t.id, t.deadline.map(|d| d.date())))
            .collect();

        let mut per_task: BTreeMap<TaskId, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        let mut first_day: BTreeMap<TaskId, NaiveDate> = BTreeMap::new();
        let mut last_day: BTreeMap<TaskId, NaiveDate> = BTreeMap::new();

        let mut cursor = params.start_date.date();
        let mut iteration = 0usize;

        while remaining.values().any(|&h| h > SCHEDULING_EPSILON) {
            iteration += 1;
            if iteration > ROUND_ROBIN_MAX_ITERATIONS {
                break;
            }
            if !workdays.is_workday(cursor) {
                cursor = next_day(cursor);
                continue;
            }

            let available = ledger.available_on(cursor, params.max_hours_per_day);
            if available <= SCHEDULING_EPSILON {
                cursor = next_day(cursor);
                continue;
            }

            // Ascending id keeps the rotation deterministic.
            let active: Vec<TaskId> = remaining
                .iter()
                .filter(|&(id, &hours)| {
                    hours > SCHEDULING_EPSILON
                        && deadlines[id].map_or(true, |deadline| cursor <= deadline)
                })
                .map(|(&id, _)| id)
                .collect();

            if active.is_empty() {
                if remaining.values().any(|&h| h > SCHEDULING_EPSILON) {
                    // Everything left has passed its deadline; keep walking
                    // until the iteration cap calls it off.
                    cursor = next_day(cursor);
                    continue;
                }
                break;
            }

            let share = available / active.len() as f64;
            let mut day_total = 0.0;
            for id in active {
                let Some(hours_left) = remaining.get_mut(&id) else {
                    continue;
                };
                let give = share.min(*hours_left);
                if give <= SCHEDULING_EPSILON {
                    continue;
                }
                *hours_left -= give;
                *per_task
                    .entry(id)
                    .or_default()
                    .entry(cursor)
                    .or_insert(0.0) += give;
                day_total += give;
                first_day.entry(id).or_insert(cursor);
                last_day.insert(id, cursor);
            }
            ledger.reserve(cursor, day_total);
            cursor = next_day(cursor);
        }

        // Split the field into fully scheduled and failed, releasing the
        // partial reservations of failures so they leave no phantom hours.
        let mut fully_scheduled: BTreeSet<TaskId> = BTreeSet::new();
        for (&id, &hours_left) in &remaining {
            let task = task_map[&id];
            if hours_left > SCHEDULING_EPSILON {
                if first_day.contains_key(&id) {
                    outcome.record_failure(
                        task,
                        format!(
                            "Could not complete scheduling before deadline ({hours_left:.1}h remaining)"
                        ),
                    );
                } else {
                    outcome.record_failure(task, "Deadline too close or no time available");
                }
                if let Some(partial) = per_task.get(&id) {
                    for (&date, &hours) in partial {
                        ledger.release(date, hours);
                    }
                }
            } else {
                fully_scheduled.insert(id);
            }
        }

        for id in fully_scheduled {
            let task = task_map[&id];
            let allocations = per_task.remove(&id).unwrap_or_default();
            let (Some(&first), Some(&last)) = (first_day.get(&id), last_day.get(&id)) else {
                outcome.record_failure(task, "Deadline too close or no time available");
                continue;
            };
            for (&date, &hours) in &allocations {
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
