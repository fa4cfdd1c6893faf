//! End-to-end just-in-time scheduling through the orchestrator.

mod common;

use common::{date, dt, MemoryRepository};
use pretty_assertions::assert_eq;
use taskdog_core::{Task, TaskRepository};
use taskdog_optimizer::{OptimizeRequest, ScheduleOptimizer};

#[test]
fn packs_close_to_the_deadline() {
    let start = dt(2025, 10, 20, 9); // Monday
    let repo = MemoryRepository::new([Task::new(1, "JIT", start)
        .priority(100)
        .estimated_duration(12.0)
        .deadline(dt(2025, 10, 24, 18))]); // Friday

    let request = OptimizeRequest::new("backward", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert_eq!(output.scheduled.len(), 1);
    let task = &output.scheduled[0];
    assert_eq!(task.planned_start, Some(dt(2025, 10, 23, 9)));
    assert_eq!(task.planned_end, Some(dt(2025, 10, 24, 18)));
    assert_eq!(task.daily_allocations[&date(2025, 10, 23)], 6.0);
    assert_eq!(task.daily_allocations[&date(2025, 10, 24)], 6.0);
}

#[test]
fn single_day_task_lands_on_the_deadline() {
    let start = dt(2025, 10, 20, 9);
    let repo = MemoryRepository::new([Task::new(1, "JIT", start)
        .priority(100)
        .estimated_duration(6.0)
        .deadline(dt(2025, 10, 24, 18))]);

    let request = OptimizeRequest::new("backward", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    let task = &output.scheduled[0];
    assert_eq!(task.planned_start, Some(dt(2025, 10, 24, 9)));
    assert_eq!(task.planned_end, Some(dt(2025, 10, 24, 18)));
    assert_eq!(task.daily_allocations.len(), 1);
}

#[test]
fn two_deadlines_pack_independently() {
    let start = dt(2025, 10, 20, 9);
    let repo = MemoryRepository::new([
        Task::new(1, "Friday task", start)
            .priority(100)
            .estimated_duration(6.0)
            .deadline(dt(2025, 10, 24, 18)),
        Task::new(2, "Wednesday task", start)
            .priority(100)
            .estimated_duration(6.0)
            .deadline(dt(2025, 10, 22, 18)),
    ]);

    let request = OptimizeRequest::new("backward", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert_eq!(output.scheduled.len(), 2);
    let friday = output.scheduled.iter().find(|t| t.id == 1).unwrap();
    assert_eq!(friday.planned_start, Some(dt(2025, 10, 24, 9)));
    let wednesday = output.scheduled.iter().find(|t| t.id == 2).unwrap();
    assert_eq!(wednesday.planned_start, Some(dt(2025, 10, 22, 9)));
}

#[test]
fn deadline_before_start_is_a_per_task_failure() {
    let start = dt(2025, 10, 20, 9); // Monday
    let repo = MemoryRepository::new([Task::new(1, "Expired", start)
        .priority(100)
        .estimated_duration(6.0)
        .deadline(dt(2025, 10, 19, 18))]); // the Sunday before

    let request = OptimizeRequest::new("backward", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert!(output.scheduled.is_empty());
    assert_eq!(output.failed.len(), 1);
    assert!(output.failed[0].reason.contains("Deadline too close"));
    // Old state is untouched without force_override
    assert!(repo.get_by_id(1).unwrap().planned_start.is_none());
}

#[test]
fn deadline_over_a_weekend_uses_the_last_workday() {
    let start = dt(2025, 10, 20, 9);
    let repo = MemoryRepository::new([Task::new(1, "Weekend skip", start)
        .priority(100)
        .estimated_duration(6.0)
        .deadline(dt(2025, 10, 27, 18))]); // the Monday after

    let request = OptimizeRequest::new("backward", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    let task = &output.scheduled[0];
    assert_eq!(task.planned_start, Some(dt(2025, 10, 27, 9)));
    assert_eq!(task.daily_allocations.len(), 1);
    assert!(task.daily_allocations.contains_key(&date(2025, 10, 27)));
}
