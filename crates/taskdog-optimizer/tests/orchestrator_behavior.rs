//! Orchestrator coordination: target selection, context seeding, orphan
//! clearing, parent-period propagation and determinism.

mod common;

use std::collections::BTreeMap;

use common::{date, dt, MemoryRepository};
use pretty_assertions::assert_eq;
use taskdog_core::{Task, TaskError, TaskRepository};
use taskdog_optimizer::{OptimizeRequest, ScheduleOptimizer};

#[test]
fn unknown_explicit_target_is_not_found() {
    let start = dt(2025, 1, 6, 9);
    let repo = MemoryRepository::new([Task::new(1, "Task", start).estimated_duration(2.0)]);

    let request = OptimizeRequest::new("greedy", start).tasks(vec![1, 99]);
    let err = ScheduleOptimizer::new(&repo).run(&request).unwrap_err();
    assert_eq!(err, TaskError::NotFound(99));

    let request = OptimizeRequest::new("greedy", start).tasks(vec![98, 99]);
    let err = ScheduleOptimizer::new(&repo).run(&request).unwrap_err();
    assert_eq!(err, TaskError::NotFoundMany(vec![98, 99]));
}

#[test]
fn explicit_targets_with_nothing_schedulable_is_an_error() {
    let start = dt(2025, 1, 6, 9);
    let mut finished = Task::new(1, "Done", start).estimated_duration(2.0);
    finished.complete(start).unwrap();
    let no_estimate = Task::new(2, "No estimate", start);
    let repo = MemoryRepository::new([finished, no_estimate]);

    let request = OptimizeRequest::new("greedy", start).tasks(vec![1, 2]);
    let err = ScheduleOptimizer::new(&repo).run(&request).unwrap_err();

    match err {
        TaskError::NoSchedulableTasks { task_ids, reasons } => {
            assert_eq!(task_ids, vec![1, 2]);
            assert!(reasons[&1].contains("COMPLETED"));
            assert!(reasons[&2].contains("no estimated duration"));
        }
        other => panic!("expected NoSchedulableTasks, got {other:?}"),
    }
}

#[test]
fn implicit_selection_tolerates_unschedulable_tasks() {
    let start = dt(2025, 1, 6, 9);
    let schedulable = Task::new(1, "Ok", start).priority(100).estimated_duration(4.0);
    let no_estimate = Task::new(2, "Skipped", start);
    let repo = MemoryRepository::new([schedulable, no_estimate]);

    let request = OptimizeRequest::new("greedy", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert_eq!(output.scheduled.len(), 1);
    assert_eq!(output.scheduled[0].id, 1);
    assert!(output.failed.is_empty(), "filtered tasks are not failures");
}

#[test]
fn unknown_algorithm_is_rejected() {
    let start = dt(2025, 1, 6, 9);
    let repo = MemoryRepository::new([Task::new(1, "Task", start).estimated_duration(2.0)]);

    let request = OptimizeRequest::new("simulated_annealing", start);
    let err = ScheduleOptimizer::new(&repo).run(&request).unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
}

#[test]
fn partial_reschedule_packs_around_other_tasks() {
    let start = dt(2025, 1, 6, 9);
    // Task 1 owns Monday with an explicit allocation map
    let mut booked = Task::new(1, "Booked", start)
        .priority(100)
        .estimated_duration(6.0)
        .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18));
    let mut monday = BTreeMap::new();
    monday.insert(date(2025, 1, 6), 6.0);
    booked.set_daily_allocations(monday).unwrap();
    let target = Task::new(2, "Target", start)
        .priority(100)
        .estimated_duration(4.0);
    let repo = MemoryRepository::new([booked.clone(), target]);

    let request = OptimizeRequest::new("greedy", start)
        .max_hours_per_day(6.0)
        .tasks(vec![2]);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    // Task 2 lands on Tuesday; task 1 is untouched
    assert_eq!(output.scheduled.len(), 1);
    assert_eq!(
        output.scheduled[0].planned_start,
        Some(dt(2025, 1, 7, 9))
    );
    assert_eq!(repo.get_by_id(1).unwrap(), booked);
}

#[test]
fn force_override_reseeds_from_fixed_and_in_progress_only() {
    let start = dt(2025, 1, 6, 9);
    // A pending task with a stale Monday schedule: under force it is
    // rescheduled from scratch and its old hours do not constrain anyone.
    let stale = Task::new(1, "Stale", start)
        .priority(100)
        .estimated_duration(4.0)
        .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18));
    let fixed = Task::new(2, "Fixed", start)
        .priority(100)
        .estimated_duration(3.0)
        .planned(dt(2025, 1, 6, 9), dt(2025, 1, 6, 18))
        .fixed();
    let repo = MemoryRepository::new([stale, fixed.clone()]);

    let request = OptimizeRequest::new("greedy", start)
        .max_hours_per_day(6.0)
        .force_override(true);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    // The fixed task's seeded 3h held Monday, so the stale task got the
    // remaining 3h there and spilled 1h to Tuesday. Its own stale hours
    // constrained nothing.
    let rescheduled: Vec<_> = output.scheduled.iter().filter(|t| t.id == 1).collect();
    assert_eq!(rescheduled.len(), 1);
    assert_eq!(rescheduled[0].daily_allocations[&date(2025, 1, 6)], 3.0);
    assert_eq!(rescheduled[0].daily_allocations[&date(2025, 1, 7)], 1.0);
}

#[test]
fn fixed_tasks_are_untouched_without_force() {
    let start = dt(2025, 1, 6, 9);
    let fixed = Task::new(1, "Fixed", start)
        .priority(100)
        .estimated_duration(3.0)
        .planned(dt(2025, 1, 8, 9), dt(2025, 1, 8, 18))
        .fixed();
    let other = Task::new(2, "Other", start)
        .priority(100)
        .estimated_duration(4.0);
    let repo = MemoryRepository::new([fixed.clone(), other]);

    let request = OptimizeRequest::new("greedy", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert!(output.scheduled.iter().all(|t| t.id != 1));
    assert_eq!(repo.get_by_id(1).unwrap(), fixed, "field-equal after the run");
}

#[test]
fn force_override_clears_orphan_schedules() {
    let start = dt(2025, 1, 6, 9);
    // Stale schedule plus a deadline that passed before the start date:
    // under force the task fails to reschedule and loses its old window.
    let mut orphan = Task::new(1, "Orphan", start)
        .priority(100)
        .estimated_duration(4.0)
        .deadline(dt(2025, 1, 3, 18))
        .planned(dt(2025, 1, 2, 9), dt(2025, 1, 3, 18));
    let mut alloc = BTreeMap::new();
    alloc.insert(date(2025, 1, 2), 2.0);
    alloc.insert(date(2025, 1, 3), 2.0);
    orphan.set_daily_allocations(alloc).unwrap();
    let repo = MemoryRepository::new([orphan]);

    let request = OptimizeRequest::new("greedy", start)
        .max_hours_per_day(6.0)
        .force_override(true);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert_eq!(output.failed.len(), 1);
    let cleared = repo.get_by_id(1).unwrap();
    assert!(cleared.planned_start.is_none());
    assert!(cleared.planned_end.is_none());
    assert!(cleared.daily_allocations.is_empty());
}

#[test]
fn without_force_failed_tasks_keep_their_old_schedules() {
    let start = dt(2025, 1, 6, 9);
    let mut stale = Task::new(1, "Keeps schedule", start)
        .priority(100)
        .estimated_duration(4.0)
        .deadline(dt(2025, 1, 3, 18))
        .planned(dt(2025, 1, 2, 9), dt(2025, 1, 3, 18));
    let mut alloc = BTreeMap::new();
    alloc.insert(date(2025, 1, 2), 4.0);
    stale.set_daily_allocations(alloc).unwrap();
    let repo = MemoryRepository::new([stale.clone()]);

    let request = OptimizeRequest::new("greedy", start).max_hours_per_day(6.0);
    let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert_eq!(output.failed.len(), 1);
    assert_eq!(repo.get_by_id(1).unwrap(), stale);
}

#[test]
fn parent_period_spans_scheduled_children() {
    let start = dt(2025, 1, 6, 9);
    let parent = Task::new(1, "Parent", start);
    let child_a = Task::new(2, "Child A", start)
        .priority(100)
        .estimated_duration(6.0)
        .parent(1);
    let child_b = Task::new(3, "Child B", start)
        .priority(100)
        .estimated_duration(6.0)
        .parent(1);
    let repo = MemoryRepository::new([parent, child_a, child_b]);

    let request = OptimizeRequest::new("greedy", start).max_hours_per_day(6.0);
    ScheduleOptimizer::new(&repo).run(&request).unwrap();

    let parent = repo.get_by_id(1).unwrap();
    assert_eq!(parent.planned_start, Some(dt(2025, 1, 6, 9)));
    assert_eq!(parent.planned_end, Some(dt(2025, 1, 7, 18)));
}

#[test]
fn propagation_recurses_to_grandparents() {
    let start = dt(2025, 1, 6, 9);
    let grandparent = Task::new(1, "Grandparent", start);
    let parent = Task::new(2, "Parent", start).parent(1);
    let child = Task::new(3, "Child", start)
        .priority(100)
        .estimated_duration(4.0)
        .parent(2);
    let repo = MemoryRepository::new([grandparent, parent, child]);

    let request = OptimizeRequest::new("greedy", start).max_hours_per_day(6.0);
    ScheduleOptimizer::new(&repo).run(&request).unwrap();

    let parent = repo.get_by_id(2).unwrap();
    assert_eq!(parent.planned_start, Some(dt(2025, 1, 6, 9)));
    let grandparent = repo.get_by_id(1).unwrap();
    assert_eq!(grandparent.planned_start, Some(dt(2025, 1, 6, 9)));
    assert_eq!(grandparent.planned_end, Some(dt(2025, 1, 6, 18)));
}

#[test]
fn archived_parents_are_not_touched() {
    let start = dt(2025, 1, 6, 9);
    let mut parent = Task::new(1, "Archived parent", start);
    parent.archive(start).unwrap();
    let child = Task::new(2, "Child", start)
        .priority(100)
        .estimated_duration(4.0)
        .parent(1);
    let repo = MemoryRepository::new([parent.clone(), child]);

    let request = OptimizeRequest::new("greedy", start).max_hours_per_day(6.0);
    ScheduleOptimizer::new(&repo).run(&request).unwrap();

    assert_eq!(repo.get_by_id(1).unwrap(), parent);
}

#[test]
fn forced_optimize_twice_is_deterministic() {
    let start = dt(2025, 1, 6, 9);
    let tasks = [
        Task::new(1, "A", start)
            .priority(120)
            .estimated_duration(7.0)
            .deadline(dt(2025, 1, 10, 18)),
        Task::new(2, "B", start).priority(80).estimated_duration(5.0),
        Task::new(3, "C", start)
            .priority(80)
            .estimated_duration(3.0)
            .deadline(dt(2025, 1, 8, 18)),
    ];

    for algorithm in ["greedy", "balanced", "backward", "round_robin"] {
        let repo = MemoryRepository::new(tasks.clone());
        let request = OptimizeRequest::new(algorithm, start)
            .max_hours_per_day(6.0)
            .force_override(true);

        let first = ScheduleOptimizer::new(&repo).run(&request).unwrap();
        let second = ScheduleOptimizer::new(&repo).run(&request).unwrap();

        assert_eq!(
            first.scheduled, second.scheduled,
            "{algorithm} must be deterministic"
        );
        assert_eq!(first.daily_allocations, second.daily_allocations);
    }
}

#[test]
fn scheduled_deadlines_are_always_honored() {
    let start = dt(2025, 1, 6, 9);
    let tasks = [
        Task::new(1, "A", start)
            .priority(100)
            .estimated_duration(10.0)
            .deadline(dt(2025, 1, 9, 18)),
        Task::new(2, "B", start)
            .priority(50)
            .estimated_duration(8.0)
            .deadline(dt(2025, 1, 10, 18)),
        Task::new(3, "C", start).priority(10).estimated_duration(6.0),
    ];

    for algorithm in ["greedy", "balanced", "backward", "round_robin"] {
        let repo = MemoryRepository::new(tasks.clone());
        let request = OptimizeRequest::new(algorithm, start).max_hours_per_day(6.0);
        let output = ScheduleOptimizer::new(&repo).run(&request).unwrap();

        for task in &output.scheduled {
            if let (Some(end), Some(deadline)) = (task.planned_end, task.deadline) {
                assert!(
                    end <= deadline,
                    "{algorithm} scheduled task {} past its deadline",
                    task.id
                );
            }
        }
    }
}
