//! Optimization through the service: persistence, events and queries
//! working together.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use taskdog_core::{ChangeEvent, ClientContext, EventKind, Subscriber, TaskError};
use taskdog_optimizer::OptimizeRequest;
use taskdog_service::{
    CreateTaskInput, FixedClock, InMemoryNotesStore, InMemoryTaskRepository, StatisticsPeriod,
    TaskFilter, TaskService,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
}

fn service() -> TaskService {
    TaskService::new(
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(InMemoryNotesStore::new()),
        Arc::new(FixedClock::new(dt(2025, 1, 6, 9))),
    )
}

struct Recorder {
    events: Mutex<Vec<ChangeEvent>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Subscriber for Recorder {
    fn deliver(&self, event: &ChangeEvent) -> Result<(), TaskError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn create(service: &TaskService, name: &str, hours: f64) -> taskdog_core::Task {
    let mut input = CreateTaskInput::new(name);
    input.priority = Some(100);
    input.estimated_duration = Some(hours);
    service
        .create_task(input, &ClientContext::anonymous())
        .unwrap()
}

#[test]
fn optimize_persists_and_broadcasts_the_outcome() {
    let service = service();
    let observer = Recorder::new();
    service.subscribe("observer", observer.clone());

    create(&service, "A", 4.0);
    create(&service, "B", 3.0);

    let request = OptimizeRequest::new("greedy", dt(2025, 1, 6, 9)).max_hours_per_day(6.0);
    let output = service
        .optimize(&request, &ClientContext::new("cli"))
        .unwrap();

    assert_eq!(output.summary.scheduled_count, 2);
    assert!(service.get_task(1).unwrap().planned_start.is_some());

    let last = observer.received().pop().unwrap();
    match last.kind {
        EventKind::ScheduleOptimized {
            scheduled_count,
            failed_count,
            ref algorithm,
        } => {
            assert_eq!(scheduled_count, 2);
            assert_eq!(failed_count, 0);
            assert_eq!(algorithm, "greedy");
        }
        ref other => panic!("expected schedule_optimized, got {other:?}"),
    }
    assert_eq!(last.source_client_id.as_deref(), Some("cli"));
}

#[test]
fn optimize_with_unknown_algorithm_leaves_state_untouched() {
    let service = service();
    create(&service, "A", 4.0);

    let request = OptimizeRequest::new("genetic", dt(2025, 1, 6, 9));
    assert!(service
        .optimize(&request, &ClientContext::anonymous())
        .is_err());
    assert!(service.get_task(1).unwrap().planned_start.is_none());
}

#[test]
fn overloaded_week_reports_failures_without_overbooking() {
    // 11h of deadlined work against two 5h days
    let service = service();
    let deadline = dt(2025, 10, 17, 18);
    for (name, hours) in [("T7", 3.0), ("T10", 1.0), ("T11", 1.0), ("T17", 3.0), ("T22", 1.0), ("T26", 2.0)] {
        let mut input = CreateTaskInput::new(name);
        input.priority = Some(100);
        input.estimated_duration = Some(hours);
        input.deadline = Some(deadline);
        service
            .create_task(input, &ClientContext::anonymous())
            .unwrap();
    }

    let request = OptimizeRequest::new("greedy", dt(2025, 10, 16, 9)).max_hours_per_day(5.0);
    let output = service
        .optimize(&request, &ClientContext::anonymous())
        .unwrap();

    assert!(!output.failed.is_empty());
    for hours in output.daily_allocations.values() {
        assert!(*hours <= 5.0 + 1e-6);
    }
    let failed_estimate: f64 = output
        .failed
        .iter()
        .map(|f| {
            service
                .get_task(f.task_id)
                .unwrap()
                .estimated_duration
                .unwrap_or(0.0)
        })
        .sum();
    assert!(failed_estimate >= 1.0);
}

#[test]
fn gantt_reflects_the_optimized_plan() {
    let service = service();
    create(&service, "A", 4.0);

    let request = OptimizeRequest::new("greedy", dt(2025, 1, 6, 9)).max_hours_per_day(6.0);
    service
        .optimize(&request, &ClientContext::anonymous())
        .unwrap();

    let gantt = service
        .gantt_data(date(2025, 1, 6), date(2025, 1, 10))
        .unwrap();
    assert_eq!(gantt.rows.len(), 1);
    assert_eq!(gantt.rows[0].daily_hours[&date(2025, 1, 6)], 4.0);
    assert_eq!(gantt.total_estimated_hours, 4.0);
}

#[test]
fn list_and_statistics_see_repository_state() {
    let service = service();
    let source = ClientContext::anonymous();
    let a = create(&service, "A", 4.0);
    create(&service, "B", 2.0);
    service.start_task(a.id, &source).unwrap();

    let listed = service.list_tasks(&TaskFilter::default()).unwrap();
    assert_eq!(listed.len(), 2);

    let report = service.calculate_statistics(StatisticsPeriod::All).unwrap();
    assert_eq!(report.counts.total, 2);
    assert_eq!(report.counts.in_progress, 1);
    assert_eq!(report.counts.pending, 1);
}

#[test]
fn forced_reoptimize_is_reproducible_through_the_service() {
    let service = service();
    create(&service, "A", 7.0);
    create(&service, "B", 5.0);

    let request = OptimizeRequest::new("round_robin", dt(2025, 1, 6, 9))
        .max_hours_per_day(6.0)
        .force_override(true);

    let first = service
        .optimize(&request, &ClientContext::anonymous())
        .unwrap();
    let second = service
        .optimize(&request, &ClientContext::anonymous())
        .unwrap();

    assert_eq!(first.scheduled, second.scheduled);
    assert_eq!(first.daily_allocations, second.daily_allocations);
}
