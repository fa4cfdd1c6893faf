//! Dependency graph validation and ordering.
//!
//! Edges point from a task to its prerequisites (`task depends_on prereq`).
//! The graph is kept acyclic at all times: every edge addition is validated
//! here before the write path persists it.

use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use taskdog_core::{Task, TaskError, TaskId};

/// Prerequisite edges over the full task set.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// task id -> prerequisite ids
    prereqs: BTreeMap<TaskId, BTreeSet<TaskId>>,
}

impl DependencyGraph {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let prereqs = tasks
            .iter()
            .map(|t| (t.id, t.depends_on.clone()))
            .collect();
        Self { prereqs }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.prereqs.contains_key(&id)
    }

    /// Validate adding `task_id depends_on prereq_id`.
    ///
    /// Fails on self-dependency, unknown ids, duplicate edges, and cycles.
    /// A cycle is reported with the full path, e.g. `3 → 1 → 2 → 3`.
    pub fn validate_add(&self, task_id: TaskId, prereq_id: TaskId) -> Result<(), TaskError> {
        if task_id == prereq_id {
            return Err(TaskError::Validation(format!(
                "Task {task_id} cannot depend on itself"
            )));
        }
        if !self.contains(task_id) {
            return Err(TaskError::NotFound(task_id));
        }
        if !self.contains(prereq_id) {
            return Err(TaskError::NotFound(prereq_id));
        }
        if self.prereqs[&task_id].contains(&prereq_id) {
            return Err(TaskError::Validation(format!(
                "Task {task_id} already depends on {prereq_id}"
            )));
        }
        if let Some(path) = self.path_through_prereqs(prereq_id, task_id) {
            let mut cycle = vec![task_id];
            cycle.extend(path);
            let rendered = cycle
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" → ");
            return Err(TaskError::Validation(format!(
                "Circular dependency detected: {rendered}"
            )));
        }
        Ok(())
    }

    /// Validate removing an existing edge.
    pub fn validate_remove(&self, task_id: TaskId, prereq_id: TaskId) -> Result<(), TaskError> {
        if !self.contains(task_id) {
            return Err(TaskError::NotFound(task_id));
        }
        if !self.contains(prereq_id) {
            return Err(TaskError::NotFound(prereq_id));
        }
        if !self.prereqs[&task_id].contains(&prereq_id) {
            return Err(TaskError::Validation(format!(
                "Task {task_id} does not depend on {prereq_id}"
            )));
        }
        Ok(())
    }

    /// Depth-first walk from `start` through transitive prerequisites,
    /// returning the path to `target` if one exists.
    fn path_through_prereqs(&self, start: TaskId, target: TaskId) -> Option<Vec<TaskId>> {
        fn visit(
            graph: &BTreeMap<TaskId, BTreeSet<TaskId>>,
            node: TaskId,
            target: TaskId,
            path: &mut Vec<TaskId>,
            seen: &mut BTreeSet<TaskId>,
        ) -> bool {
            path.push(node);
            if node == target {
                return true;
            }
            if seen.insert(node) {
                if let Some(next) = graph.get(&node) {
                    for &prereq in next {
                        if visit(graph, prereq, target, path, seen) {
                            return true;
                        }
                    }
                }
            }
            path.pop();
            false
        }

        let mut path = Vec::new();
        let mut seen = BTreeSet::new();
        visit(&self.prereqs, start, target, &mut path, &mut seen).then_some(path)
    }

    /// Kahn's algorithm: a linearization consistent with every edge, where
    /// each task comes after its prerequisites. Ties break by ascending id.
    pub fn topological_order(
        &self,
        subset: Option<&BTreeSet<TaskId>>,
    ) -> Result<Vec<TaskId>, TaskError> {
        let in_subset = |id: TaskId| subset.map_or(true, |s| s.contains(&id));

        let mut in_degree: BTreeMap<TaskId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for (&task, prereqs) in &self.prereqs {
            if !in_subset(task) {
                continue;
            }
            let degree = prereqs.iter().filter(|&&p| in_subset(p)).count();
            in_degree.insert(task, degree);
            for &prereq in prereqs {
                if in_subset(prereq) {
                    dependents.entry(prereq).or_default().push(task);
                }
            }
        }

        // Min-heap on id keeps ties deterministic
        let mut ready: BinaryHeap<std::cmp::Reverse<TaskId>> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| std::cmp::Reverse(id))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(std::cmp::Reverse(id)) = ready.pop() {
            order.push(id);
            if let Some(next) = dependents.get(&id) {
                for &dependent in next {
                    let degree = in_degree
                        .get_mut(&dependent)
                        .ok_or_else(|| TaskError::CorruptedData(format!(
                            "dependency on unknown task {dependent}"
                        )))?;
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(std::cmp::Reverse(dependent));
                    }
                }
            }
        }

        if order.len() != in_degree.len() {
            return Err(TaskError::CorruptedData(
                "dependency graph contains a cycle".into(),
            ));
        }
        Ok(order)
    }
}
