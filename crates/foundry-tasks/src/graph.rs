//! Dependency scheduling
//!
//! Kahn's algorithm arranges builder tasks into levels: every task's
//! dependencies live in strictly earlier levels, and tasks within one level
//! are free to run concurrently. Dependencies naming unknown tasks are
//! ignored (in-degree adjusted). Whatever survives topological extraction is
//! a cycle: reported, then appended as a final best-effort level rather than
//! silently starved.

use crate::model::SubagentTask;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// A level-ordered schedule.
#[derive(Debug, Clone)]
pub struct LevelSchedule {
    /// Tasks grouped by level, dependency-safe to run level by level
    pub levels: Vec<Vec<SubagentTask>>,
    /// Ids of tasks that participate in a dependency cycle
    pub cycle: Vec<String>,
}

impl LevelSchedule {
    /// Level index of a task id, if scheduled.
    #[must_use]
    pub fn level_of(&self, task_id: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|t| t.id == task_id))
    }

    /// Total number of scheduled tasks across all levels.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Arrange tasks into dependency levels.
///
/// Ties within a level preserve the input (insertion) order. Tasks left
/// after extraction form a cycle and are appended as one final level, with a
/// warning.
#[must_use]
pub fn topological_levels(tasks: &[SubagentTask]) -> LevelSchedule {
    let known_ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();

    // In-degrees over known dependencies only
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for task in tasks {
        let degree = task
            .dependencies
            .iter()
            .filter(|dep| {
                let known = known_ids.contains(dep.as_str());
                if !known {
                    warn!(task = %task.id, dependency = %dep, "ignoring dependency on unknown task");
                }
                known
            })
            .count();
        in_degree.insert(task.id.as_str(), degree);
    }

    let mut remaining: Vec<&SubagentTask> = tasks.iter().collect();
    let mut levels: Vec<Vec<SubagentTask>> = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();

    loop {
        // Tasks whose remaining in-degree is zero, in insertion order
        let ready: Vec<&SubagentTask> = remaining
            .iter()
            .copied()
            .filter(|t| in_degree[t.id.as_str()] == 0)
            .collect();

        if ready.is_empty() {
            break;
        }

        for task in &ready {
            placed.insert(task.id.clone());
        }
        remaining.retain(|t| !placed.contains(&t.id));

        for task in &remaining {
            let satisfied = task
                .dependencies
                .iter()
                .filter(|dep| ready.iter().any(|r| r.id == **dep))
                .count();
            if satisfied > 0 {
                *in_degree.get_mut(task.id.as_str()).expect("task in map") -= satisfied;
            }
        }

        levels.push(ready.into_iter().cloned().collect());
    }

    let cycle: Vec<String> = remaining.iter().map(|t| t.id.clone()).collect();
    if !cycle.is_empty() {
        warn!(tasks = ?cycle, "dependency cycle detected; appending as final level");
        levels.push(remaining.into_iter().cloned().collect());
    }

    LevelSchedule { levels, cycle }
}

/// Worker count for a task set.
///
/// Without an override: fewer than 10 tasks → 2 workers, fewer than 20 → 4,
/// fewer than 40 → 6, otherwise 8. Never more than the task count. An
/// explicit override caps the count but never raises it beyond the task
/// count.
#[must_use]
pub fn auto_scale_workers(task_count: usize, max_parallel_override: Option<usize>) -> usize {
    if task_count == 0 {
        return 0;
    }
    let auto = match task_count {
        n if n < 10 => 2,
        n if n < 20 => 4,
        n if n < 40 => 6,
        _ => 8,
    };
    let chosen = max_parallel_override.map_or(auto, |cap| cap.min(auto).max(1));
    chosen.min(task_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubagentTaskType;
    use proptest::prelude::*;

    fn task(id: &str, deps: &[&str]) -> SubagentTask {
        SubagentTask::new(id, SubagentTaskType::Builder, format!("do {id}"))
            .with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_diamond_produces_expected_levels() {
        // A, B(dep A), C(dep A), D(dep B, C) → [[A], [B, C], [D]]
        let tasks = vec![
            task("A", &[]),
            task("B", &["A"]),
            task("C", &["A"]),
            task("D", &["B", "C"]),
        ];
        let schedule = topological_levels(&tasks);
        assert!(schedule.cycle.is_empty());
        let ids: Vec<Vec<&str>> = schedule
            .levels
            .iter()
            .map(|l| l.iter().map(|t| t.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
    }

    #[test]
    fn test_insertion_order_breaks_ties() {
        let tasks = vec![task("z", &[]), task("a", &[]), task("m", &[])];
        let schedule = topological_levels(&tasks);
        let ids: Vec<&str> = schedule.levels[0].iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_unknown_dependency_ignored() {
        let tasks = vec![task("A", &["ghost"]), task("B", &["A"])];
        let schedule = topological_levels(&tasks);
        assert!(schedule.cycle.is_empty());
        assert_eq!(schedule.levels.len(), 2);
        assert_eq!(schedule.levels[0][0].id, "A");
    }

    #[test]
    fn test_cycle_reported_and_appended() {
        let tasks = vec![task("A", &["B"]), task("B", &["A"]), task("C", &[])];
        let schedule = topological_levels(&tasks);
        assert_eq!(schedule.cycle, vec!["A".to_string(), "B".to_string()]);
        // C schedules normally; the cycle rides in the final level
        assert_eq!(schedule.levels.len(), 2);
        assert_eq!(schedule.levels[0][0].id, "C");
        assert_eq!(schedule.levels[1].len(), 2);
        assert_eq!(schedule.task_count(), 3);
    }

    #[test]
    fn test_dependency_always_in_earlier_level() {
        let tasks = vec![
            task("t1", &[]),
            task("t2", &["t1"]),
            task("t3", &["t1"]),
            task("t4", &["t2"]),
            task("t5", &["t2", "t3"]),
        ];
        let schedule = topological_levels(&tasks);
        for task in &tasks {
            for dep in &task.dependencies {
                let dep_level = schedule.level_of(dep).unwrap();
                let task_level = schedule.level_of(&task.id).unwrap();
                assert!(dep_level < task_level, "{dep} not before {}", task.id);
            }
        }
    }

    #[test]
    fn test_auto_scale_tiers() {
        assert_eq!(auto_scale_workers(0, None), 0);
        assert_eq!(auto_scale_workers(1, None), 1);
        assert_eq!(auto_scale_workers(5, None), 2);
        assert_eq!(auto_scale_workers(15, None), 4);
        assert_eq!(auto_scale_workers(25, None), 6);
        assert_eq!(auto_scale_workers(50, None), 8);
    }

    #[test]
    fn test_override_caps_but_never_raises_beyond_count() {
        assert_eq!(auto_scale_workers(50, Some(3)), 3);
        assert_eq!(auto_scale_workers(2, Some(16)), 2);
        assert_eq!(auto_scale_workers(2, Some(2)), 2);
    }

    proptest! {
        /// Workers(n) is non-decreasing in n and bounded by min(n, cap).
        #[test]
        fn prop_auto_scale_monotonic(n in 1usize..100, cap in 1usize..20) {
            let w_n = auto_scale_workers(n, Some(cap));
            let w_n1 = auto_scale_workers(n + 1, Some(cap));
            prop_assert!(w_n1 >= w_n);
            prop_assert!(w_n <= n.min(cap));
        }

        /// Every task appears in exactly one level.
        #[test]
        fn prop_levels_partition_tasks(count in 1usize..20) {
            let tasks: Vec<SubagentTask> = (0..count)
                .map(|i| {
                    let deps: Vec<String> = if i > 0 { vec![format!("t{}", i - 1)] } else { vec![] };
                    task(&format!("t{i}"), &deps.iter().map(String::as_str).collect::<Vec<_>>())
                })
                .collect();
            let schedule = topological_levels(&tasks);
            prop_assert_eq!(schedule.task_count(), count);
            prop_assert!(schedule.cycle.is_empty());
        }
    }
}
