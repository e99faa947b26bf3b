use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::model::task::Task;

/// Order one sibling level so that every task ranks at or after the tasks it
/// depends on.
///
/// Ties are broken by original input index, which keeps the result
/// deterministic and close to author intent. Dependency ids that do not name
/// a task at this level (unresolved references, and self-references) impose
/// no constraint. If a dependency cycle leaves tasks unplaceable, the
/// remainder is appended in its original relative order instead of failing.
///
/// With `enabled = false` the input order is returned unchanged.
pub fn order_tasks(tasks: &[Arc<Task>], enabled: bool) -> Vec<Arc<Task>> {
    if !enabled || tasks.len() <= 1 {
        return tasks.to_vec();
    }

    let index_of: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| (task.id.as_str(), i))
        .collect();

    // Edge dep -> task for every dependency resolvable at this level.
    let mut in_degree = vec![0usize; tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        for dep in &task.dependencies {
            match index_of.get(dep.as_str()) {
                Some(&d) if d != i => {
                    dependents[d].push(i);
                    in_degree[i] += 1;
                }
                _ => {}
            }
        }
    }

    // Kahn's algorithm; the heap pops the lowest original index first.
    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    let mut placed = vec![false; tasks.len()];
    while let Some(Reverse(i)) = ready.pop() {
        placed[i] = true;
        order.push(Arc::clone(&tasks[i]));
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() < tasks.len() {
        debug!(
            unplaced = tasks.len() - order.len(),
            "dependency cycle at this level; appending remainder in input order"
        );
        for (i, task) in tasks.iter().enumerate() {
            if !placed[i] {
                order.push(Arc::clone(task));
            }
        }
    }

    order
}

/// Apply the ordering pass recursively: each parent's child list is ordered
/// independently, so children are never reordered relative to another
/// parent's children.
pub fn order_tree(tasks: &[Arc<Task>], enabled: bool) -> Vec<Arc<Task>> {
    if !enabled {
        return tasks.to_vec();
    }
    order_tasks(tasks, enabled)
        .into_iter()
        .map(|task| {
            if task.is_leaf() {
                return task;
            }
            let children = order_tree(&task.children, enabled);
            let unchanged = children
                .iter()
                .zip(task.children.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b));
            if unchanged {
                task
            } else {
                let mut node = (*task).clone();
                node.children = children;
                Arc::new(node)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Task;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn dt(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn task(id: &str, deps: &[&str]) -> Arc<Task> {
        let mut t = Task::new(id, id.to_uppercase(), dt(8), Duration::hours(1)).unwrap();
        t.dependencies = deps.iter().map(|d| d.to_string()).collect();
        Arc::new(t)
    }

    fn ids(tasks: &[Arc<Task>]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn chain_supplied_backwards_is_straightened() {
        let input = vec![task("c", &["b"]), task("a", &[]), task("b", &["a"])];
        assert_eq!(ids(&order_tasks(&input, true)), vec!["a", "b", "c"]);
    }

    #[test]
    fn diamond_respects_both_arms() {
        let input = vec![
            task("d", &["b", "c"]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("a", &[]),
        ];
        let out = order_tasks(&input, true);
        let ordered = ids(&out);
        let rank = |id: &str| ordered.iter().position(|t| *t == id).unwrap();
        assert!(rank("a") < rank("b"));
        assert!(rank("a") < rank("c"));
        assert!(rank("b") < rank("d"));
        assert!(rank("c") < rank("d"));
        // Tie between b and c broken by input index.
        assert!(rank("b") < rank("c"));
    }

    #[test]
    fn disabled_is_identity() {
        let input = vec![task("c", &["b"]), task("a", &[]), task("b", &["a"])];
        let out = order_tasks(&input, false);
        assert_eq!(ids(&out), vec!["c", "a", "b"]);
        for (a, b) in out.iter().zip(input.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn ordering_is_idempotent() {
        let input = vec![
            task("d", &["b", "c"]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("a", &[]),
        ];
        let once = order_tasks(&input, true);
        let twice = order_tasks(&once, true);
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn independent_tasks_keep_input_order() {
        let input = vec![task("x", &[]), task("y", &[]), task("z", &[])];
        assert_eq!(ids(&order_tasks(&input, true)), vec!["x", "y", "z"]);
    }

    #[test]
    fn unresolved_dependency_is_no_constraint() {
        let input = vec![task("b", &["ghost"]), task("a", &[])];
        assert_eq!(ids(&order_tasks(&input, true)), vec!["b", "a"]);
    }

    #[test]
    fn self_dependency_is_ignored() {
        let input = vec![task("a", &["a"]), task("b", &["a"])];
        assert_eq!(ids(&order_tasks(&input, true)), vec!["a", "b"]);
    }

    #[test]
    fn cycle_degrades_to_input_order() {
        let input = vec![task("a", &["b"]), task("b", &["a"]), task("c", &[])];
        // c is placeable; the a/b cycle keeps its original relative order.
        assert_eq!(ids(&order_tasks(&input, true)), vec!["c", "a", "b"]);
    }

    #[test]
    fn order_tree_sorts_each_child_list_independently() {
        let c1 = Task::new("c1", "C1", dt(8), Duration::hours(1)).unwrap();
        let mut c2 = Task::new("c2", "C2", dt(9), Duration::hours(1)).unwrap();
        c2.dependencies = vec!["c1".to_string()];
        let p = Task::with_children("p", "P", dt(8), vec![c2, c1]).unwrap();

        let mut q1 = Task::new("q1", "Q1", dt(8), Duration::hours(1)).unwrap();
        // Depends on a task in a different parent: no constraint at q's level.
        q1.dependencies = vec!["c2".to_string()];
        let q2 = Task::new("q2", "Q2", dt(9), Duration::hours(1)).unwrap();
        let q = Task::with_children("q", "Q", dt(8), vec![q1, q2]).unwrap();

        let tree = vec![Arc::new(p), Arc::new(q)];
        let ordered = order_tree(&tree, true);
        assert_eq!(ids(&ordered), vec!["p", "q"]);
        assert_eq!(ids(&ordered[0].children), vec!["c1", "c2"]);
        assert_eq!(ids(&ordered[1].children), vec!["q1", "q2"]);
    }

    #[test]
    fn order_tree_disabled_shares_nodes() {
        let p = Task::with_children(
            "p",
            "P",
            dt(8),
            vec![Task::new("a", "A", dt(8), Duration::hours(1)).unwrap()],
        )
        .unwrap();
        let tree = vec![Arc::new(p)];
        let out = order_tree(&tree, false);
        assert!(Arc::ptr_eq(&out[0], &tree[0]));
    }
}
