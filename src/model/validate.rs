use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::model::task::{for_each_task, Task};

/// Structured result of a tree check, suitable for logging or export.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

/// A structural violation (something that should be fixed).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ValidationError {
    /// The same task id appears more than once in the tree
    #[serde(rename = "duplicate_id")]
    DuplicateId { task_id: String, count: usize },
    /// A child starts before its parent, breaking span containment
    #[serde(rename = "child_starts_before_parent")]
    ChildStartsBeforeParent { parent_id: String, child_id: String },
}

/// A soft issue (tolerated everywhere, but worth surfacing).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ValidationWarning {
    /// A task lists itself as a dependency; ordering ignores it
    #[serde(rename = "self_dependency")]
    SelfDependency { task_id: String },
    /// A dependency names an id that exists nowhere in the tree; ordering
    /// treats it as no constraint. Expected in filtered or partial views.
    #[serde(rename = "dangling_dependency")]
    DanglingDependency { task_id: String, dep_id: String },
    /// The dependency target exists but is not a sibling, so ordering
    /// cannot honor it
    #[serde(rename = "cross_level_dependency")]
    CrossLevelDependency { task_id: String, dep_id: String },
    /// A parent's stored placeholder duration no longer matches the span
    /// derived from its children
    #[serde(rename = "stale_parent_span")]
    StaleParentSpan { parent_id: String },
    /// A leaf runs longer than the configured cap
    #[serde(rename = "overlong_leaf")]
    OverlongLeaf { task_id: String, hours: i64 },
    /// Progress outside the 0.0..=1.0 range
    #[serde(rename = "progress_out_of_range")]
    ProgressOutOfRange { task_id: String, progress: f32 },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a task tree and return structured results.
///
/// This is a read-only pass over the tree; nothing is repaired.
///
/// Checks performed:
/// 1. No duplicate task ids anywhere in the tree
/// 2. Every child starts at or after its parent
/// 3. Warnings for dangling/self/cross-level dependencies, stale parent
///    spans, leaves over `max_leaf_duration`, and out-of-range progress
pub fn check_tasks(tasks: &[Arc<Task>], max_leaf_duration: Option<Duration>) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut id_counts: HashMap<String, usize> = HashMap::new();
    for_each_task(tasks, &mut |task| {
        *id_counts.entry(task.id.clone()).or_default() += 1;
    });

    let mut duplicates: Vec<(&String, &usize)> =
        id_counts.iter().filter(|(_, count)| **count > 1).collect();
    duplicates.sort();
    for (task_id, count) in duplicates {
        report.errors.push(ValidationError::DuplicateId {
            task_id: task_id.clone(),
            count: *count,
        });
    }

    let all_ids: HashSet<&str> = id_counts.keys().map(String::as_str).collect();
    check_level(tasks, &all_ids, max_leaf_duration, &mut report);

    report.valid = report.errors.is_empty();
    report
}

// ---------------------------------------------------------------------------
// Per-level validation
// ---------------------------------------------------------------------------

fn check_level(
    level: &[Arc<Task>],
    all_ids: &HashSet<&str>,
    max_leaf_duration: Option<Duration>,
    report: &mut ValidationReport,
) {
    let sibling_ids: HashSet<&str> = level.iter().map(|t| t.id.as_str()).collect();
    for task in level {
        check_task(task, &sibling_ids, all_ids, max_leaf_duration, report);
        if task.has_children() {
            check_level(&task.children, all_ids, max_leaf_duration, report);
        }
    }
}

fn check_task(
    task: &Task,
    sibling_ids: &HashSet<&str>,
    all_ids: &HashSet<&str>,
    max_leaf_duration: Option<Duration>,
    report: &mut ValidationReport,
) {
    for dep_id in &task.dependencies {
        if *dep_id == task.id {
            report.warnings.push(ValidationWarning::SelfDependency {
                task_id: task.id.clone(),
            });
        } else if !all_ids.contains(dep_id.as_str()) {
            report.warnings.push(ValidationWarning::DanglingDependency {
                task_id: task.id.clone(),
                dep_id: dep_id.clone(),
            });
        } else if !sibling_ids.contains(dep_id.as_str()) {
            report.warnings.push(ValidationWarning::CrossLevelDependency {
                task_id: task.id.clone(),
                dep_id: dep_id.clone(),
            });
        }
    }

    if !(0.0..=1.0).contains(&task.progress) {
        report.warnings.push(ValidationWarning::ProgressOutOfRange {
            task_id: task.id.clone(),
            progress: task.progress,
        });
    }

    if task.is_leaf() {
        if let Some(cap) = max_leaf_duration {
            if task.duration > cap {
                report.warnings.push(ValidationWarning::OverlongLeaf {
                    task_id: task.id.clone(),
                    hours: task.duration.num_hours(),
                });
            }
        }
    } else {
        for child in &task.children {
            if child.start < task.start {
                report.errors.push(ValidationError::ChildStartsBeforeParent {
                    parent_id: task.id.clone(),
                    child_id: child.id.clone(),
                });
            }
        }
        if task.duration != task.effective_duration() {
            report.warnings.push(ValidationWarning::StaleParentSpan {
                parent_id: task.id.clone(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
