use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::color::DEFAULT_TASK_COLOR;

/// Error type for task construction.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("task '{id}' duration must be positive (got {seconds}s)")]
    NonPositiveDuration { id: String, seconds: i64 },
    #[error("parent task '{0}' must have at least one child")]
    InvalidHierarchy(String),
}

/// A single schedulable task, or a task group when it has children.
///
/// Child subtrees are held behind `Arc` so that edits can rebuild just the
/// path from the root to the touched node and share every untouched sibling
/// subtree with the previous tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned id, unique across the whole tree.
    pub id: String,
    pub name: String,
    pub start: NaiveDateTime,
    /// Authored duration for leaves; placeholder for parents (the effective
    /// span of a parent is always recomputed from its children).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Progress from 0.0 (not started) to 1.0 (complete).
    pub progress: f32,
    /// Ids of tasks that must precede this one in the render ordering.
    pub dependencies: Vec<String>,
    /// Optional group/category name used for color classification.
    pub group: Option<String>,
    /// Display color for the task bar (stored as RGBA).
    #[serde(with = "color_serde")]
    pub color: Color32,
    /// Whether the child subtree is included in the flattened sequence.
    pub expanded: bool,
    /// Zero-based nesting depth.
    pub level: usize,
    pub children: Vec<Arc<Task>>,
}

impl Task {
    /// Create a new leaf task. Fails on zero or negative duration.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        start: NaiveDateTime,
        duration: Duration,
    ) -> Result<Self, TaskError> {
        let id = id.into();
        if duration <= Duration::zero() {
            return Err(TaskError::NonPositiveDuration {
                id,
                seconds: duration.num_seconds(),
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            start,
            duration,
            progress: 0.0,
            dependencies: Vec::new(),
            group: None,
            color: DEFAULT_TASK_COLOR,
            expanded: true,
            level: 0,
            children: Vec::new(),
        })
    }

    /// Create a parent task from its children. Fails on an empty child list.
    ///
    /// The parent's start is pulled back to the earliest child start if the
    /// requested start lies after it, the stored duration is a placeholder
    /// covering the children at construction time, and every child subtree is
    /// re-leveled to sit below the parent.
    pub fn with_children(
        id: impl Into<String>,
        name: impl Into<String>,
        start: NaiveDateTime,
        children: Vec<Task>,
    ) -> Result<Self, TaskError> {
        let id = id.into();
        if children.is_empty() {
            return Err(TaskError::InvalidHierarchy(id));
        }

        let min_child_start = children.iter().map(|c| c.start).min().unwrap_or(start);
        let effective_start = start.min(min_child_start);
        let max_child_end = children
            .iter()
            .map(|c| c.effective_end())
            .max()
            .unwrap_or(effective_start);

        let mut parent = Self {
            id,
            name: name.into(),
            start: effective_start,
            duration: max_child_end - effective_start,
            progress: 0.0,
            dependencies: Vec::new(),
            group: None,
            color: DEFAULT_TASK_COLOR,
            expanded: true,
            level: 0,
            children: children.into_iter().map(Arc::new).collect(),
        };
        parent.relevel(0);
        Ok(parent)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// The (start, end) span this task actually occupies: a leaf ends at
    /// `start + duration`, a parent ends where its furthest descendant ends.
    pub fn span(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.start, self.effective_end())
    }

    /// End instant with child aggregation applied.
    pub fn effective_end(&self) -> NaiveDateTime {
        if self.is_leaf() {
            self.start + self.duration
        } else {
            self.children
                .iter()
                .map(|c| c.effective_end())
                .max()
                .unwrap_or(self.start + self.duration)
        }
    }

    /// Duration of the effective span.
    pub fn effective_duration(&self) -> Duration {
        self.effective_end() - self.start
    }

    /// Set this task's level and shift the whole subtree below it.
    pub fn relevel(&mut self, level: usize) {
        self.level = level;
        for child in &mut self.children {
            Arc::make_mut(child).relevel(level + 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tree helpers over sibling lists
// ---------------------------------------------------------------------------

/// Find a task by id anywhere in a sibling list (including descendants).
pub fn find_task<'a>(tasks: &'a [Arc<Task>], id: &str) -> Option<&'a Arc<Task>> {
    for task in tasks {
        if task.id == id {
            return Some(task);
        }
        if let Some(found) = find_task(&task.children, id) {
            return Some(found);
        }
    }
    None
}

/// Index path from the top of `tasks` down to the task with `id`.
pub fn find_path(tasks: &[Arc<Task>], id: &str) -> Option<Vec<usize>> {
    for (i, task) in tasks.iter().enumerate() {
        if task.id == id {
            return Some(vec![i]);
        }
        if let Some(mut rest) = find_path(&task.children, id) {
            let mut path = vec![i];
            path.append(&mut rest);
            return Some(path);
        }
    }
    None
}

/// Visit every task in depth-first order.
pub fn for_each_task(tasks: &[Arc<Task>], f: &mut dyn FnMut(&Task)) {
    for task in tasks {
        f(task);
        for_each_task(&task.children, f);
    }
}

/// Collect the ids of a task and all its descendants.
pub fn subtree_ids(task: &Task, out: &mut Vec<String>) {
    out.push(task.id.clone());
    for child in &task.children {
        subtree_ids(child, out);
    }
}

/// Number of tasks in a subtree, the root included.
pub fn subtree_len(task: &Task) -> usize {
    1 + task.children.iter().map(|c| subtree_len(c)).sum::<usize>()
}

/// Serde helper for `chrono::Duration` (whole seconds).
mod duration_serde {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(seconds))
    }
}

/// Serde helper for `Color32`.
mod color_serde {
    use egui::Color32;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(color: &Color32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rgba = [color.r(), color.g(), color.b(), color.a()];
        rgba.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Color32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rgba: [u8; 4] = Deserialize::deserialize(deserializer)?;
        Ok(Color32::from_rgba_premultiplied(
            rgba[0], rgba[1], rgba[2], rgba[3],
        ))
    }
}
