use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use egui::{Color32, Pos2};
use indexmap::IndexMap;
use tracing::debug;

use crate::color::GroupPalette;
use crate::hit::{self, HitResult, RowLayout};
use crate::model::task::{find_path, find_task, subtree_ids, Task, TaskError};
use crate::model::timeline::{TimelineViewport, ViewportError};
use crate::model::undo::UndoHistory;
use crate::model::validate::{check_tasks, ValidationReport};
use crate::order::order_tree;

/// Why an edit was not applied. Rejected edits leave the tree untouched.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("no task with id '{0}'")]
    UnknownTask(String),
    #[error("no parent at path {0:?}")]
    InvalidParentPath(Vec<String>),
    #[error("task id '{0}' already exists")]
    DuplicateId(String),
    #[error("cannot move '{id}' under '{target}': target lies inside the moved subtree")]
    MoveIntoSubtree { id: String, target: String },
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Viewport(#[from] ViewportError),
}

/// Tunable policy for one chart instance.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Leaves running longer than this are flagged by validation;
    /// `None` disables the check.
    pub max_leaf_duration: Option<Duration>,
    /// Uniform row height shared by bar geometry and hit testing.
    pub row_height: f32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_leaf_duration: Some(Duration::hours(24)),
            row_height: 30.0,
        }
    }
}

/// Central chart state: the owned task tree plus everything derived from it.
///
/// Derived state (the flattened row sequence, the validation report) is
/// rebuilt eagerly after every accepted edit, and `revision` ticks each
/// rebuild so embedders can invalidate their own caches cheaply.
pub struct ChartState {
    tasks: Vec<Arc<Task>>,
    viewport: TimelineViewport,
    config: ChartConfig,
    ordering_enabled: bool,

    // Derived projections
    flattened: Vec<Arc<Task>>,
    validation: ValidationReport,
    revision: u64,

    // Group label -> resolved color, in first-seen order
    color_cache: IndexMap<String, Color32>,

    // Undo / redo
    undo_history: UndoHistory,
}

impl Default for ChartState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartState {
    pub fn new() -> Self {
        Self::with_config(ChartConfig::default())
    }

    pub fn with_config(config: ChartConfig) -> Self {
        let mut state = Self {
            tasks: Vec::new(),
            viewport: TimelineViewport::fit_to_tasks(&[], 800.0),
            config,
            ordering_enabled: true,
            flattened: Vec::new(),
            validation: ValidationReport::default(),
            revision: 0,
            color_cache: IndexMap::new(),
            undo_history: UndoHistory::new(),
        };
        state.refresh();
        state
    }

    // --- Accessors ---

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    /// Visible rows in display order: depth-first, collapsed subtrees
    /// skipped, siblings ordered by the dependency pass when enabled.
    pub fn flattened(&self) -> &[Arc<Task>] {
        &self.flattened
    }

    pub fn viewport(&self) -> &TimelineViewport {
        &self.viewport
    }

    /// Direct viewport access for interactive zoom and pan; the viewport
    /// carries no tree-derived state, so this cannot stale anything.
    pub fn viewport_mut(&mut self) -> &mut TimelineViewport {
        &mut self.viewport
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    pub fn ordering_enabled(&self) -> bool {
        self.ordering_enabled
    }

    /// Ticks on every rebuild of derived state.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Resolved color for a group label, if a coloring pass has seen it.
    pub fn group_color(&self, label: &str) -> Option<Color32> {
        self.color_cache.get(label).copied()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_history.can_redo()
    }

    // --- Tree replacement ---

    /// Replace the whole tree. Levels are normalized, undo history resets,
    /// and the viewport is left alone so the caller's window survives a
    /// reload; call `fit_viewport` for the fit-on-load behavior.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks
            .into_iter()
            .map(|mut task| {
                task.relevel(0);
                Arc::new(task)
            })
            .collect();
        self.undo_history.clear();
        self.refresh();
        debug!(roots = self.tasks.len(), revision = self.revision, "tree replaced");
    }

    pub fn set_config(&mut self, config: ChartConfig) {
        self.config = config;
        self.refresh();
    }

    /// Turn the dependency ordering pass on or off for the flattened rows.
    pub fn set_ordering_enabled(&mut self, enabled: bool) {
        if self.ordering_enabled != enabled {
            self.ordering_enabled = enabled;
            self.refresh();
            debug!(enabled, "dependency ordering toggled");
        }
    }

    // --- Task operations ---

    /// Flip the expansion flag on `id`. Unknown ids are a silent no-op.
    pub fn toggle_expansion(&mut self, id: &str) {
        let Some(path) = find_path(&self.tasks, id) else {
            debug!(task = %id, "toggle_expansion on unknown id ignored");
            return;
        };
        if let Some(node) = task_mut(&mut self.tasks, &path) {
            node.expanded = !node.expanded;
            debug!(task = %id, expanded = node.expanded, "expansion toggled");
        }
        self.refresh();
    }

    /// Insert `task` as the last child of the parent named by `parent_path`,
    /// a chain of ids leading from the root level down; an empty path
    /// appends at the root level itself. Rejected without touching the tree
    /// if the chain does not resolve or any id in the inserted subtree is
    /// already taken.
    pub fn create(&mut self, parent_path: &[&str], task: Task) -> Result<(), ChartError> {
        let mut incoming = Vec::new();
        subtree_ids(&task, &mut incoming);
        if let Some(taken) = incoming
            .iter()
            .find(|id| find_task(&self.tasks, id).is_some())
        {
            debug!(task = %taken, "create rejected: id taken");
            return Err(ChartError::DuplicateId(taken.clone()));
        }
        let Some(path) = resolve_id_path(&self.tasks, parent_path) else {
            debug!(path = ?parent_path, "create rejected: parent path does not resolve");
            return Err(ChartError::InvalidParentPath(
                parent_path.iter().map(|id| id.to_string()).collect(),
            ));
        };

        self.undo_history.push(&self.tasks);
        let id = task.id.clone();
        let mut task = task;
        if path.is_empty() {
            task.relevel(0);
            self.tasks.push(Arc::new(task));
        } else if let Some(parent) = task_mut(&mut self.tasks, &path) {
            task.relevel(parent.level + 1);
            parent.children.push(Arc::new(task));
        }
        refresh_spans_along(&mut self.tasks, &path);
        self.refresh();
        debug!(task = %id, depth = path.len(), "task created");
        Ok(())
    }

    /// Apply `edit` to the task with `id`, all or nothing: the change is
    /// rejected wholesale if it leaves a leaf with a non-positive duration
    /// or renames the task onto an id that is already taken.
    pub fn update<F>(&mut self, id: &str, edit: F) -> Result<(), ChartError>
    where
        F: FnOnce(&mut Task),
    {
        let Some(path) = find_path(&self.tasks, id) else {
            debug!(task = %id, "update rejected: unknown id");
            return Err(ChartError::UnknownTask(id.to_string()));
        };
        let original = match task_at(&self.tasks, &path) {
            Some(task) => task,
            None => return Err(ChartError::UnknownTask(id.to_string())),
        };
        let level = original.level;
        let mut candidate = original.clone();
        edit(&mut candidate);

        if candidate.is_leaf() && candidate.duration <= Duration::zero() {
            debug!(task = %id, "update rejected: non-positive duration");
            return Err(TaskError::NonPositiveDuration {
                id: candidate.id,
                seconds: candidate.duration.num_seconds(),
            }
            .into());
        }
        if candidate.id != id && find_task(&self.tasks, &candidate.id).is_some() {
            debug!(task = %id, new_id = %candidate.id, "update rejected: id taken");
            return Err(ChartError::DuplicateId(candidate.id));
        }
        candidate.relevel(level);

        self.undo_history.push(&self.tasks);
        if let Some(node) = task_mut(&mut self.tasks, &path) {
            *node = candidate;
        }
        refresh_spans_along(&mut self.tasks, &path);
        self.refresh();
        debug!(task = %id, "task updated");
        Ok(())
    }

    /// Remove the subtree rooted at `id` and scrub references to the
    /// removed ids from every remaining dependency list. A parent left
    /// without children becomes a leaf again; its stored duration is
    /// already positive, so the tree stays well formed.
    pub fn delete(&mut self, id: &str) -> Result<(), ChartError> {
        let Some(path) = find_path(&self.tasks, id) else {
            debug!(task = %id, "delete rejected: unknown id");
            return Err(ChartError::UnknownTask(id.to_string()));
        };
        let mut removed = Vec::new();
        if let Some(node) = task_at(&self.tasks, &path) {
            subtree_ids(node, &mut removed);
        }

        self.undo_history.push(&self.tasks);
        let _ = detach(&mut self.tasks, &path);
        let parent_path = &path[..path.len() - 1];
        scrub_dependencies(&mut self.tasks, &removed);
        refresh_spans_along(&mut self.tasks, parent_path);
        self.refresh();
        debug!(task = %id, subtree = removed.len(), "task deleted");
        Ok(())
    }

    /// Re-parent the subtree at `id`: to the end of the new parent's child
    /// list, or back to the root level when `new_parent` is `None`.
    /// Rejected when an id is missing or the target sits inside the moved
    /// subtree (a task cannot become its own ancestor).
    pub fn move_task(&mut self, id: &str, new_parent: Option<&str>) -> Result<(), ChartError> {
        let Some(source_path) = find_path(&self.tasks, id) else {
            debug!(task = %id, "move rejected: unknown id");
            return Err(ChartError::UnknownTask(id.to_string()));
        };
        if let Some(target) = new_parent {
            let Some(target_path) = find_path(&self.tasks, target) else {
                debug!(task = %id, new_parent = %target, "move rejected: unknown target");
                return Err(ChartError::UnknownTask(target.to_string()));
            };
            if target_path.starts_with(&source_path) {
                debug!(task = %id, new_parent = %target, "move rejected: target inside subtree");
                return Err(ChartError::MoveIntoSubtree {
                    id: id.to_string(),
                    target: target.to_string(),
                });
            }
        }

        let before = self.tasks.clone();
        let old_parent_path = source_path[..source_path.len() - 1].to_vec();
        let subtree = match detach(&mut self.tasks, &source_path) {
            Some(subtree) => subtree,
            None => return Err(ChartError::UnknownTask(id.to_string())),
        };
        let mut node = Arc::try_unwrap(subtree).unwrap_or_else(|shared| (*shared).clone());
        match new_parent {
            Some(target) => {
                // Sibling indices shifted under the detached node's parent,
                // so the target is looked up again on the post-detach tree.
                let Some(target_path) = find_path(&self.tasks, target) else {
                    self.tasks = before;
                    return Err(ChartError::UnknownTask(target.to_string()));
                };
                if let Some(parent) = task_mut(&mut self.tasks, &target_path) {
                    node.relevel(parent.level + 1);
                    parent.children.push(Arc::new(node));
                }
                refresh_spans_along(&mut self.tasks, &old_parent_path);
                refresh_spans_along(&mut self.tasks, &target_path);
            }
            None => {
                node.relevel(0);
                self.tasks.push(Arc::new(node));
                refresh_spans_along(&mut self.tasks, &old_parent_path);
            }
        }
        // The snapshot goes on the undo stack only for a completed move.
        self.undo_history.push(&before);
        self.refresh();
        debug!(task = %id, new_parent = new_parent.unwrap_or("<root>"), "task moved");
        Ok(())
    }

    // --- Coloring and progress ---

    /// Recolor grouped tasks: an explicit mapping wins, otherwise the
    /// palette is assigned positionally in first-seen group order, with the
    /// fallback when the palette is empty. Ungrouped tasks keep their own
    /// color. The label cache is rebuilt from scratch on every call, so a
    /// renamed or vanished group never pins a stale slot.
    pub fn apply_group_colors(&mut self, palette: &GroupPalette) {
        self.color_cache.clear();
        let mut dirty: Vec<(Vec<usize>, Color32)> = Vec::new();
        let mut prefix = Vec::new();
        collect_group_colors(
            &self.tasks,
            palette,
            &mut self.color_cache,
            &mut prefix,
            &mut dirty,
        );
        let recolored = dirty.len();
        for (path, color) in dirty {
            if let Some(node) = task_mut(&mut self.tasks, &path) {
                node.color = color;
            }
        }
        if recolored > 0 {
            self.refresh();
        }
        debug!(groups = self.color_cache.len(), recolored, "group colors applied");
    }

    /// Roll leaf progress up through every parent, weighted by effective
    /// duration, so a 1 h finished child and a 3 h untouched one read as
    /// one quarter done.
    pub fn recompute_parent_progress(&mut self) {
        let mut dirty: Vec<(Vec<usize>, f32)> = Vec::new();
        let mut prefix = Vec::new();
        collect_progress_rollup(&self.tasks, &mut prefix, &mut dirty);
        if dirty.is_empty() {
            return;
        }
        for (path, progress) in dirty {
            if let Some(node) = task_mut(&mut self.tasks, &path) {
                node.progress = progress;
            }
        }
        self.refresh();
        debug!("parent progress recomputed");
    }

    // --- Viewport ---

    /// Fit the window to the tree's overall span at the current width.
    pub fn fit_viewport(&mut self) {
        let width = self.viewport.pixel_width;
        self.viewport = TimelineViewport::fit_to_tasks(&self.tasks, width);
        debug!(start = %self.viewport.start, end = %self.viewport.end, "viewport fit");
    }

    pub fn set_pixel_width(&mut self, width: f32) {
        self.viewport.set_pixel_width(width);
    }

    pub fn set_viewport_window(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ChartError> {
        self.viewport.set_window(start, end)?;
        Ok(())
    }

    // --- Hit testing ---

    /// Resolve a pointer position against the current flattened rows.
    pub fn hit_test(&self, layout: RowLayout<'_>, pos: Pos2) -> Option<HitResult> {
        hit::hit_test(
            &self.flattened,
            &self.viewport,
            layout,
            self.config.row_height,
            pos,
        )
    }

    // --- Undo / redo ---

    pub fn undo(&mut self) -> bool {
        if let Some(snap) = self.undo_history.undo(&self.tasks) {
            self.tasks = snap;
            self.refresh();
            debug!(revision = self.revision, "undo");
            true
        } else {
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        if let Some(snap) = self.undo_history.redo(&self.tasks) {
            self.tasks = snap;
            self.refresh();
            debug!(revision = self.revision, "redo");
            true
        } else {
            false
        }
    }

    /// Rebuild every projection derived from the tree.
    fn refresh(&mut self) {
        self.flattened = flatten(&self.tasks, self.ordering_enabled);
        self.validation = check_tasks(&self.tasks, self.config.max_leaf_duration);
        self.revision += 1;
    }
}

// --- Flattening ---

/// Depth-first projection of the visible rows: collapsed subtrees are
/// skipped, sibling order comes from the dependency pass.
fn flatten(tasks: &[Arc<Task>], ordering_enabled: bool) -> Vec<Arc<Task>> {
    let ordered = order_tree(tasks, ordering_enabled);
    let mut rows = Vec::new();
    push_visible(&ordered, &mut rows);
    rows
}

fn push_visible(level: &[Arc<Task>], rows: &mut Vec<Arc<Task>>) {
    for task in level {
        rows.push(Arc::clone(task));
        if task.expanded && task.has_children() {
            push_visible(&task.children, rows);
        }
    }
}

// --- Path plumbing ---

fn task_at<'a>(tasks: &'a [Arc<Task>], path: &[usize]) -> Option<&'a Task> {
    let (&first, rest) = path.split_first()?;
    let mut node: &Task = tasks.get(first)?;
    for &index in rest {
        node = node.children.get(index)?;
    }
    Some(node)
}

/// Turn an ancestor id chain into sibling indices, or `None` as soon as
/// one link is not a child of the previous one. The empty chain resolves
/// to the root level.
fn resolve_id_path(tasks: &[Arc<Task>], ids: &[&str]) -> Option<Vec<usize>> {
    let mut path = Vec::with_capacity(ids.len());
    let mut level = tasks;
    for id in ids {
        let index = level.iter().position(|task| task.id == *id)?;
        level = &level[index].children;
        path.push(index);
    }
    Some(path)
}

/// Mutable access to one node. Clones only the nodes along the path when
/// they are shared with a snapshot; untouched siblings stay shared.
fn task_mut<'a>(tasks: &'a mut [Arc<Task>], path: &[usize]) -> Option<&'a mut Task> {
    let (&first, rest) = path.split_first()?;
    let mut node = Arc::make_mut(tasks.get_mut(first)?);
    for &index in rest {
        node = Arc::make_mut(node.children.get_mut(index)?);
    }
    Some(node)
}

fn detach(tasks: &mut Vec<Arc<Task>>, path: &[usize]) -> Option<Arc<Task>> {
    let (&last, parent) = path.split_last()?;
    if parent.is_empty() {
        if last < tasks.len() {
            Some(tasks.remove(last))
        } else {
            None
        }
    } else {
        let node = task_mut(tasks, parent)?;
        if last < node.children.len() {
            Some(node.children.remove(last))
        } else {
            None
        }
    }
}

/// Re-derive stored spans along `path` bottom-up: a parent's start is
/// pulled back to its earliest child (never pushed forward), and its
/// placeholder duration tracks the effective span.
fn refresh_spans_along(tasks: &mut [Arc<Task>], path: &[usize]) {
    for depth in (1..=path.len()).rev() {
        if let Some(node) = task_mut(tasks, &path[..depth]) {
            if node.has_children() {
                if let Some(min_child) = node.children.iter().map(|c| c.start).min() {
                    node.start = node.start.min(min_child);
                }
                node.duration = node.effective_duration();
            }
        }
    }
}

fn scrub_dependencies(tasks: &mut [Arc<Task>], removed: &[String]) {
    let mut dirty: Vec<Vec<usize>> = Vec::new();
    let mut prefix = Vec::new();
    collect_dependent_paths(tasks, removed, &mut prefix, &mut dirty);
    for path in dirty {
        if let Some(node) = task_mut(tasks, &path) {
            node.dependencies.retain(|dep| !removed.contains(dep));
        }
    }
}

fn collect_dependent_paths(
    level: &[Arc<Task>],
    removed: &[String],
    prefix: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    for (i, task) in level.iter().enumerate() {
        prefix.push(i);
        if task.dependencies.iter().any(|dep| removed.contains(dep)) {
            out.push(prefix.clone());
        }
        collect_dependent_paths(&task.children, removed, prefix, out);
        prefix.pop();
    }
}

fn collect_group_colors(
    level: &[Arc<Task>],
    palette: &GroupPalette,
    cache: &mut IndexMap<String, Color32>,
    prefix: &mut Vec<usize>,
    out: &mut Vec<(Vec<usize>, Color32)>,
) {
    for (i, task) in level.iter().enumerate() {
        prefix.push(i);
        if let Some(group) = &task.group {
            let color = match cache.get(group) {
                Some(color) => *color,
                None => {
                    let slot = cache.len();
                    let color = palette
                        .explicit
                        .get(group)
                        .copied()
                        .unwrap_or_else(|| palette.positional(slot));
                    cache.insert(group.clone(), color);
                    color
                }
            };
            if task.color != color {
                out.push((prefix.clone(), color));
            }
        }
        collect_group_colors(&task.children, palette, cache, prefix, out);
        prefix.pop();
    }
}

fn collect_progress_rollup(
    level: &[Arc<Task>],
    prefix: &mut Vec<usize>,
    out: &mut Vec<(Vec<usize>, f32)>,
) {
    for (i, task) in level.iter().enumerate() {
        prefix.push(i);
        if task.has_children() {
            let progress = weighted_progress(task);
            if progress != task.progress {
                out.push((prefix.clone(), progress));
            }
            collect_progress_rollup(&task.children, prefix, out);
        }
        prefix.pop();
    }
}

fn weighted_progress(task: &Task) -> f32 {
    if task.is_leaf() {
        return task.progress;
    }
    let mut weighted = 0.0f64;
    let mut total = 0.0f64;
    for child in &task.children {
        let secs = child.effective_duration().num_seconds() as f64;
        weighted += f64::from(weighted_progress(child)) * secs;
        total += secs;
    }
    if total > 0.0 {
        (weighted / total) as f32
    } else {
        0.0
    }
}
