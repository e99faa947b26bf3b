use std::sync::Arc;

use egui::{Pos2, Rect, Vec2};

use crate::model::task::Task;
use crate::model::timeline::TimelineViewport;

/// Bars never render narrower than this, so short tasks stay clickable.
pub const MIN_BAR_WIDTH: f32 = 6.0;
/// Vertical inset so bars don't touch row edges.
pub const BAR_INSET: f32 = 3.0;

/// A row the view has actually laid out, for virtualized scrolling where
/// only the visible slice of the flattened sequence exists on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealizedRow {
    /// Index into the flattened sequence.
    pub index: usize,
    /// Top edge of the row band, in the same coordinate space as queries.
    pub offset: f32,
}

/// How flattened rows map onto vertical positions.
#[derive(Debug, Clone, Copy)]
pub enum RowLayout<'a> {
    /// Uniform rows scrolled as one block; `offset` is the scroll amount
    /// already subtracted from screen positions.
    Scrolled { offset: f32 },
    /// Only the listed rows exist; everything between them is a gap.
    Virtualized(&'a [RealizedRow]),
}

/// A resolved pointer position.
#[derive(Debug, Clone, PartialEq)]
pub struct HitResult {
    /// Index into the flattened sequence.
    pub row: usize,
    pub task_id: String,
}

/// The rectangle a task bar occupies within its row.
///
/// Horizontal extent comes from the viewport mapping of the task's
/// effective span, clamped to `MIN_BAR_WIDTH`; vertical extent is the row
/// band minus the inset on both sides.
pub fn bar_rect(
    task: &Task,
    viewport: &TimelineViewport,
    row_top: f32,
    row_height: f32,
) -> Rect {
    let (left, right) = bar_span(task, viewport);
    Rect::from_min_size(
        Pos2::new(left, row_top + BAR_INSET),
        Vec2::new(right - left, row_height - BAR_INSET * 2.0),
    )
}

fn bar_span(task: &Task, viewport: &TimelineViewport) -> (f32, f32) {
    let left = viewport.time_to_x(task.start);
    let right = viewport.time_to_x(task.effective_end());
    let width = (right - left).max(MIN_BAR_WIDTH);
    (left, left + width)
}

/// Resolve a pointer position against the flattened sequence.
///
/// The row is found from `pos.y` through the layout; the hit then requires
/// `pos.x` inside the bar's horizontal span, edges included. A position in
/// a row but outside its bar is a miss, not an error. Nothing is cached;
/// every query walks the current flattened slice.
pub fn hit_test(
    flattened: &[Arc<Task>],
    viewport: &TimelineViewport,
    layout: RowLayout<'_>,
    row_height: f32,
    pos: Pos2,
) -> Option<HitResult> {
    if row_height <= 0.0 {
        return None;
    }

    let row = match layout {
        RowLayout::Scrolled { offset } => {
            let y = pos.y + offset;
            if y < 0.0 {
                return None;
            }
            (y / row_height).floor() as usize
        }
        RowLayout::Virtualized(rows) => {
            rows.iter()
                .find(|r| pos.y >= r.offset && pos.y < r.offset + row_height)?
                .index
        }
    };

    let task = flattened.get(row)?;
    let (left, right) = bar_span(task, viewport);
    if pos.x >= left && pos.x <= right {
        Some(HitResult {
            row,
            task_id: task.id.clone(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn dt0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// 1000 s over 1000 px: one pixel per second.
    fn unit_viewport() -> TimelineViewport {
        TimelineViewport::new(dt0(), dt0() + Duration::seconds(1000), 1000.0)
    }

    fn task_at(id: &str, start_offset_secs: i64, duration_secs: i64) -> Arc<Task> {
        Arc::new(
            Task::new(
                id,
                id.to_uppercase(),
                dt0() + Duration::seconds(start_offset_secs),
                Duration::seconds(duration_secs),
            )
            .unwrap(),
        )
    }

    /// Three rows; the interesting bar sits on row 2 spanning x 100..=300.
    fn rows() -> Vec<Arc<Task>> {
        vec![
            task_at("t0", 400, 200),
            task_at("t1", 700, 100),
            task_at("target", 100, 200),
        ]
    }

    #[test]
    fn pointer_on_bar_hits() {
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: 0.0 },
            36.0,
            Pos2::new(150.0, 90.0),
        );
        assert_eq!(
            hit,
            Some(HitResult {
                row: 2,
                task_id: "target".to_string()
            })
        );
    }

    #[test]
    fn pointer_in_row_but_left_of_bar_misses() {
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: 0.0 },
            36.0,
            Pos2::new(50.0, 90.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn pointer_in_wrong_row_misses() {
        // Row 0 holds t0 whose bar starts at x 400.
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: 0.0 },
            36.0,
            Pos2::new(150.0, 10.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn bar_edges_are_inclusive() {
        let viewport = unit_viewport();
        let flattened = rows();
        for x in [100.0, 300.0] {
            let hit = hit_test(
                &flattened,
                &viewport,
                RowLayout::Scrolled { offset: 0.0 },
                36.0,
                Pos2::new(x, 75.0),
            );
            assert_eq!(hit.unwrap().task_id, "target");
        }
    }

    #[test]
    fn pointer_below_last_row_misses() {
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: 0.0 },
            36.0,
            Pos2::new(150.0, 130.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn scroll_offset_shifts_the_row_bands() {
        // Scrolled down one row: screen y 54 lands in row 2.
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: 36.0 },
            36.0,
            Pos2::new(150.0, 54.0),
        );
        assert_eq!(hit.unwrap().row, 2);
    }

    #[test]
    fn pointer_above_first_row_misses() {
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: -10.0 },
            36.0,
            Pos2::new(150.0, 5.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn virtualized_layout_resolves_realized_rows_only() {
        let realized = [
            RealizedRow {
                index: 2,
                offset: 0.0,
            },
            RealizedRow {
                index: 0,
                offset: 48.0,
            },
        ];
        let viewport = unit_viewport();
        let flattened = rows();

        let hit = hit_test(
            &flattened,
            &viewport,
            RowLayout::Virtualized(&realized),
            36.0,
            Pos2::new(150.0, 10.0),
        );
        assert_eq!(hit.unwrap().task_id, "target");

        // In the gap between realized rows.
        let miss = hit_test(
            &flattened,
            &viewport,
            RowLayout::Virtualized(&realized),
            36.0,
            Pos2::new(150.0, 40.0),
        );
        assert_eq!(miss, None);
    }

    #[test]
    fn tiny_bar_keeps_a_clickable_width() {
        // 2 s at one pixel per second renders at the 6 px minimum.
        let flattened = vec![task_at("tiny", 500, 2)];
        let hit = hit_test(
            &flattened,
            &unit_viewport(),
            RowLayout::Scrolled { offset: 0.0 },
            36.0,
            Pos2::new(505.0, 10.0),
        );
        assert_eq!(hit.unwrap().task_id, "tiny");
    }

    #[test]
    fn zero_row_height_never_hits() {
        let hit = hit_test(
            &rows(),
            &unit_viewport(),
            RowLayout::Scrolled { offset: 0.0 },
            0.0,
            Pos2::new(150.0, 90.0),
        );
        assert_eq!(hit, None);
    }

    #[test]
    fn bar_rect_insets_within_the_row_band() {
        let rect = bar_rect(&rows()[2], &unit_viewport(), 72.0, 36.0);
        assert_eq!(rect.left(), 100.0);
        assert_eq!(rect.right(), 300.0);
        assert_eq!(rect.top(), 72.0 + BAR_INSET);
        assert_eq!(rect.height(), 36.0 - BAR_INSET * 2.0);
    }
}
