use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDateTime, Timelike};

use crate::model::task::{for_each_task, Task};

/// Narrowest window the zoom controls will produce.
const MIN_WINDOW_SECS: i64 = 60;
/// Widest window the zoom controls will produce (a leap year).
const MAX_WINDOW_SECS: i64 = 366 * 24 * 3600;

/// Error type for viewport window changes.
#[derive(Debug, thiserror::Error)]
pub enum ViewportError {
    #[error("view window must end after it starts ({start} >= {end})")]
    EmptyWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Granularity of the header label cells, picked from the window width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderScale {
    Hours,
    Days,
    Weeks,
}

impl HeaderScale {
    /// Choose a label granularity for a window of the given length.
    fn from_window(window: Duration) -> Self {
        if window < Duration::days(2) {
            HeaderScale::Hours
        } else if window < Duration::days(30) {
            HeaderScale::Days
        } else {
            HeaderScale::Weeks
        }
    }

    fn step(self) -> Duration {
        match self {
            HeaderScale::Hours => Duration::hours(1),
            HeaderScale::Days => Duration::days(1),
            HeaderScale::Weeks => Duration::days(7),
        }
    }

    fn label(self, t: NaiveDateTime) -> String {
        match self {
            HeaderScale::Hours => t.format("%H:%M").to_string(),
            HeaderScale::Days => t.format("%d %b").to_string(),
            HeaderScale::Weeks => t.format("W%V").to_string(),
        }
    }
}

/// A single label cell in the timeline header. `x` is the pixel offset from
/// the viewport start.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub x: f32,
    pub label: String,
}

/// The currently visible time window and its pixel scale.
#[derive(Debug, Clone)]
pub struct TimelineViewport {
    /// The leftmost visible instant.
    pub start: NaiveDateTime,
    /// The rightmost visible instant.
    pub end: NaiveDateTime,
    /// Target width of the chart area in pixels (0.0 when unset).
    pub pixel_width: f32,
    /// Derived scale; 1.0 when the window or pixel width is degenerate.
    pub pixels_per_second: f32,
}

impl TimelineViewport {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, pixel_width: f32) -> Self {
        let mut viewport = Self {
            start,
            end,
            pixel_width,
            pixels_per_second: 1.0,
        };
        viewport.rescale();
        viewport
    }

    /// Viewport covering the full span of `tasks` (earliest start to latest
    /// effective end). An empty tree yields a 1-hour window anchored at now.
    pub fn fit_to_tasks(tasks: &[Arc<Task>], pixel_width: f32) -> Self {
        let mut min_start: Option<NaiveDateTime> = None;
        let mut max_end: Option<NaiveDateTime> = None;
        for_each_task(tasks, &mut |task| {
            let (start, end) = task.span();
            min_start = Some(min_start.map_or(start, |m| m.min(start)));
            max_end = Some(max_end.map_or(end, |m| m.max(end)));
        });

        match (min_start, max_end) {
            (Some(start), Some(end)) => Self::new(start, end, pixel_width),
            _ => {
                let now = Local::now().naive_local();
                Self::new(now, now + Duration::hours(1), pixel_width)
            }
        }
    }

    /// Replace the visible window. Rejects windows that do not end strictly
    /// after they start.
    pub fn set_window(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ViewportError> {
        if end <= start {
            return Err(ViewportError::EmptyWindow { start, end });
        }
        self.start = start;
        self.end = end;
        self.rescale();
        Ok(())
    }

    /// Update the target pixel width (container resize) and re-derive scale.
    pub fn set_pixel_width(&mut self, pixel_width: f32) {
        self.pixel_width = pixel_width;
        self.rescale();
    }

    /// Convert an instant to an x-pixel offset from the viewport start.
    pub fn time_to_x(&self, t: NaiveDateTime) -> f32 {
        let seconds = (t - self.start).num_seconds() as f64;
        (seconds * self.pixels_per_second as f64) as f32
    }

    /// Convert an x-pixel offset back to an instant.
    pub fn x_to_time(&self, x: f32) -> NaiveDateTime {
        let seconds = (x as f64 / self.pixels_per_second as f64).round() as i64;
        self.start + Duration::seconds(seconds)
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.end - self.start
    }

    /// Shrink the window around its center (show less time per pixel).
    pub fn zoom_in(&mut self) {
        self.zoom_by(1.0 / 1.25);
    }

    /// Grow the window around its center (show more time per pixel).
    pub fn zoom_out(&mut self) {
        self.zoom_by(1.25);
    }

    /// Shift the window by a number of seconds (negative pans left).
    pub fn pan_seconds(&mut self, seconds: i64) {
        self.start += Duration::seconds(seconds);
        self.end += Duration::seconds(seconds);
    }

    fn zoom_by(&mut self, factor: f64) {
        let current = self.window().num_seconds();
        let scaled = ((current as f64 * factor) as i64).clamp(MIN_WINDOW_SECS, MAX_WINDOW_SECS);
        let center = self.start + Duration::seconds(current / 2);
        self.start = center - Duration::seconds(scaled / 2);
        self.end = self.start + Duration::seconds(scaled);
        self.rescale();
    }

    fn rescale(&mut self) {
        let seconds = (self.end - self.start).num_seconds();
        self.pixels_per_second = if seconds <= 0 || self.pixel_width <= 0.0 {
            1.0
        } else {
            self.pixel_width / seconds as f32
        };
    }

    /// Header label cells for the current window: the start and end
    /// boundaries plus aligned ticks at the chosen scale. Empty when the
    /// pixel width is not positive.
    pub fn header_cells(&self) -> Vec<HeaderCell> {
        if self.pixel_width <= 0.0 || self.end <= self.start {
            return Vec::new();
        }

        let scale = HeaderScale::from_window(self.window());
        let mut cells = vec![HeaderCell {
            x: 0.0,
            label: self.start.format("%d %b %H:%M").to_string(),
        }];

        let mut tick = align_back(self.start, scale);
        // First tick strictly inside the window; the start boundary already
        // has its own cell.
        while tick <= self.start {
            tick += scale.step();
        }
        while tick < self.end {
            cells.push(HeaderCell {
                x: self.time_to_x(tick),
                label: scale.label(tick),
            });
            tick += scale.step();
        }

        cells.push(HeaderCell {
            x: self.time_to_x(self.end),
            label: self.end.format("%d %b %H:%M").to_string(),
        });
        cells
    }
}

/// Align an instant backward onto a scale boundary (whole hour, midnight, or
/// Monday midnight).
fn align_back(t: NaiveDateTime, scale: HeaderScale) -> NaiveDateTime {
    let midnight = t.date().and_hms_opt(0, 0, 0).unwrap_or(t);
    match scale {
        HeaderScale::Hours => t
            .date()
            .and_hms_opt(t.hour(), 0, 0)
            .unwrap_or(midnight),
        HeaderScale::Days => midnight,
        HeaderScale::Weeks => {
            let weekday = t.date().weekday().num_days_from_monday();
            midnight - Duration::days(weekday as i64)
        }
    }
}
