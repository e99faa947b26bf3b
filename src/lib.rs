//! Task scheduling model and timeline coordinate engine for interactive
//! Gantt charts.
//!
//! The crate keeps an edit-friendly task tree ([`model::Task`]) behind a
//! central controller ([`chart::ChartState`]) that maintains the derived
//! projections a chart view needs: a dependency-ordered, expansion-aware
//! flattened row sequence, a validation report, and group coloring. The
//! [`model::TimelineViewport`] maps instants to pixels and back, and
//! [`hit`] resolves pointer positions against the flattened rows. Drawing
//! is left entirely to the embedding view.

pub mod chart;
pub mod color;
pub mod hit;
pub mod model;
pub mod order;

pub use chart::{ChartConfig, ChartError, ChartState};
pub use color::{GroupPalette, InteractionState};
pub use hit::{HitResult, RealizedRow, RowLayout};
pub use model::{Task, TaskError, TimelineViewport, UndoHistory, ValidationReport};
