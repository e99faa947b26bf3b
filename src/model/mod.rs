pub mod task;
pub mod timeline;
pub mod undo;
pub mod validate;

pub use task::{Task, TaskError};
pub use timeline::{HeaderCell, HeaderScale, TimelineViewport, ViewportError};
pub use undo::UndoHistory;
pub use validate::{ValidationError, ValidationReport, ValidationWarning};
