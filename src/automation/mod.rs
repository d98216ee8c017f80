//! Pick and place automation: task points, the state machine running them, and
//! their persistence.

mod engine;
pub mod state;
pub mod store;
pub mod task_points;

pub use engine::{AutomationEngine, Reachability};
pub use state::{AutomationObserver, AutomationState, AutomationStep, NoObserver, TaskParameters};
pub use store::{MemoryTaskStore, TaskFile, TaskStore};
pub use task_points::{PointKind, PointMm, TaskPoints};
