//! Persistence of task points and task parameters.

use std::sync::Mutex;

use crate::automation::state::TaskParameters;
use crate::automation::task_points::PointMm;
use crate::error::ArmError;

/// Contents of a task file: pickup and place points (millimeters) and the parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskFile {
    pub pickup_points: Vec<PointMm>,
    pub place_points: Vec<PointMm>,
    pub parameters: TaskParameters,
}

impl TaskFile {
    /// Version of the file layout written by `to_yaml`.
    pub const VERSION: i64 = 1;

    /// YAML form of the task file.
    /// ```
    /// use wearm_kinematics::automation::store::TaskFile;
    /// let file = TaskFile { pickup_points: vec![[150.0, 0.0, 50.0]], ..Default::default() };
    /// assert!(file.to_yaml().contains("  - [150, 0, 50]"));
    /// ```
    pub fn to_yaml(&self) -> String {
        let points = |v: &[PointMm]| {
            if v.is_empty() {
                return " []\n".to_string();
            }
            v.iter()
                .map(|p| format!("\n  - [{}, {}, {}]", p[0], p[1], p[2]))
                .collect::<String>()
                + "\n"
        };
        let p = &self.parameters;
        format!(
            "version: {}\n\
            pickup_points:{}\
            place_points:{}\
            parameters:\n  \
              safe_height: {}\n  \
              height_offset: {}\n  \
              grip_delay: {}\n  \
              move_delay: {}\n  \
              auto_speed: {}\n  \
              return_home: {}\n",
            Self::VERSION,
            points(&self.pickup_points),
            points(&self.place_points),
            p.safe_height,
            p.height_offset,
            p.grip_delay,
            p.move_delay,
            p.auto_speed,
            p.return_home,
        )
    }
}

/// Where task files are kept.
pub trait TaskStore: Send + Sync {
    fn load(&self) -> Result<TaskFile, ArmError>;

    fn save(&self, file: &TaskFile) -> Result<(), ArmError>;
}

/// Store keeping the task file in memory only.
#[derive(Default)]
pub struct MemoryTaskStore {
    file: Mutex<Option<TaskFile>>,
}

impl TaskStore for MemoryTaskStore {
    fn load(&self) -> Result<TaskFile, ArmError> {
        let file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        file.clone()
            .ok_or_else(|| ArmError::Validation("no task has been saved yet".into()))
    }

    fn save(&self, file: &TaskFile) -> Result<(), ArmError> {
        *self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(file.clone());
        Ok(())
    }
}
